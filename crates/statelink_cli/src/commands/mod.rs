//! CLI command implementations.

pub mod apply;
pub mod check;
pub mod diff;
pub mod simulate;

use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reported by commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// An input file could not be read.
    #[error("cannot read {path:?}: {source}")]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// An input file is not valid JSON.
    #[error("{path:?} is not valid JSON: {source}")]
    Parse {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Unknown `--format` value.
    #[error("unknown output format {0:?} (expected text or json)")]
    Format(String),
}

/// Output format shared by the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable.
    Text,
    /// Machine-readable.
    Json,
}

impl Format {
    /// Parses a `--format` value.
    pub fn parse(value: &str) -> Result<Self, CliError> {
        match value {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(CliError::Format(other.to_string())),
        }
    }
}

/// Reads a JSON document from a file, or from stdin if `path` is `-`.
pub fn read_json(path: &Path) -> Result<Value, CliError> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|source| CliError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        text
    } else {
        fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?
    };

    serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
