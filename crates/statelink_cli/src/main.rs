//! statelink CLI
//!
//! Command-line tools for working with statelink trees and messages.
//!
//! # Commands
//!
//! - `diff` - Compute the edits between two JSON trees
//! - `apply` - Apply an edit batch to a JSON tree
//! - `check` - Validate sync protocol messages
//! - `simulate` - Run a primary and replicas in memory and check convergence

mod commands;

use clap::{Parser, Subcommand};
use commands::simulate::SimulateOptions;
use commands::Format;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// statelink command-line tools.
#[derive(Parser)]
#[command(name = "statelink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the edits that turn one JSON tree into another
    Diff {
        /// Tree before (`-` for stdin)
        old: PathBuf,

        /// Tree after
        new: PathBuf,

        /// Print a PATCH_STATE message instead of the edit list
        #[arg(short, long)]
        message: bool,
    },

    /// Apply an edit list or PATCH_STATE message to a JSON tree
    Apply {
        /// Tree to patch
        tree: PathBuf,

        /// Edit list or PATCH_STATE message (`-` for stdin)
        patch: PathBuf,
    },

    /// Validate a sync message, or an array of them
    Check {
        /// Message file (`-` for stdin)
        input: PathBuf,
    },

    /// Run a counter primary and replicas in memory
    Simulate {
        /// Number of replicas
        #[arg(short, long, default_value = "3")]
        replicas: usize,

        /// Number of dispatches on the primary
        #[arg(short, long, default_value = "100")]
        dispatches: usize,

        /// Drop a replica connection every N dispatches (0 disables)
        #[arg(long, default_value = "0")]
        drop_every: usize,

        /// Channel the replicas announce
        #[arg(long, default_value = statelink_replica::DEFAULT_CHANNEL)]
        channel: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let format = Format::parse(&cli.format)?;

    match cli.command {
        Commands::Diff { old, new, message } => {
            commands::diff::run(&old, &new, format, message)?;
        }
        Commands::Apply { tree, patch } => {
            commands::apply::run(&tree, &patch, format)?;
        }
        Commands::Check { input } => {
            commands::check::run(&input, format)?;
        }
        Commands::Simulate {
            replicas,
            dispatches,
            drop_every,
            channel,
        } => {
            let options = SimulateOptions {
                replicas,
                dispatches,
                drop_every,
                channel,
            };
            commands::simulate::run(&options, format)?;
        }
        Commands::Version => {
            println!("statelink CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Message types: {}",
                statelink_protocol::MESSAGE_TYPES.join(", ")
            );
        }
    }

    Ok(())
}
