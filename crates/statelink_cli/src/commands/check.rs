//! Check command implementation.

use super::{read_json, Format};
use serde::Serialize;
use serde_json::Value;
use statelink_protocol::SyncMessage;
use std::path::Path;

/// Outcome for one checked message.
#[derive(Debug, Serialize)]
pub struct CheckEntry {
    /// Position in the input.
    pub index: usize,
    /// Message type, if valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    /// Why the message was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Validates one message or an array of messages.
pub fn check_all(input: Value) -> Vec<CheckEntry> {
    let messages = match input {
        Value::Array(items) => items,
        single => vec![single],
    };

    messages
        .into_iter()
        .enumerate()
        .map(|(index, value)| match SyncMessage::from_value(value) {
            Ok(message) => CheckEntry {
                index,
                kind: Some(message.kind()),
                error: None,
            },
            Err(e) => CheckEntry {
                index,
                kind: None,
                error: Some(e.to_string()),
            },
        })
        .collect()
}

/// Runs the check command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let entries = check_all(read_json(path)?);
    let invalid = entries.iter().filter(|e| e.error.is_some()).count();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        Format::Text => {
            for entry in &entries {
                match (&entry.kind, &entry.error) {
                    (Some(kind), _) => println!("  [{}] ✓ {}", entry.index, kind),
                    (None, Some(error)) => println!("  [{}] ✗ {}", entry.index, error),
                    (None, None) => {}
                }
            }
            println!();
            println!("{} checked, {} invalid", entries.len(), invalid);
        }
    }

    if invalid > 0 {
        return Err(format!("{} invalid message(s)", invalid).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_each_message() {
        let entries = check_all(json!([
            {"type": "SYNC_GLOBAL"},
            {"type": "NOPE"},
            {"type": "PATCH_STATE", "patches": "not a list"}
        ]));
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, Some("SYNC_GLOBAL"));
        assert!(entries[1].error.is_some());
        assert!(entries[2].error.is_some());
    }
}
