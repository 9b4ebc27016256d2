//! Apply command implementation.

use super::{read_json, Format};
use serde_json::Value;
use statelink_protocol::{apply, Edit, ProtocolError, SyncMessage};
use std::path::Path;

/// Extracts an edit list from either a bare array or a `PATCH_STATE` message.
pub fn parse_edits(input: Value) -> Result<Vec<Edit>, ProtocolError> {
    if input.is_array() {
        return Ok(serde_json::from_value(input)?);
    }
    match SyncMessage::from_value(input)? {
        SyncMessage::PatchState { patches } => Ok(patches),
        other => Err(ProtocolError::InvalidMessage(format!(
            "expected PATCH_STATE, got {}",
            other.kind()
        ))),
    }
}

/// Runs the apply command.
pub fn run(tree: &Path, patch: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let tree = read_json(tree)?;
    let edits = parse_edits(read_json(patch)?)?;
    tracing::debug!(edits = edits.len(), "applying batch");

    let next = apply(&tree, &edits)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string(&next)?),
        Format::Text => println!("{}", serde_json::to_string_pretty(&next)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_array_or_message() {
        let edits = json!([{"op": "replace", "path": ["a"], "value": 1}]);
        assert_eq!(parse_edits(edits.clone()).unwrap().len(), 1);

        let message = json!({"type": "PATCH_STATE", "patches": edits});
        assert_eq!(parse_edits(message).unwrap().len(), 1);

        assert!(parse_edits(json!({"type": "SYNC_GLOBAL"})).is_err());
    }
}
