//! Diff command implementation.

use super::{read_json, Format};
use serde::Serialize;
use statelink_protocol::{diff, Edit, SyncMessage};
use std::path::Path;

/// Diff result.
#[derive(Debug, Serialize)]
pub struct DiffResult {
    /// Number of edits.
    pub edit_count: usize,
    /// The edits, in apply order.
    pub edits: Vec<Edit>,
}

/// Computes the edits between two trees.
pub fn compute(old: &serde_json::Value, new: &serde_json::Value) -> DiffResult {
    let edits = diff(old, new);
    DiffResult {
        edit_count: edits.len(),
        edits,
    }
}

/// Runs the diff command.
pub fn run(
    old: &Path,
    new: &Path,
    format: Format,
    as_message: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = compute(&read_json(old)?, &read_json(new)?);

    if as_message {
        println!("{}", SyncMessage::patch(result.edits).encode()?);
        return Ok(());
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &DiffResult) {
    if result.edits.is_empty() {
        println!("No differences");
        return;
    }
    println!("{} edit(s)", result.edit_count);
    for edit in &result.edits {
        let op = format!("{:?}", edit.op).to_lowercase();
        match &edit.value {
            Some(value) => println!("  {:<8} /{} = {}", op, edit.path_display(), value),
            None => println!("  {:<8} /{}", op, edit.path_display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_edits() {
        let result = compute(&json!({"a": 1, "b": 2}), &json!({"a": 2}));
        assert_eq!(result.edit_count, 2);
        assert!(compute(&json!({"a": 1}), &json!({"a": 1})).edits.is_empty());
    }
}
