//! Fork catalog listing

use chainfill_forks::all_forks;
use serde_json::Value;

use crate::{CliError, Output};

/// List every fork name `--fork` accepts
pub fn execute(json: bool) -> Result<(), CliError> {
    let names: Vec<String> = all_forks().iter().map(|f| f.name()).collect();
    Output::new(json)
        .field_value(
            "forks",
            Value::Array(names.iter().cloned().map(Value::String).collect()),
        )
        .message(&names.join("\n"))
        .print();
    Ok(())
}
