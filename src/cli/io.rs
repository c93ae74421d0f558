//! JSON output for the CLI
//!
//! - Output: single JSON object via stdout
//! - Logs never go to stdout
//! - UTF-8 only

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Success envelope
pub fn response(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

/// Error envelope; `details` only when the error carries any
pub fn error_response(err: &CliError) -> Value {
    let mut response = json!({
        "status": "error",
        "code": err.code(),
        "message": err.message()
    });
    if let Some(details) = err.details() {
        response["details"] = details.clone();
    }
    response
}

fn write_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&response(data))
}

/// Write an error response to stdout
pub fn write_error(err: &CliError) -> CliResult<()> {
    write_line(&error_response(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_envelope() {
        let value = response(json!({ "collections_created": [] }));
        assert_eq!(value["status"], "ok");
        assert!(value["data"]["collections_created"].is_array());
    }

    #[test]
    fn test_error_envelope() {
        let value = error_response(&CliError::config_error("host must not be empty"));
        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], "BBEAMS_CLI_CONFIG_ERROR");
        assert_eq!(value["message"], "host must not be empty");
        assert!(value.get("details").is_none());
    }
}
