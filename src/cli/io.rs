//! JSON outcome reporting for CLI
//!
//! - Output: single JSON object via stdout
//! - Logs never go to stdout
//! - UTF-8 only

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_response_to(&mut io::stdout(), data)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_error_to(&mut io::stdout(), code, message)
}

fn write_response_to<W: Write>(out: &mut W, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_line(out, &response)
}

fn write_error_to<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_line(out, &response)
}

fn write_line<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(buf: &[u8]) -> Value {
        let text = std::str::from_utf8(buf).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_response_envelope() {
        let mut buf = Vec::new();
        write_response_to(&mut buf, serde_json::json!({"outcome": "already_restored"})).unwrap();

        let value = parse(&buf);
        assert_eq!(value["status"], "ok");
        assert_eq!(value["data"]["outcome"], "already_restored");
    }

    #[test]
    fn test_error_envelope() {
        let mut buf = Vec::new();
        write_error_to(&mut buf, "RESTORE_IO", "disk full").unwrap();

        let value = parse(&buf);
        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], "RESTORE_IO");
        assert_eq!(value["message"], "disk full");
    }
}
