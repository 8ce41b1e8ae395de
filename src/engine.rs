use regex::Regex;
use std::{collections::BTreeMap, path::PathBuf, process::Command, sync::OnceLock};
use thiserror::Error;

const OSASCRIPT: &str = "/usr/bin/osascript";

/// Failure reported by a script engine, with whatever fields the engine gave.
#[derive(Clone, Debug, Default, Error, PartialEq, Eq)]
#[error("script execution failed")]
pub struct ScriptError {
    pub details: BTreeMap<String, String>,
}

impl ScriptError {
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

pub trait ScriptEngine {
    fn execute(&self, script: &str) -> Result<(), ScriptError>;
}

/// Runs AppleScript through `osascript`, blocking until it exits.
#[derive(Clone, Debug)]
pub struct OsaScript {
    program: PathBuf,
}

impl OsaScript {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(OSASCRIPT),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for OsaScript {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for OsaScript {
    fn execute(&self, script: &str) -> Result<(), ScriptError> {
        let output = Command::new(&self.program)
            .arg("-e")
            .arg(script)
            .output()
            .map_err(|e| {
                ScriptError::default()
                    .with("program", self.program.display())
                    .with("message", e)
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut error = parse_osascript_error(stderr.trim());
        error = match output.status.code() {
            Some(code) => error.with("status", code),
            None => error.with("status", "killed by signal"),
        };
        Err(error)
    }
}

/// Splits `osascript` diagnostics such as
/// `12:40: execution error: Terminal got an error: ... (-1728)` into keyed fields.
pub fn parse_osascript_error(stderr: &str) -> ScriptError {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+):(\d+): (?:execution |syntax )?error: (.*?)(?: \((-?\d+)\))?$")
            .expect("valid regex")
    });

    let error = ScriptError::default();
    match pattern.captures(stderr) {
        Some(caps) => {
            let mut error = error
                .with("range", format!("{}..{}", &caps[1], &caps[2]))
                .with("message", &caps[3]);
            if let Some(number) = caps.get(4) {
                error = error.with("number", number.as_str());
            }
            error
        }
        None if stderr.is_empty() => error,
        None => error.with("message", stderr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_execution_error() {
        let error = parse_osascript_error(
            "52:68: execution error: Terminal got an error: Can’t get window 9. (-1728)",
        );

        assert_eq!(error.details["range"], "52..68");
        assert_eq!(error.details["message"], "Terminal got an error: Can’t get window 9.");
        assert_eq!(error.details["number"], "-1728");
    }

    #[test]
    fn parses_syntax_error_without_number() {
        let error = parse_osascript_error("0:4: syntax error: A unknown token can’t go here.");

        assert_eq!(error.details["range"], "0..4");
        assert_eq!(error.details["message"], "A unknown token can’t go here.");
        assert!(!error.details.contains_key("number"));
    }

    #[test]
    fn keeps_unrecognised_output_verbatim() {
        let error = parse_osascript_error("osascript: no such file");
        assert_eq!(error.details["message"], "osascript: no such file");
        assert!(parse_osascript_error("").details.is_empty());
    }

    #[test]
    fn missing_program_is_reported() {
        let engine = OsaScript::with_program("/nonexistent/osascript");
        let error = engine.execute("return 1").unwrap_err();

        assert_eq!(error.details["program"], "/nonexistent/osascript");
        assert!(error.details.contains_key("message"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_reports_status() {
        let engine = OsaScript::with_program("/bin/false");
        let error = engine.execute("return 1").unwrap_err();
        assert_eq!(error.details["status"], "1");
    }
}
