//! Error types for host calls, managers and dumps.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Structured error reported by the host platform itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Runtime failure caught at a host call boundary, with its source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub code: i64,
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl Fault {
    pub fn at(message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            code: 0,
            message: message.into(),
            file: file.into(),
            line,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Message in the `"<message> in <file> on line <line>"` form.
    pub fn located_message(&self) -> String {
        format!("{} in {} on line {}", self.message, self.file, self.line)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("{}: {}", .0.code, .0.message)]
    Platform(ErrorInfo),

    #[error("{}", .0.located_message())]
    Fault(Fault),
}

impl HostError {
    pub fn platform(code: impl Into<String>, message: impl Into<String>) -> Self {
        HostError::Platform(ErrorInfo::new(code, message))
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, HostError::Fault(_))
    }

    /// The `{"error": {"code", "message"}}` response shape.
    pub fn to_response(&self) -> Value {
        match self {
            HostError::Platform(info) => json!({
                "error": { "code": info.code, "message": info.message }
            }),
            HostError::Fault(fault) => json!({
                "error": { "code": fault.code, "message": fault.located_message() }
            }),
        }
    }
}

impl From<ErrorInfo> for HostError {
    fn from(info: ErrorInfo) -> Self {
        HostError::Platform(info)
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Build a [`HostError::Fault`] located at the call site.
#[macro_export]
macro_rules! host_fault {
    ($($arg:tt)*) => {
        $crate::error::HostError::Fault($crate::error::Fault::at(
            format!($($arg)*),
            file!(),
            line!(),
        ))
    };
}

/// Failures of read-only discovery calls (`all`, `tree`, `views`).
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Failed to list installed {kind}: {source}")]
    Discovery {
        kind: &'static str,
        #[source]
        source: HostError,
    },

    #[error("Database query failed: {0}")]
    Database(#[source] HostError),
}

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("External dump process failed: {0}")]
    Process(String),

    #[error("Dump I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dump query failed: {0}")]
    Host(#[from] HostError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_error_response_shape() {
        let err = HostError::platform("theme_active", "The theme is currently active.");
        assert_eq!(
            err.to_response(),
            json!({"error": {"code": "theme_active", "message": "The theme is currently active."}})
        );
    }

    #[test]
    fn fault_response_includes_location() {
        let err = HostError::Fault(Fault::at("boom", "src/host.rs", 42).with_code(7));
        let response = err.to_response();
        assert_eq!(response["error"]["code"], 7);
        assert_eq!(
            response["error"]["message"],
            "boom in src/host.rs on line 42"
        );
    }

    #[test]
    fn host_fault_macro_records_call_site() {
        let err = host_fault!("failed {}", 3);
        match err {
            HostError::Fault(fault) => {
                assert_eq!(fault.message, "failed 3");
                assert!(fault.file.ends_with("error.rs"));
                assert!(fault.line > 0);
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }
}
