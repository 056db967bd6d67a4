//! Structured error types for pvtrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use crate::events::RecordKind;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed {kind} record: expected {expected} bytes, got {actual}")]
    MalformedRecord {
        kind: RecordKind,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown process record state: {0}")]
    UnknownState(u32),
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to load BPF object {path}: {error}")]
    LoadFailed { path: String, error: String },

    #[error("Program {0} not found in BPF object")]
    ProgramNotFound(String),

    #[error("Failed to attach {probe} to {symbol} in {library}: {error}")]
    AttachFailed {
        probe: String,
        symbol: String,
        library: String,
        error: String,
    },

    #[error("Ring buffer {0} not found in BPF object")]
    RingBufferNotFound(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required argument: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_display() {
        let err = DecodeError::MalformedRecord {
            kind: RecordKind::Put,
            expected: 248,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "Malformed put record: expected 248 bytes, got 12"
        );
    }

    #[test]
    fn test_attach_error() {
        let err = ProbeError::AttachFailed {
            probe: "enter_process".to_string(),
            symbol: "dbProcess".to_string(),
            library: "/opt/epics/lib/libdbCore.so".to_string(),
            error: "symbol not found".to_string(),
        };
        assert!(err.to_string().contains("enter_process"));
        assert!(err.to_string().contains("libdbCore.so"));
    }

    #[test]
    fn test_load_error_names_object() {
        let err = ProbeError::LoadFailed {
            path: "pvtrace.bpf.o".to_string(),
            error: "invalid ELF".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load BPF object pvtrace.bpf.o: invalid ELF"
        );
    }

    #[test]
    fn test_missing_argument_wording() {
        let err = ConfigError::Missing("--path");
        assert_eq!(err.to_string(), "Missing required argument: --path");
    }
}
