//! Error types for procgroup.

use crate::pool::Phase;
use thiserror::Error;

/// Main error type for procgroup.
#[derive(Error, Debug)]
pub enum ProcgroupError {
    #[error("worker count must be between 1 and {max}, got {requested}")]
    InvalidWorkerCount { requested: i64, max: usize },

    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install SIGINT handler: {0}")]
    SignalInstall(nix::errno::Errno),

    #[error("supervisor is in the {actual} phase, expected {expected}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("cannot fill worker slot {index}: next free slot is {next} of {capacity}")]
    SlotUnavailable {
        index: usize,
        next: usize,
        capacity: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for procgroup operations.
pub type Result<T> = std::result::Result<T, ProcgroupError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_invalid_worker_count_message() {
        let err = ProcgroupError::InvalidWorkerCount {
            requested: 25,
            max: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("between 1 and 20"));
        assert!(msg.contains("25"));
    }

    #[test]
    fn test_negative_worker_count_message() {
        let err = ProcgroupError::InvalidWorkerCount {
            requested: -1,
            max: 20,
        };
        assert!(err.to_string().ends_with("got -1"));
    }

    #[test]
    fn test_spawn_error_keeps_source() {
        let err = ProcgroupError::Spawn {
            index: 3,
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("worker 3"));
        let source = std::error::Error::source(&err).expect("spawn error has a source");
        assert!(source.to_string().contains("no such file"));
    }

    #[test]
    fn test_invalid_phase_message() {
        let err = ProcgroupError::InvalidPhase {
            expected: Phase::Running,
            actual: Phase::Starting,
        };
        let msg = err.to_string();
        assert!(msg.contains("starting"));
        assert!(msg.contains("running"));
    }

    #[test]
    fn test_slot_unavailable_message() {
        let err = ProcgroupError::SlotUnavailable {
            index: 4,
            next: 2,
            capacity: 5,
        };
        assert_eq!(
            err.to_string(),
            "cannot fill worker slot 4: next free slot is 2 of 5"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: ProcgroupError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }
}
