//! Fault-subsystem error types

use crate::types::{PartitionId, RecoveryPhase};
use thiserror::Error;

/// Errors surfaced by the fault subsystem
///
/// Symptom reports never fail and recovery failures travel inside
/// `RecoveryResult`; only argument validation and tracker admission
/// propagate through this type synchronously.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FaultError {
    #[error("partition mismatch: coordinator is bound to {expected}, got {actual}")]
    Mismatch {
        expected: PartitionId,
        actual: PartitionId,
    },

    #[error("operations are paused for recovery")]
    Paused,

    #[error("unknown partition: {0}")]
    UnknownPartition(PartitionId),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("recovery strategy failed: {0}")]
    Strategy(String),

    #[error("invalid recovery phase transition: {from} -> {to}")]
    InvalidTransition {
        from: RecoveryPhase,
        to: RecoveryPhase,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FaultError {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            FaultError::Mismatch { .. } => "mismatch",
            FaultError::Paused => "paused",
            FaultError::UnknownPartition(_) => "unknown_partition",
            FaultError::Timeout(_) => "timeout",
            FaultError::Strategy(_) => "strategy",
            FaultError::InvalidTransition { .. } => "invalid_transition",
            FaultError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, FaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_labels() {
        let p = PartitionId::new();
        assert_eq!(FaultError::Paused.error_type(), "paused");
        assert_eq!(FaultError::UnknownPartition(p).error_type(), "unknown_partition");
        assert_eq!(
            FaultError::InvalidTransition {
                from: RecoveryPhase::Idle,
                to: RecoveryPhase::Complete,
            }
            .error_type(),
            "invalid_transition"
        );
    }

    #[test]
    fn test_mismatch_message_names_both_partitions() {
        let expected = PartitionId::new();
        let actual = PartitionId::new();
        let message = FaultError::Mismatch { expected, actual }.to_string();
        assert!(message.contains(&expected.to_string()));
        assert!(message.contains(&actual.to_string()));
    }
}
