//! Error types for the audit trail.

/// Errors from audit persistence and verification.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted audit log: {0}")]
    Corrupt(String),

    /// Recomputing the chain did not reproduce the recorded links.
    #[error("tamper detected at sequence {sequence_id}: expected {expected}, computed {computed}")]
    TamperDetected {
        sequence_id: u64,
        expected: String,
        computed: String,
    },
}
