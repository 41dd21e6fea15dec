//! Error taxonomy for the gamification engine

use crate::store::StoreError;

/// Errors surfaced by the engine to its callers
#[derive(Debug, thiserror::Error)]
pub enum GamificationError {
    /// Negative or non-finite XP requested; rejected before any mutation
    #[error("Invalid XP amount: {0}")]
    InvalidAmount(i64),

    /// Event payload is malformed or inconsistent with its activity type
    #[error("Invalid activity event: {0}")]
    InvalidEvent(String),

    /// Achievement catalog references a statistic the snapshot does not supply
    #[error("Unknown requirement type '{requirement}' in achievement '{achievement}'")]
    UnknownRequirementType {
        achievement: String,
        requirement: String,
    },

    /// Per-student lock or optimistic version check failed; retry with backoff
    #[error("Concurrent update for student {0}, retry later")]
    ConcurrencyConflict(String),

    /// Storage failed; nothing from this orchestration was persisted
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[source] StoreError),

    /// Orchestration exceeded its deadline; nothing was persisted
    #[error("Orchestration for student {student} exceeded {timeout_ms}ms")]
    Timeout { student: String, timeout_ms: u64 },

    /// Invalid level table, multiplier table, or catalog
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GamificationError {
    /// Infrastructure failures are worth retrying; validation failures are not
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict(_) | Self::PersistenceFailure(_) | Self::Timeout { .. }
        )
    }
}

impl From<StoreError> for GamificationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { student, .. } => Self::ConcurrencyConflict(student),
            other => Self::PersistenceFailure(other),
        }
    }
}
