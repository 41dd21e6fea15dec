//! Persistence for gamification state
//!
//! The engine talks to storage only through [`GamificationStore`]. A commit
//! writes the student row, the XP award log entries, and new achievement
//! unlocks atomically, guarded by an optimistic version check.
//!
//! # Layout
//!
//! ```text
//! student_gamification   one row per student (xp, level, streak, version)
//! xp_awards              append-only award log (rebuilds daily cap tallies)
//! student_achievements   unlocked achievement ids with unlock time
//! ```

mod db;
mod memory;
mod tallies;

pub use db::SqliteStore;
pub use memory::MemoryStore;
pub use tallies::SqliteTallyProvider;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{ActivityType, StudentId};
use crate::gamification::StudentGamificationState;

/// Storage-layer errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another writer committed first (optimistic version check failed)
    #[error("Version conflict for student {student} (expected version {expected_version})")]
    Conflict {
        student: String,
        expected_version: u64,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored data could not be decoded
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    /// Storage unavailable for another reason
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// One entry of the append-only XP award log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XpAwardRecord {
    pub id: String,
    pub student_id: StudentId,
    pub activity_type: ActivityType,
    pub amount: u64,
    pub day: NaiveDate,
    pub resulting_total: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Everything one orchestration writes, applied all-or-nothing
#[derive(Debug, Clone)]
pub struct StateCommit {
    /// New state; its `version` is the version the orchestration loaded
    pub state: StudentGamificationState,
    pub awards: Vec<XpAwardRecord>,
    /// Achievement ids unlocked by this orchestration
    pub unlocked: Vec<(String, DateTime<Utc>)>,
}

/// Repository interface over the transactional store
pub trait GamificationStore: Send + Sync {
    /// Load a student's state; a student without a row gets zero defaults.
    ///
    /// Daily XP tallies are rebuilt from the award log for `as_of`.
    fn load_state(
        &self,
        student: &StudentId,
        as_of: NaiveDate,
    ) -> Result<StudentGamificationState, StoreError>;

    /// Atomically persist a commit. Fails with [`StoreError::Conflict`] when the
    /// stored version differs from `commit.state.version`. Returns the new version.
    fn commit(&self, commit: &StateCommit) -> Result<u64, StoreError>;

    /// Most recent XP awards first
    fn xp_history(&self, student: &StudentId, limit: usize)
    -> Result<Vec<XpAwardRecord>, StoreError>;
}
