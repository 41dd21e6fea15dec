//! Learning statistics owned by other subsystems
//!
//! The engine never counts sessions or mastered outcomes itself; it asks a
//! [`StatsProvider`] right before evaluating achievements.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::state::LearningStats;
use crate::domain::{ActivityEvent, ActivityPayload, StudentId};
use crate::store::StoreError;

/// Source of the externally-owned fields of a stats snapshot
pub trait StatsProvider: Send + Sync {
    fn learning_stats(&self, student: &StudentId) -> Result<LearningStats, StoreError>;
}

#[derive(Debug, Default)]
struct Tallies {
    stats: LearningStats,
    outcomes: HashSet<String>,
}

impl Tallies {
    fn record(&mut self, event: &ActivityEvent) {
        match &event.payload {
            ActivityPayload::Session { .. } => {
                self.stats.sessions_completed += 1;
                if event.payload.is_perfect_session() {
                    self.stats.perfect_sessions += 1;
                }
                if let Some(subject) = &event.subject_id {
                    *self
                        .stats
                        .sessions_by_subject
                        .entry(subject.clone())
                        .or_insert(0) += 1;
                }
            }
            ActivityPayload::FlashcardReview { .. } => self.stats.flashcard_reviews += 1,
            ActivityPayload::Goal { goal_id } => {
                if self.outcomes.insert(goal_id.clone()) {
                    self.stats.outcomes_mastered = self.outcomes.len() as u64;
                }
            }
        }
    }
}

/// Stats kept in memory, fed by [`InMemoryStatsProvider::record_event`] or set directly
#[derive(Debug, Default)]
pub struct InMemoryStatsProvider {
    students: RwLock<HashMap<StudentId, Tallies>>,
}

impl InMemoryStatsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<StudentId, Tallies>> {
        self.students.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<StudentId, Tallies>> {
        self.students.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a learning event the way the owning subsystem would
    pub fn record_event(&self, event: &ActivityEvent) {
        self.write()
            .entry(event.student_id.clone())
            .or_default()
            .record(event);
    }

    /// Replace a student's stats wholesale
    pub fn set_stats(&self, student: &StudentId, stats: LearningStats) {
        let mut students = self.write();
        let tallies = students.entry(student.clone()).or_default();
        tallies.stats = stats;
        tallies.outcomes.clear();
    }
}

impl StatsProvider for InMemoryStatsProvider {
    fn learning_stats(&self, student: &StudentId) -> Result<LearningStats, StoreError> {
        Ok(self
            .read()
            .get(student)
            .map(|tallies| tallies.stats.clone())
            .unwrap_or_default())
    }
}
