//! In-process store for tests and simulations

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;

use super::{GamificationStore, StateCommit, StoreError, XpAwardRecord};
use crate::domain::StudentId;
use crate::gamification::{DailyTally, StudentGamificationState};

#[derive(Debug)]
struct StudentRecord {
    state: StudentGamificationState,
    awards: Vec<XpAwardRecord>,
}

/// Gamification store held in memory.
///
/// Commits apply the same version check as [`super::SqliteStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    students: Mutex<HashMap<StudentId, StudentRecord>>,
    failing_commits: AtomicUsize,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn students(&self) -> MutexGuard<'_, HashMap<StudentId, StudentRecord>> {
        self.students.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` commits fail with [`StoreError::Unavailable`]
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Full award log of a student in commit order
    pub fn awards(&self, student: &StudentId) -> Vec<XpAwardRecord> {
        self.students()
            .get(student)
            .map(|record| record.awards.clone())
            .unwrap_or_default()
    }

    pub fn delete_student(&self, student: &StudentId) -> bool {
        self.students().remove(student).is_some()
    }
}

impl GamificationStore for MemoryStore {
    fn load_state(
        &self,
        student: &StudentId,
        as_of: NaiveDate,
    ) -> Result<StudentGamificationState, StoreError> {
        let students = self.students();
        let Some(record) = students.get(student) else {
            return Ok(StudentGamificationState::new(student));
        };

        let mut state = record.state.clone();
        state.daily_xp.clear();
        for award in record.awards.iter().filter(|a| a.day == as_of) {
            let tally = state
                .daily_xp
                .entry(award.activity_type)
                .or_insert(DailyTally {
                    date: as_of,
                    awarded: 0,
                });
            tally.awarded = tally.awarded.saturating_add(award.amount);
        }
        Ok(state)
    }

    fn commit(&self, commit: &StateCommit) -> Result<u64, StoreError> {
        let injected = self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        let mut students = self.students();
        let student = &commit.state.student_id;
        let stored_version = students.get(student).map_or(0, |r| r.state.version);
        if stored_version != commit.state.version {
            return Err(StoreError::Conflict {
                student: student.to_string(),
                expected_version: commit.state.version,
            });
        }

        let record = students
            .entry(student.clone())
            .or_insert_with(|| StudentRecord {
                state: StudentGamificationState::new(student),
                awards: Vec::new(),
            });
        if let Some((id, _)) = commit
            .unlocked
            .iter()
            .find(|(id, _)| record.state.is_unlocked(id))
        {
            return Err(StoreError::Corrupt(format!(
                "achievement {} already unlocked for {}",
                id, student
            )));
        }

        let mut state = commit.state.clone();
        state.version = stored_version + 1;
        // Tallies are rebuilt from the award log on load
        state.daily_xp.clear();
        record.state = state;
        record.awards.extend(commit.awards.iter().cloned());
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(stored_version + 1)
    }

    fn xp_history(
        &self,
        student: &StudentId,
        limit: usize,
    ) -> Result<Vec<XpAwardRecord>, StoreError> {
        Ok(self
            .students()
            .get(student)
            .map(|record| record.awards.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
