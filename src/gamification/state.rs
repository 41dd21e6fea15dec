//! Per-student gamification state and the statistics snapshot used for achievements

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ActivityType, StudentId};

/// XP already awarded for one activity type on one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTally {
    pub date: NaiveDate,
    pub awarded: u64,
}

/// Everything the engine owns about a student.
///
/// `level` is always derived from `total_xp` through the level table and
/// `streak_longest >= streak_current` holds after every streak update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentGamificationState {
    pub student_id: StudentId,
    pub total_xp: u64,
    pub level: u32,
    pub streak_current: u32,
    pub streak_longest: u32,
    pub last_active_date: Option<NaiveDate>,
    pub daily_xp: HashMap<ActivityType, DailyTally>,
    /// Achievement id -> unlock time
    pub unlocked_achievements: BTreeMap<String, DateTime<Utc>>,
    /// Optimistic concurrency version; bumped by every commit
    pub version: u64,
}

impl StudentGamificationState {
    /// Zero-default state for a newly created student
    pub fn new(student_id: impl Into<StudentId>) -> Self {
        Self {
            student_id: student_id.into(),
            total_xp: 0,
            level: 1,
            streak_current: 0,
            streak_longest: 0,
            last_active_date: None,
            daily_xp: HashMap::new(),
            unlocked_achievements: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn is_unlocked(&self, achievement_id: &str) -> bool {
        self.unlocked_achievements.contains_key(achievement_id)
    }

    /// XP awarded today for an activity, treating a stale tally as zero
    pub fn awarded_on(&self, activity: ActivityType, date: NaiveDate) -> u64 {
        match self.daily_xp.get(&activity) {
            Some(tally) if tally.date == date => tally.awarded,
            _ => 0,
        }
    }
}

/// Statistics owned by other subsystems (sessions, flashcards, curriculum)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningStats {
    pub sessions_completed: u64,
    pub outcomes_mastered: u64,
    /// Sessions where correct answers == attempted answers and attempted > 0
    pub perfect_sessions: u64,
    pub flashcard_reviews: u64,
    #[serde(default)]
    pub sessions_by_subject: HashMap<String, u64>,
}

/// Read-only aggregate evaluated against the achievement catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub sessions_completed: u64,
    pub current_streak: u32,
    pub level: u32,
    pub total_xp: u64,
    pub outcomes_mastered: u64,
    pub perfect_sessions: u64,
    pub flashcard_reviews: u64,
    pub sessions_by_subject: HashMap<String, u64>,
}

impl StatsSnapshot {
    /// Combine externally-owned stats with the engine's own state
    pub fn new(state: &StudentGamificationState, learning: &LearningStats) -> Self {
        Self {
            sessions_completed: learning.sessions_completed,
            current_streak: state.streak_current,
            level: state.level,
            total_xp: state.total_xp,
            outcomes_mastered: learning.outcomes_mastered,
            perfect_sessions: learning.perfect_sessions,
            flashcard_reviews: learning.flashcard_reviews,
            sessions_by_subject: learning.sessions_by_subject.clone(),
        }
    }

    /// Refresh the fields the engine itself changes (after an XP reward)
    pub fn refresh_from(&mut self, state: &StudentGamificationState) {
        self.current_streak = state.streak_current;
        self.level = state.level;
        self.total_xp = state.total_xp;
    }

    pub fn subject_sessions(&self, subject: &str) -> u64 {
        self.sessions_by_subject.get(subject).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_has_zero_defaults() {
        let state = StudentGamificationState::new("s1");
        assert_eq!(state.total_xp, 0);
        assert_eq!(state.level, 1);
        assert_eq!(state.streak_current, 0);
        assert_eq!(state.streak_longest, 0);
        assert!(state.last_active_date.is_none());
        assert!(state.unlocked_achievements.is_empty());
    }

    #[test]
    fn test_awarded_on_ignores_stale_tally() {
        let mut state = StudentGamificationState::new("s1");
        let yesterday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        state.daily_xp.insert(
            ActivityType::FlashcardReview,
            DailyTally {
                date: yesterday,
                awarded: 40,
            },
        );
        assert_eq!(state.awarded_on(ActivityType::FlashcardReview, yesterday), 40);
        assert_eq!(state.awarded_on(ActivityType::FlashcardReview, today), 0);
        assert_eq!(state.awarded_on(ActivityType::SessionComplete, yesterday), 0);
    }

    #[test]
    fn test_snapshot_combines_sources() {
        let mut state = StudentGamificationState::new("s1");
        state.total_xp = 420;
        state.level = 3;
        state.streak_current = 4;
        let mut learning = LearningStats {
            sessions_completed: 12,
            ..Default::default()
        };
        learning.sessions_by_subject.insert("math".into(), 7);

        let snapshot = StatsSnapshot::new(&state, &learning);
        assert_eq!(snapshot.sessions_completed, 12);
        assert_eq!(snapshot.total_xp, 420);
        assert_eq!(snapshot.current_streak, 4);
        assert_eq!(snapshot.subject_sessions("math"), 7);
        assert_eq!(snapshot.subject_sessions("art"), 0);
    }
}
