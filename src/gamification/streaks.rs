//! Daily streak tracking
//!
//! Streaks count consecutive calendar days with at least one qualifying
//! activity. The caller supplies the activity date already resolved to the
//! student's timezone; day differences are computed on calendar dates.

use chrono::NaiveDate;
use serde::Serialize;

use super::state::StudentGamificationState;

/// What happened to the streak for one activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First qualifying activity ever
    Started,
    /// Activity on the day after the last one
    Incremented,
    /// Already counted today (or a backdated event)
    UnchangedSameDay,
    /// One or more days were missed; streak restarted at 1
    ResetThenStarted,
}

impl StreakChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Incremented => "incremented",
            Self::UnchangedSameDay => "unchanged",
            Self::ResetThenStarted => "reset",
        }
    }
}

/// Streak info handed to notification/UI collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakInfo {
    pub current: u32,
    pub longest: u32,
    pub change: StreakChange,
    pub last_active_date: Option<NaiveDate>,
}

/// Apply an activity on `occurred_on` to the streak fields of `state`
pub fn update_streak(state: &mut StudentGamificationState, occurred_on: NaiveDate) -> StreakChange {
    let change = match state.last_active_date {
        None => {
            state.streak_current = 1;
            StreakChange::Started
        }
        Some(last_date) => {
            let days_since = (occurred_on - last_date).num_days();
            match days_since {
                0 => StreakChange::UnchangedSameDay,
                1 => {
                    state.streak_current = state.streak_current.saturating_add(1);
                    StreakChange::Incremented
                }
                d if d > 1 => {
                    state.streak_current = 1;
                    StreakChange::ResetThenStarted
                }
                _ => {
                    // Out-of-order event: never move last_active_date backwards
                    tracing::warn!(
                        student = %state.student_id,
                        last_active = %last_date,
                        occurred_on = %occurred_on,
                        "Backdated activity ignored for streak"
                    );
                    return StreakChange::UnchangedSameDay;
                }
            }
        }
    };

    state.streak_longest = state.streak_longest.max(state.streak_current);
    state.last_active_date = Some(occurred_on);
    change
}

/// Current streak as seen on `today`: a streak whose last day is older than
/// yesterday has lapsed even though the stored count was not reset yet.
pub fn effective_streak(state: &StudentGamificationState, today: NaiveDate) -> u32 {
    match state.last_active_date {
        Some(last) if (today - last).num_days() <= 1 => state.streak_current,
        _ => 0,
    }
}
