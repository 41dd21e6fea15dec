use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::StudentId;

/// Kind of learning activity that can earn XP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// A study session was completed
    SessionComplete,
    /// A single flashcard was reviewed
    FlashcardReview,
    /// A learning goal was achieved
    GoalAchieved,
    /// One-off reward for unlocking an achievement (never capped)
    AchievementReward,
}

impl ActivityType {
    /// Get the string ID for database storage and config keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionComplete => "session_complete",
            Self::FlashcardReview => "flashcard_review",
            Self::GoalAchieved => "goal_achieved",
            Self::AchievementReward => "achievement_reward",
        }
    }

    /// Parse from database string (accepts `-` as separator too)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().replace('-', "_").as_str() {
            "session_complete" => Some(Self::SessionComplete),
            "flashcard_review" => Some(Self::FlashcardReview),
            "goal_achieved" => Some(Self::GoalAchieved),
            "achievement_reward" => Some(Self::AchievementReward),
            _ => None,
        }
    }

    /// Activity types a caller may submit as learning events
    pub fn learning_activities() -> &'static [ActivityType] {
        &[
            Self::SessionComplete,
            Self::FlashcardReview,
            Self::GoalAchieved,
        ]
    }

    /// Whether this activity counts toward the daily streak
    pub fn qualifies_for_streak(&self) -> bool {
        !matches!(self, Self::AchievementReward)
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity-specific data carried by an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityPayload {
    Session {
        correct_answers: u32,
        attempted_answers: u32,
    },
    FlashcardReview {
        correct: bool,
    },
    Goal {
        goal_id: String,
    },
}

impl ActivityPayload {
    /// A session where every attempted answer was correct (and at least one was attempted)
    pub fn is_perfect_session(&self) -> bool {
        match self {
            Self::Session {
                correct_answers,
                attempted_answers,
            } => *attempted_answers > 0 && correct_answers == attempted_answers,
            _ => false,
        }
    }
}

/// An incoming learning event. Not persisted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub student_id: StudentId,
    pub activity_type: ActivityType,
    /// Calendar date of the activity, already resolved to the student's timezone
    pub occurred_on: NaiveDate,
    #[serde(default)]
    pub subject_id: Option<String>,
    pub payload: ActivityPayload,
    /// Explicit base XP instead of the configured amount for this payload
    #[serde(default)]
    pub base_xp_override: Option<i64>,
}

impl ActivityEvent {
    pub fn session(
        student_id: impl Into<StudentId>,
        occurred_on: NaiveDate,
        correct_answers: u32,
        attempted_answers: u32,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            activity_type: ActivityType::SessionComplete,
            occurred_on,
            subject_id: None,
            payload: ActivityPayload::Session {
                correct_answers,
                attempted_answers,
            },
            base_xp_override: None,
        }
    }

    pub fn flashcard(student_id: impl Into<StudentId>, occurred_on: NaiveDate, correct: bool) -> Self {
        Self {
            student_id: student_id.into(),
            activity_type: ActivityType::FlashcardReview,
            occurred_on,
            subject_id: None,
            payload: ActivityPayload::FlashcardReview { correct },
            base_xp_override: None,
        }
    }

    pub fn goal(
        student_id: impl Into<StudentId>,
        occurred_on: NaiveDate,
        goal_id: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            activity_type: ActivityType::GoalAchieved,
            occurred_on,
            subject_id: None,
            payload: ActivityPayload::Goal {
                goal_id: goal_id.into(),
            },
            base_xp_override: None,
        }
    }

    /// Attach a subject to the event
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Use a fixed base XP amount instead of the configured one
    pub fn with_base_xp(mut self, amount: i64) -> Self {
        self.base_xp_override = Some(amount);
        self
    }

    /// Check that the payload matches the activity type and is internally consistent
    pub fn validate(&self) -> Result<(), String> {
        match (&self.activity_type, &self.payload) {
            (
                ActivityType::SessionComplete,
                ActivityPayload::Session {
                    correct_answers,
                    attempted_answers,
                },
            ) => {
                if correct_answers > attempted_answers {
                    return Err(format!(
                        "correct answers ({}) exceed attempted answers ({})",
                        correct_answers, attempted_answers
                    ));
                }
            }
            (ActivityType::FlashcardReview, ActivityPayload::FlashcardReview { .. }) => {}
            (ActivityType::GoalAchieved, ActivityPayload::Goal { goal_id }) => {
                if goal_id.trim().is_empty() {
                    return Err("goal id must not be empty".to_string());
                }
            }
            (ActivityType::AchievementReward, _) => {
                return Err("achievement rewards are awarded internally".to_string());
            }
            (activity, _) => {
                return Err(format!("payload does not match activity type {}", activity));
            }
        }

        if self.student_id.as_str().trim().is_empty() {
            return Err("student id must not be empty".to_string());
        }

        Ok(())
    }
}
