//! Base XP amounts per activity

use serde::{Deserialize, Serialize};

use crate::domain::ActivityPayload;

/// Base XP for each kind of learning activity, before the streak multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XpSettings {
    pub session_complete: i64,
    /// Added on top of `session_complete` for a perfect session
    pub perfect_session_bonus: i64,
    pub flashcard_correct: i64,
    pub flashcard_incorrect: i64,
    pub goal_achieved: i64,
}

impl Default for XpSettings {
    fn default() -> Self {
        Self {
            session_complete: 20,
            perfect_session_bonus: 10,
            flashcard_correct: 5,
            flashcard_incorrect: 2,
            goal_achieved: 50,
        }
    }
}

impl XpSettings {
    /// Base XP earned by an activity payload
    pub fn base_for(&self, payload: &ActivityPayload) -> i64 {
        match payload {
            ActivityPayload::Session { .. } if payload.is_perfect_session() => {
                self.session_complete.saturating_add(self.perfect_session_bonus)
            }
            ActivityPayload::Session { .. } => self.session_complete,
            ActivityPayload::FlashcardReview { correct: true } => self.flashcard_correct,
            ActivityPayload::FlashcardReview { correct: false } => self.flashcard_incorrect,
            ActivityPayload::Goal { .. } => self.goal_achieved,
        }
    }

    /// Reject negative amounts
    pub fn validate(&self) -> Result<(), String> {
        let amounts = [
            ("session_complete", self.session_complete),
            ("perfect_session_bonus", self.perfect_session_bonus),
            ("flashcard_correct", self.flashcard_correct),
            ("flashcard_incorrect", self.flashcard_incorrect),
            ("goal_achieved", self.goal_achieved),
        ];
        match amounts.iter().find(|(_, amount)| *amount < 0) {
            Some((name, amount)) => Err(format!("xp.{} must not be negative, got {}", name, amount)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_for_payloads() {
        let xp = XpSettings::default();
        let perfect = ActivityPayload::Session {
            correct_answers: 8,
            attempted_answers: 8,
        };
        let partial = ActivityPayload::Session {
            correct_answers: 5,
            attempted_answers: 8,
        };
        assert_eq!(xp.base_for(&perfect), 30);
        assert_eq!(xp.base_for(&partial), 20);
        assert_eq!(xp.base_for(&ActivityPayload::FlashcardReview { correct: true }), 5);
        assert_eq!(xp.base_for(&ActivityPayload::FlashcardReview { correct: false }), 2);
        assert_eq!(
            xp.base_for(&ActivityPayload::Goal {
                goal_id: "g".into()
            }),
            50
        );
    }

    #[test]
    fn test_negative_amount_is_invalid() {
        let xp = XpSettings {
            flashcard_incorrect: -1,
            ..Default::default()
        };
        assert!(xp.validate().unwrap_err().contains("flashcard_incorrect"));
        assert!(XpSettings::default().validate().is_ok());
    }
}
