//! Event command implementation

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, Utc};
use clap::ValueEnum;
use std::path::Path;

use studyquest::ActivityEvent;
use studyquest::gamification::{GamificationEvent, ProcessOutcome};

use super::open_engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventKind {
    Session,
    Flashcard,
    Goal,
}

/// Event fields as given on the command line
#[derive(Debug)]
pub struct EventArgs {
    pub student: String,
    pub kind: EventKind,
    pub date: Option<NaiveDate>,
    pub correct: u32,
    pub attempted: u32,
    pub wrong: bool,
    pub goal: Option<String>,
    pub subject: Option<String>,
    pub xp: Option<i64>,
}

impl EventArgs {
    fn into_event(self) -> Result<ActivityEvent> {
        let date = self.date.unwrap_or_else(|| Utc::now().date_naive());
        let mut event = match self.kind {
            EventKind::Session => {
                ActivityEvent::session(self.student, date, self.correct, self.attempted)
            }
            EventKind::Flashcard => ActivityEvent::flashcard(self.student, date, !self.wrong),
            EventKind::Goal => {
                let goal = self.goal.ok_or_else(|| anyhow!("--goal is required for goal events"))?;
                ActivityEvent::goal(self.student, date, goal)
            }
        };
        if let Some(subject) = self.subject {
            event = event.with_subject(subject);
        }
        if let Some(xp) = self.xp {
            event = event.with_base_xp(xp);
        }
        Ok(event)
    }
}

/// Record the event with the learning tallies, then run it through the engine
pub fn event_command(config_path: Option<&Path>, args: EventArgs, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let event = args.into_event()?;
    event.validate().map_err(|e| anyhow!("Invalid event: {}", e))?;

    // The learning record is the primary write; gamification follows it
    engine.stats_provider().record_event(&event)?;
    let outcome = engine.process_event(&event)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &ProcessOutcome) {
    println!(
        "{} +{} XP ({} total, level {} - {})",
        outcome.student_id, outcome.xp_awarded, outcome.total_xp, outcome.new_level, outcome.level_title
    );

    for event in outcome.events() {
        match event {
            GamificationEvent::StreakExtended { days } => {
                println!("  Streak: {} day{}", days, if days == 1 { "" } else { "s" });
            }
            GamificationEvent::StreakReset { previous } => {
                println!("  Streak reset (was {} days), starting again at 1", previous);
            }
            GamificationEvent::XpAwarded { amount, reason } => {
                println!("  +{} XP  {}", amount, reason);
            }
            GamificationEvent::DailyCapReached {
                activity,
                requested,
                awarded,
            } => {
                println!(
                    "  Daily cap reached for {} ({} of {} XP awarded)",
                    activity, awarded, requested
                );
            }
            GamificationEvent::AchievementUnlocked(unlocked) => {
                println!("  Achievement unlocked: {} - {}", unlocked.name, unlocked.description);
            }
            GamificationEvent::LevelUp(level_up) => {
                println!(
                    "  Level up! {} -> {} ({})",
                    level_up.old_level, level_up.new_level, level_up.new_title
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyquest::ActivityPayload;

    fn args(kind: EventKind) -> EventArgs {
        EventArgs {
            student: "s1".to_string(),
            kind,
            date: NaiveDate::from_ymd_opt(2024, 3, 10),
            correct: 4,
            attempted: 5,
            wrong: false,
            goal: None,
            subject: Some("math".to_string()),
            xp: None,
        }
    }

    #[test]
    fn test_session_args_build_event() {
        let event = args(EventKind::Session).into_event().unwrap();
        assert_eq!(
            event.payload,
            ActivityPayload::Session {
                correct_answers: 4,
                attempted_answers: 5
            }
        );
        assert_eq!(event.subject_id.as_deref(), Some("math"));
    }

    #[test]
    fn test_goal_requires_goal_id() {
        assert!(args(EventKind::Goal).into_event().is_err());
    }
}
