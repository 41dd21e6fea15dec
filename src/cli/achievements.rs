//! Achievements command implementation

use anyhow::Result;
use std::path::Path;

use studyquest::StudentId;

use super::{open_engine, progress_bar};

/// List unlocked achievements, or locked ones with progress
pub fn achievements_command(
    config_path: Option<&Path>,
    student: &str,
    locked: bool,
    json: bool,
) -> Result<()> {
    let engine = open_engine(config_path)?;
    let student = StudentId::new(student);

    if locked {
        let locked = engine.get_locked_achievements_with_progress(&student)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&locked)?);
            return Ok(());
        }
        if locked.is_empty() {
            println!("All achievements unlocked.");
            return Ok(());
        }
        println!("Locked achievements ({}):\n", locked.len());
        for achievement in locked {
            println!(
                "  {} {:>3}% {:<24} {} (+{} XP)",
                progress_bar(achievement.progress.percent),
                achievement.progress.percent,
                achievement.name,
                achievement.progress.text,
                achievement.xp_reward
            );
        }
        return Ok(());
    }

    let unlocked = engine.get_unlocked_achievements(&student)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&unlocked)?);
        return Ok(());
    }
    if unlocked.is_empty() {
        println!("No achievements unlocked yet.");
        return Ok(());
    }
    println!("Unlocked achievements ({}):\n", unlocked.len());
    for achievement in unlocked {
        println!(
            "  {} [{}] {} - {}",
            achievement.unlocked_at.format("%Y-%m-%d"),
            achievement.category.label(),
            achievement.name,
            achievement.description
        );
    }
    Ok(())
}
