//! Stats command implementation

use anyhow::Result;
use std::path::Path;

use studyquest::StudentId;

use super::{open_engine, progress_bar};

/// Show level, XP and streak of a student
pub fn stats_command(config_path: Option<&Path>, student: &str, json: bool) -> Result<()> {
    let engine = open_engine(config_path)?;
    let stats = engine.get_stats(&StudentId::new(student))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let level = &stats.level;
    println!("{} - Level {} {}", stats.student_id, level.level, level.title);
    match level.next_level_xp {
        Some(next) => {
            let percent = (level.progress_to_next() * 100.0).floor() as u8;
            println!("  XP: {} / {} {} {}%", level.total_xp, next, progress_bar(percent), percent);
        }
        None => println!("  XP: {} (max level)", level.total_xp),
    }
    println!(
        "  Streak: {} day(s), best {} ({:.2}x XP)",
        stats.current_streak, stats.longest_streak, stats.streak_multiplier
    );
    if let Some(last) = stats.last_active_date {
        println!("  Last active: {}", last);
    }
    println!("  XP today: {}", stats.xp_today);
    println!(
        "  Achievements: {}/{}",
        stats.achievements_unlocked, stats.achievements_total
    );
    println!(
        "  Sessions: {} ({} perfect), flashcards: {}, outcomes mastered: {}",
        stats.learning.sessions_completed,
        stats.learning.perfect_sessions,
        stats.learning.flashcard_reviews,
        stats.learning.outcomes_mastered
    );

    Ok(())
}
