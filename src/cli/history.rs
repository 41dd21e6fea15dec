//! History command implementation

use anyhow::Result;
use std::path::Path;

use studyquest::StudentId;

use super::open_engine;

/// Show the most recent XP awards of a student
pub fn history_command(config_path: Option<&Path>, student: &str, limit: usize) -> Result<()> {
    let engine = open_engine(config_path)?;
    let history = engine.xp_history(&StudentId::new(student), limit)?;

    if history.is_empty() {
        println!("No XP awarded yet.");
        return Ok(());
    }

    for record in history {
        println!(
            "  {}  {:<18} +{:<5} total {}",
            record.day, record.activity_type.as_str(), record.amount, record.resulting_total
        );
    }
    Ok(())
}
