//! Catalog command implementation

use anyhow::{Context, Result};
use std::path::Path;

use studyquest::config::EngineConfig;

/// Validate all tables with unknown requirement types treated as errors
pub fn validate_command(config_path: Option<&Path>) -> Result<()> {
    let mut config = EngineConfig::load(config_path)?;
    config.engine.strict_catalog = true;

    let (settings, catalog) = config.build().context("Catalog validation failed")?;

    println!("Configuration OK");
    println!("  Levels: {}", settings.levels.max_level());
    println!("  Streak multiplier steps: {}", settings.multipliers.steps().len());
    println!(
        "  Achievements: {} ({} XP in rewards)",
        catalog.len(),
        catalog.total_xp()
    );
    Ok(())
}
