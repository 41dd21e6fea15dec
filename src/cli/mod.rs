//! CLI command implementations

pub mod achievements;
pub mod catalog;
pub mod event;
pub mod history;
pub mod init;
pub mod simulate;
pub mod stats;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use studyquest::config::EngineConfig;
use studyquest::gamification::GamificationEngine;
use studyquest::store::{SqliteStore, SqliteTallyProvider};

/// Engine over the on-disk database
pub type SqliteEngine = GamificationEngine<SqliteStore, SqliteTallyProvider>;

/// Load config, validate it, and open the database it points to
pub fn open_engine(config_path: Option<&Path>) -> Result<SqliteEngine> {
    let config = EngineConfig::load(config_path)?;
    let (settings, catalog) = config.build().context("Invalid configuration")?;
    let store = SqliteStore::open(&config.database_path())?;
    let tallies = SqliteTallyProvider::new(store.clone());
    Ok(GamificationEngine::new(settings, Arc::new(catalog), store, tallies))
}

/// Ten-cell text progress bar
pub fn progress_bar(percent: u8) -> String {
    let filled = (percent.min(100) / 10) as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(10 - filled))
}
