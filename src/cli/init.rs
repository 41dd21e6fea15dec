//! Init command implementation

use anyhow::{Result, bail};
use std::path::PathBuf;

use studyquest::config::EngineConfig;
use studyquest::store::SqliteStore;

/// Write the default config (global unless --config is given) and create the database
pub fn init_command(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = config_path.unwrap_or_else(EngineConfig::global_config_path);

    if !EngineConfig::init_file(&config_path, force)? {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }
    println!("Created: {}", config_path.display());

    let config = EngineConfig::from_file(&config_path)?;
    let db_path = config.database_path();
    SqliteStore::open(&db_path)?;
    println!("Database: {}", db_path.display());

    Ok(())
}
