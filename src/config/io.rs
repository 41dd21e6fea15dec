//! Configuration file I/O operations

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::EngineConfig;

const CONFIG_HEADER: &str = "# StudyQuest gamification settings\n# Unlisted keys fall back to built-in defaults.\n\n";

impl EngineConfig {
    /// Get the global config directory path (~/.studyquest/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".studyquest")
    }

    /// Get the global config file path (~/.studyquest/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Database file: `[database] path` or `~/.studyquest/studyquest.db`
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("studyquest.db"))
    }

    /// Load `path` if given, else the global config, else built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let global_path = Self::global_config_path();
        if global_path.exists() {
            Self::from_file(&global_path)
        } else {
            tracing::debug!(path = %global_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Write the config as TOML to `path`.
    ///
    /// Writers are serialized on `<path>.lock`; readers only ever see a
    /// complete file because the content is renamed into place.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let body = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let content = format!("{}{}", CONFIG_HEADER, body);

        let lock = File::create(path.with_extension("toml.lock"))
            .with_context(|| format!("Failed to lock config: {}", path.display()))?;
        lock.lock_exclusive().context("Failed to acquire config lock")?;

        let staged = path.with_extension("toml.tmp");
        std::fs::write(&staged, content)
            .with_context(|| format!("Failed to write {}", staged.display()))?;
        std::fs::rename(&staged, path)
            .with_context(|| format!("Failed to replace config file: {}", path.display()))
    }

    /// Write the default config to `path` unless a file already exists there.
    ///
    /// Returns true when a file was written.
    pub fn init_file(path: &Path, force: bool) -> Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }
        Self::default().save_to_file(path)?;
        tracing::info!(path = %path.display(), "Wrote default config");
        Ok(true)
    }
}
