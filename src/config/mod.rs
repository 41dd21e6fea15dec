//! Configuration loading and management

mod io;
mod settings;

pub use settings::{DatabaseSettings, EngineTuning};

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::ActivityType;
use crate::gamification::{
    AchievementCatalog, AchievementConfig, DailyCaps, EngineSettings, GamificationError, Level,
    LevelTable, MultiplierStep, StreakMultiplierTable, XpSettings, builtin_achievement_configs,
};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineTuning,

    /// Base XP per activity
    #[serde(default)]
    pub xp: XpSettings,

    /// Activity type -> max XP per calendar day. Activities not listed are uncapped.
    #[serde(default = "default_daily_caps")]
    pub daily_caps: BTreeMap<String, u64>,

    /// Level thresholds, level 1 at 0 XP
    #[serde(default = "default_levels")]
    pub levels: Vec<Level>,

    /// Streak length -> XP factor breakpoints
    #[serde(default = "default_streak_multipliers")]
    pub streak_multipliers: Vec<MultiplierStep>,

    /// Achievement catalog
    #[serde(default = "builtin_achievement_configs")]
    pub achievements: Vec<AchievementConfig>,
}

fn default_daily_caps() -> BTreeMap<String, u64> {
    BTreeMap::from([
        (ActivityType::FlashcardReview.as_str().to_string(), 50),
        (ActivityType::SessionComplete.as_str().to_string(), 200),
    ])
}

fn default_levels() -> Vec<Level> {
    LevelTable::default().levels().to_vec()
}

fn default_streak_multipliers() -> Vec<MultiplierStep> {
    StreakMultiplierTable::default().steps()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            engine: EngineTuning::default(),
            xp: XpSettings::default(),
            daily_caps: default_daily_caps(),
            levels: default_levels(),
            streak_multipliers: default_streak_multipliers(),
            achievements: builtin_achievement_configs(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validated daily caps
    pub fn daily_caps(&self) -> Result<DailyCaps, GamificationError> {
        let mut caps = DailyCaps::default();
        for (name, cap) in &self.daily_caps {
            let activity = ActivityType::from_str(name).ok_or_else(|| {
                GamificationError::Config(format!("unknown activity type '{}' in daily_caps", name))
            })?;
            if activity == ActivityType::AchievementReward {
                return Err(GamificationError::Config(
                    "achievement rewards cannot be capped".to_string(),
                ));
            }
            caps = caps.with_cap(activity, *cap);
        }
        Ok(caps)
    }

    /// Validate every table and build what the engine runs with
    pub fn build(&self) -> Result<(EngineSettings, AchievementCatalog), GamificationError> {
        self.xp.validate().map_err(GamificationError::Config)?;
        if self.engine.timeout_ms == 0 {
            return Err(GamificationError::Config(
                "engine.timeout_ms must be positive".to_string(),
            ));
        }

        let settings = EngineSettings {
            levels: LevelTable::new(self.levels.clone())?,
            multipliers: StreakMultiplierTable::new(&self.streak_multipliers)?,
            caps: self.daily_caps()?,
            xp: self.xp,
            timeout: self.engine.timeout(),
            lock_wait: self.engine.lock_wait(),
        };
        let catalog = AchievementCatalog::from_configs(&self.achievements, self.engine.strict_catalog)?;

        tracing::debug!(
            levels = settings.levels.max_level(),
            achievements = catalog.len(),
            strict = self.engine.strict_catalog,
            "Engine configuration validated"
        );

        Ok((settings, catalog))
    }
}
