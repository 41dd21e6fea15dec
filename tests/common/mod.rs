//! Shared test utilities for engine integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;

use studyquest::gamification::{
    AchievementCatalog, AchievementCategory, AchievementConfig, DailyCaps, EngineSettings,
    GamificationEngine, InMemoryStatsProvider, LevelTable, MultiplierStep, RequirementConfig,
    StreakMultiplierTable, XpSettings,
};
use studyquest::store::{MemoryStore, SqliteStore, SqliteTallyProvider};
use studyquest::ActivityType;

pub type MemoryEngine = GamificationEngine<MemoryStore, InMemoryStatsProvider>;
pub type SqliteEngine = GamificationEngine<SqliteStore, SqliteTallyProvider>;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Small tables: levels at [0,100,300,600,1000], multipliers {0:1.0, 3:1.05, 7:1.10},
/// flashcard reviews capped at 50 XP per day
pub fn scenario_settings() -> EngineSettings {
    let steps = [
        MultiplierStep {
            min_days: 0,
            multiplier: 1.0,
        },
        MultiplierStep {
            min_days: 3,
            multiplier: 1.05,
        },
        MultiplierStep {
            min_days: 7,
            multiplier: 1.10,
        },
    ];
    EngineSettings {
        levels: LevelTable::from_thresholds(&[0, 100, 300, 600, 1000]).expect("levels"),
        multipliers: StreakMultiplierTable::new(&steps).expect("multipliers"),
        caps: DailyCaps::default().with_cap(ActivityType::FlashcardReview, 50),
        xp: XpSettings::default(),
        timeout: Duration::from_secs(5),
        lock_wait: Duration::from_secs(5),
    }
}

pub fn requirement(kind: &str, target: u64) -> RequirementConfig {
    RequirementConfig {
        kind: kind.to_string(),
        target,
        subject: None,
    }
}

pub fn achievement(id: &str, xp_reward: u64, requirements: Vec<RequirementConfig>) -> AchievementConfig {
    AchievementConfig {
        id: id.to_string(),
        name: id.replace('_', " "),
        description: format!("Test achievement {}", id),
        category: AchievementCategory::Milestone,
        xp_reward,
        requirements,
    }
}

pub fn catalog(configs: &[AchievementConfig]) -> Arc<AchievementCatalog> {
    Arc::new(AchievementCatalog::from_configs(configs, true).expect("valid catalog"))
}

pub fn memory_engine(configs: &[AchievementConfig]) -> MemoryEngine {
    GamificationEngine::new(
        scenario_settings(),
        catalog(configs),
        MemoryStore::new(),
        InMemoryStatsProvider::new(),
    )
}

/// Engine over a fresh SQLite file inside a temp dir
pub fn sqlite_engine(configs: &[AchievementConfig]) -> (TempDir, SqliteEngine) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let engine = sqlite_engine_at(&dir, configs);
    (dir, engine)
}

/// Engine over the database in `dir` (shares data with other engines on the same dir)
pub fn sqlite_engine_at(dir: &TempDir, configs: &[AchievementConfig]) -> SqliteEngine {
    let store = SqliteStore::open(&dir.path().join("studyquest.db")).expect("Failed to open db");
    let tallies = SqliteTallyProvider::new(store.clone());
    GamificationEngine::new(scenario_settings(), catalog(configs), store, tallies)
}
