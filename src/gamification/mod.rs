//! Gamification engine
//!
//! Turns learning events into XP, levels, daily streaks and achievements:
//! - Level table: XP thresholds and titles
//! - Streaks: consecutive active days with an XP multiplier
//! - XP ledger: per-activity daily caps
//! - Achievements: data-driven catalog with min-ratio progress
//! - Engine: per-student locking and all-or-nothing commits

pub mod checker;
pub mod definitions;
mod engine;
mod error;
pub mod ledger;
pub mod levels;
mod locks;
pub mod multiplier;
mod rewards;
mod state;
mod stats_provider;
pub mod streaks;

pub use checker::{AchievementProgress, MetricCache};
pub use definitions::{
    AchievementCatalog, AchievementCategory, AchievementConfig, AchievementDefinition, Metric,
    RequirementConfig, builtin_achievement_configs,
};
pub use engine::{
    EngineSettings, GamificationEngine, GamificationEvent, LevelUp, LockedAchievement,
    ProcessOutcome, StudentStats, UnlockedAchievement,
};
pub use error::GamificationError;
pub use ledger::{DailyCaps, MAX_TOTAL_XP, XpAward, XpLedger};
pub use levels::{Level, LevelInfo, LevelTable};
pub use locks::{StudentLockGuard, StudentLocks};
pub use multiplier::{Multiplier, MultiplierStep, StreakMultiplierTable};
pub use rewards::XpSettings;
pub use state::{DailyTally, LearningStats, StatsSnapshot, StudentGamificationState};
pub use stats_provider::{InMemoryStatsProvider, StatsProvider};
pub use streaks::{StreakChange, StreakInfo};
