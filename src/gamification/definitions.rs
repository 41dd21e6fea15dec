//! Achievement definitions and the catalog they are loaded into
//!
//! The catalog is loaded once, validated, and shared read-only across all
//! students. Requirement types are resolved to [`Metric`]s at load time so
//! evaluation can match them exhaustively against the stats snapshot.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::error::GamificationError;

/// Achievement category for grouping in UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Milestone,
    Streak,
    Level,
    Mastery,
    Precision,
    Flashcards,
    Subject,
}

impl AchievementCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Milestone => "Milestones",
            Self::Streak => "Streaks",
            Self::Level => "Levels",
            Self::Mastery => "Mastery",
            Self::Precision => "Precision",
            Self::Flashcards => "Flashcards",
            Self::Subject => "Subjects",
        }
    }
}

/// Statistic a requirement is measured against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Metric {
    SessionCount,
    StreakLength,
    LevelReached,
    TotalXp,
    OutcomesMastered,
    PerfectSessionCount,
    FlashcardReviewCount,
    SubjectSessionCount(String),
    /// Requirement type the snapshot cannot supply; never satisfied
    Unknown(String),
}

impl Metric {
    /// Requirement type name as written in the catalog
    pub fn type_name(&self) -> &str {
        match self {
            Self::SessionCount => "session_count",
            Self::StreakLength => "streak_length",
            Self::LevelReached => "level_reached",
            Self::TotalXp => "total_xp",
            Self::OutcomesMastered => "outcomes_mastered",
            Self::PerfectSessionCount => "perfect_session_count",
            Self::FlashcardReviewCount => "flashcard_review_count",
            Self::SubjectSessionCount(_) => "subject_session_count",
            Self::Unknown(name) => name,
        }
    }

    fn parse(type_name: &str, subject: Option<&str>) -> Option<Result<Self, String>> {
        let metric = match type_name.trim().replace('-', "_").as_str() {
            "session_count" => Self::SessionCount,
            "streak_length" => Self::StreakLength,
            "level_reached" => Self::LevelReached,
            "total_xp" => Self::TotalXp,
            "outcomes_mastered" => Self::OutcomesMastered,
            "perfect_session_count" => Self::PerfectSessionCount,
            "flashcard_review_count" => Self::FlashcardReviewCount,
            "subject_session_count" | "subject_specific_session_count" => match subject {
                Some(subject) if !subject.trim().is_empty() => {
                    Self::SubjectSessionCount(subject.trim().to_string())
                }
                _ => {
                    return Some(Err(
                        "subject_session_count requires a 'subject'".to_string()
                    ));
                }
            },
            _ => return None,
        };
        Some(Ok(metric))
    }
}

/// Requirement as written in config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Achievement as written in config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: AchievementCategory,
    #[serde(default)]
    pub xp_reward: u64,
    pub requirements: Vec<RequirementConfig>,
}

/// One resolved requirement: `metric >= target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub metric: Metric,
    pub target: u64,
}

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: AchievementCategory,
    pub xp_reward: u64,
    pub requirements: Vec<Requirement>,
}

impl AchievementDefinition {
    /// Resolve a config entry.
    ///
    /// With `strict`, an unknown requirement type is an error. Otherwise it is
    /// kept as [`Metric::Unknown`], which fails closed during evaluation.
    pub fn from_config(config: &AchievementConfig, strict: bool) -> Result<Self, GamificationError> {
        if config.id.trim().is_empty() {
            return Err(GamificationError::Config(
                "achievement id must not be empty".to_string(),
            ));
        }
        if config.requirements.is_empty() {
            return Err(GamificationError::Config(format!(
                "achievement '{}' has no requirements",
                config.id
            )));
        }

        let mut requirements = Vec::with_capacity(config.requirements.len());
        for req in &config.requirements {
            let metric = match Metric::parse(&req.kind, req.subject.as_deref()) {
                Some(Ok(metric)) => metric,
                Some(Err(msg)) => {
                    return Err(GamificationError::Config(format!(
                        "achievement '{}': {}",
                        config.id, msg
                    )));
                }
                None if strict => {
                    return Err(GamificationError::UnknownRequirementType {
                        achievement: config.id.clone(),
                        requirement: req.kind.clone(),
                    });
                }
                None => {
                    tracing::warn!(
                        achievement = %config.id,
                        requirement = %req.kind,
                        "Unknown requirement type, achievement can never unlock"
                    );
                    Metric::Unknown(req.kind.clone())
                }
            };
            requirements.push(Requirement {
                metric,
                target: req.target,
            });
        }

        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            description: config.description.clone(),
            category: config.category,
            xp_reward: config.xp_reward,
            requirements,
        })
    }

    /// Whether any requirement could not be resolved
    pub fn has_unknown_requirements(&self) -> bool {
        self.requirements
            .iter()
            .any(|r| matches!(r.metric, Metric::Unknown(_)))
    }
}

/// All achievement definitions known to the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchievementCatalog {
    definitions: Vec<AchievementDefinition>,
}

static BUILTIN_CATALOG: Lazy<AchievementCatalog> = Lazy::new(|| {
    let configs = builtin_achievement_configs();
    let definitions = configs
        .iter()
        .filter_map(|c| AchievementDefinition::from_config(c, true).ok())
        .collect();
    AchievementCatalog { definitions }
});

impl AchievementCatalog {
    pub fn from_configs(
        configs: &[AchievementConfig],
        strict: bool,
    ) -> Result<Self, GamificationError> {
        let mut seen = HashSet::new();
        let mut definitions = Vec::with_capacity(configs.len());
        for config in configs {
            if !seen.insert(config.id.as_str()) {
                return Err(GamificationError::Config(format!(
                    "duplicate achievement id '{}'",
                    config.id
                )));
            }
            definitions.push(AchievementDefinition::from_config(config, strict)?);
        }
        Ok(Self { definitions })
    }

    /// Catalog shipped with the engine
    pub fn builtin() -> Self {
        BUILTIN_CATALOG.clone()
    }

    pub fn get(&self, id: &str) -> Option<&AchievementDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AchievementDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Get total possible XP from all achievements
    pub fn total_xp(&self) -> u64 {
        self.definitions.iter().map(|d| d.xp_reward).sum()
    }
}

fn req(kind: &str, target: u64) -> RequirementConfig {
    RequirementConfig {
        kind: kind.to_string(),
        target,
        subject: None,
    }
}

fn achievement(
    id: &str,
    name: &str,
    description: &str,
    category: AchievementCategory,
    xp_reward: u64,
    requirements: Vec<RequirementConfig>,
) -> AchievementConfig {
    AchievementConfig {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        xp_reward,
        requirements,
    }
}

/// Built-in achievements, in config form (written out by `studyquest init`)
pub fn builtin_achievement_configs() -> Vec<AchievementConfig> {
    use AchievementCategory::*;

    vec![
        // === MILESTONE ===
        achievement("first_session", "First Steps", "Complete your first study session", Milestone, 10, vec![req("session_count", 1)]),
        achievement("ten_sessions", "Getting Started", "Complete 10 study sessions", Milestone, 25, vec![req("session_count", 10)]),
        achievement("fifty_sessions", "Dedicated", "Complete 50 study sessions", Milestone, 75, vec![req("session_count", 50)]),
        achievement("century", "Century", "Complete 100 study sessions", Milestone, 150, vec![req("session_count", 100)]),
        // === STREAK ===
        achievement("streak_3", "On Fire", "Study 3 days in a row", Streak, 30, vec![req("streak_length", 3)]),
        achievement("streak_7", "Week Warrior", "Study 7 days in a row", Streak, 75, vec![req("streak_length", 7)]),
        achievement("streak_30", "Monthly Master", "Study 30 days in a row", Streak, 300, vec![req("streak_length", 30)]),
        // === LEVEL ===
        achievement("level_5", "Rising Star", "Reach level 5", Level, 50, vec![req("level_reached", 5)]),
        achievement("level_10", "Seasoned", "Reach level 10", Level, 150, vec![req("level_reached", 10)]),
        achievement("xp_10k", "Ten Thousand", "Earn 10,000 XP", Level, 200, vec![req("total_xp", 10_000)]),
        // === MASTERY ===
        achievement("first_mastery", "Breakthrough", "Master your first learning outcome", Mastery, 25, vec![req("outcomes_mastered", 1)]),
        achievement("mastery_25", "Polymath", "Master 25 learning outcomes", Mastery, 150, vec![req("outcomes_mastered", 25)]),
        // === PRECISION ===
        achievement("flawless", "Flawless", "Finish a session with every answer correct", Precision, 20, vec![req("perfect_session_count", 1)]),
        achievement("perfectionist", "Perfectionist", "Finish 10 perfect sessions", Precision, 100, vec![req("perfect_session_count", 10)]),
        // === FLASHCARDS ===
        achievement("card_shark", "Card Shark", "Review 100 flashcards", Flashcards, 40, vec![req("flashcard_review_count", 100)]),
        achievement("memory_palace", "Memory Palace", "Review 1,000 flashcards", Flashcards, 200, vec![req("flashcard_review_count", 1000)]),
        // === COMBINED ===
        achievement("consistent_scholar", "Consistent Scholar", "Complete 25 sessions while holding a 7-day streak", Milestone, 120, vec![req("session_count", 25), req("streak_length", 7)]),
    ]
}
