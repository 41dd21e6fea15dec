//! XP and Level system
//!
//! Level thresholds, titles, and the lookup from cumulative XP to a level.

use serde::{Deserialize, Serialize};

use super::error::GamificationError;

/// Level definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub level: u32,
    pub xp_required: u64,
    pub title: String,
}

/// Built-in thresholds: (xp_required, title), level numbers start at 1
const DEFAULT_LEVELS: &[(u64, &str)] = &[
    (0, "Newcomer"),
    (100, "Learner"),
    (300, "Learner"),
    (600, "Explorer"),
    (1000, "Explorer"),
    (1500, "Scholar"),
    (2100, "Scholar"),
    (2800, "Scholar"),
    (3600, "Achiever"),
    (4500, "Achiever"),
    (5500, "Expert"),
    (6600, "Expert"),
    (7800, "Expert"),
    (9100, "Master"),
    (10500, "Master"),
    (12000, "Sage"),
    (14000, "Sage"),
    (16500, "Luminary"),
    (19500, "Luminary"),
    (23000, "Legend"),
];

/// Ordered level table (pure lookup, no state)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    levels: Vec<Level>,
}

impl Default for LevelTable {
    fn default() -> Self {
        let levels = DEFAULT_LEVELS
            .iter()
            .enumerate()
            .map(|(idx, (xp, title))| Level {
                level: idx as u32 + 1,
                xp_required: *xp,
                title: (*title).to_string(),
            })
            .collect();
        Self { levels }
    }
}

impl LevelTable {
    /// Build a table from explicit levels.
    ///
    /// Levels must be numbered consecutively from 1, the first threshold must be 0,
    /// and thresholds must be strictly increasing.
    pub fn new(levels: Vec<Level>) -> Result<Self, GamificationError> {
        if levels.is_empty() {
            return Err(GamificationError::Config(
                "level table must define at least one level".to_string(),
            ));
        }
        if levels[0].xp_required != 0 {
            return Err(GamificationError::Config(format!(
                "level 1 must require 0 XP, found {}",
                levels[0].xp_required
            )));
        }
        for (idx, level) in levels.iter().enumerate() {
            if level.level != idx as u32 + 1 {
                return Err(GamificationError::Config(format!(
                    "levels must be numbered consecutively from 1, found {} at position {}",
                    level.level,
                    idx + 1
                )));
            }
        }
        for pair in levels.windows(2) {
            if pair[1].xp_required <= pair[0].xp_required {
                return Err(GamificationError::Config(format!(
                    "level {} threshold ({}) must exceed level {} threshold ({})",
                    pair[1].level, pair[1].xp_required, pair[0].level, pair[0].xp_required
                )));
            }
        }
        Ok(Self { levels })
    }

    /// Build a table from bare thresholds; titles default to "Level N"
    pub fn from_thresholds(thresholds: &[u64]) -> Result<Self, GamificationError> {
        let levels = thresholds
            .iter()
            .enumerate()
            .map(|(idx, xp)| Level {
                level: idx as u32 + 1,
                xp_required: *xp,
                title: format!("Level {}", idx + 1),
            })
            .collect();
        Self::new(levels)
    }

    /// Level reached with the given cumulative XP. Clamps to the top level.
    pub fn level_for(&self, total_xp: u64) -> &Level {
        // Thresholds are sorted, so the last one not exceeding total_xp wins
        let idx = self
            .levels
            .partition_point(|l| l.xp_required <= total_xp)
            .saturating_sub(1);
        &self.levels[idx]
    }

    /// XP required for the level after `current_level` (None if max level)
    pub fn xp_for_next(&self, current_level: u32) -> Option<u64> {
        self.levels
            .get(current_level as usize)
            .map(|l| l.xp_required)
    }

    pub fn max_level(&self) -> u32 {
        self.levels.last().map(|l| l.level).unwrap_or(1)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }
}

/// Snapshot of a student's level position, for dashboards
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelInfo {
    pub total_xp: u64,
    pub level: u32,
    pub title: String,
    /// XP needed for current level
    pub current_level_xp: u64,
    /// XP needed for next level (None if max)
    pub next_level_xp: Option<u64>,
}

impl LevelInfo {
    pub fn new(table: &LevelTable, total_xp: u64) -> Self {
        let level = table.level_for(total_xp);
        Self {
            total_xp,
            level: level.level,
            title: level.title.clone(),
            current_level_xp: level.xp_required,
            next_level_xp: table.xp_for_next(level.level),
        }
    }

    /// Calculate progress to next level (0.0 - 1.0)
    pub fn progress_to_next(&self) -> f32 {
        match self.next_level_xp {
            Some(next) => {
                let xp_in_level = self.total_xp - self.current_level_xp;
                let xp_for_level = next - self.current_level_xp;
                if xp_for_level == 0 {
                    1.0
                } else {
                    (xp_in_level as f32) / (xp_for_level as f32)
                }
            }
            None => 1.0,
        }
    }

    pub fn is_max_level(&self) -> bool {
        self.next_level_xp.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_xp() {
        let table = LevelTable::from_thresholds(&[0, 100, 300, 600, 1000]).unwrap();
        assert_eq!(table.level_for(0).level, 1);
        assert_eq!(table.level_for(99).level, 1);
        assert_eq!(table.level_for(100).level, 2);
        assert_eq!(table.level_for(150).level, 2);
        assert_eq!(table.level_for(300).level, 3);
        assert_eq!(table.level_for(999).level, 4);
        assert_eq!(table.level_for(1000).level, 5);
        assert_eq!(table.level_for(250_000).level, 5); // Beyond max
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = LevelTable::default();
        assert!(LevelTable::new(table.levels().to_vec()).is_ok());
        assert_eq!(table.level_for(0).title, "Newcomer");
        assert_eq!(table.max_level(), DEFAULT_LEVELS.len() as u32);
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(LevelTable::from_thresholds(&[]).is_err());
        assert!(LevelTable::from_thresholds(&[10, 100]).is_err());
        assert!(LevelTable::from_thresholds(&[0, 100, 100]).is_err());
        assert!(LevelTable::from_thresholds(&[0, 300, 200]).is_err());

        let skipped = vec![
            Level { level: 1, xp_required: 0, title: "a".into() },
            Level { level: 3, xp_required: 10, title: "b".into() },
        ];
        assert!(LevelTable::new(skipped).is_err());
    }

    #[test]
    fn test_level_is_monotonic_in_xp() {
        let table = LevelTable::default();
        let mut previous = 0;
        for xp in (0..30_000).step_by(37) {
            let level = table.level_for(xp).level;
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_level_info_progress() {
        let table = LevelTable::from_thresholds(&[0, 100, 300]).unwrap();
        let info = LevelInfo::new(&table, 150); // Between level 2 (100) and level 3 (300)
        assert_eq!(info.level, 2);
        assert_eq!(info.next_level_xp, Some(300));
        assert!((info.progress_to_next() - 0.25).abs() < 0.01);

        let top = LevelInfo::new(&table, 500);
        assert!(top.is_max_level());
        assert!((top.progress_to_next() - 1.0).abs() < f32::EPSILON);
    }
}
