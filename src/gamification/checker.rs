//! Achievement checking logic
//!
//! Evaluates the catalog against a stats snapshot: unlocks definitions whose
//! requirements are all met and reports progress for the rest. Progress is the
//! ratio of the hardest (minimum-ratio) requirement.

use std::collections::HashMap;

use serde::Serialize;

use super::definitions::{AchievementCatalog, AchievementDefinition, Metric, Requirement};
use super::state::{StatsSnapshot, StudentGamificationState};

/// Resolved metric values for one evaluation request.
///
/// Created per orchestration and dropped with it, so nothing leaks between
/// students.
#[derive(Debug, Default)]
pub struct MetricCache {
    values: HashMap<Metric, Option<u64>>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `metric` in `snapshot`; None for metrics the snapshot cannot supply
    pub fn resolve(&mut self, metric: &Metric, snapshot: &StatsSnapshot) -> Option<u64> {
        if let Some(value) = self.values.get(metric) {
            return *value;
        }
        let value = match metric {
            Metric::SessionCount => Some(snapshot.sessions_completed),
            Metric::StreakLength => Some(snapshot.current_streak as u64),
            Metric::LevelReached => Some(snapshot.level as u64),
            Metric::TotalXp => Some(snapshot.total_xp),
            Metric::OutcomesMastered => Some(snapshot.outcomes_mastered),
            Metric::PerfectSessionCount => Some(snapshot.perfect_sessions),
            Metric::FlashcardReviewCount => Some(snapshot.flashcard_reviews),
            Metric::SubjectSessionCount(subject) => Some(snapshot.subject_sessions(subject)),
            Metric::Unknown(_) => None,
        };
        self.values.insert(metric.clone(), value);
        value
    }

    /// Drop cached values after the snapshot changed
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Progress toward a locked achievement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementProgress {
    /// 0-100, from the binding (minimum-ratio) requirement
    pub percent: u8,
    /// "current/target" of the binding requirement
    pub text: String,
}

/// Outcome of one evaluation pass
#[derive(Debug, Default)]
pub struct Evaluation<'a> {
    pub newly_unlocked: Vec<&'a AchievementDefinition>,
    pub progress: HashMap<String, AchievementProgress>,
}

fn requirement_met(req: &Requirement, cache: &mut MetricCache, snapshot: &StatsSnapshot) -> bool {
    match cache.resolve(&req.metric, snapshot) {
        Some(current) => current >= req.target,
        None => false,
    }
}

/// Ratio of one requirement as (met, target) with met clamped to target, plus display text
fn requirement_ratio(
    req: &Requirement,
    cache: &mut MetricCache,
    snapshot: &StatsSnapshot,
) -> ((u64, u64), String) {
    match cache.resolve(&req.metric, snapshot) {
        // A zero target is trivially met
        Some(_) if req.target == 0 => ((1, 1), "0/0".to_string()),
        Some(value) => {
            let met = value.min(req.target);
            ((met, req.target), format!("{}/{}", met, req.target))
        }
        None => ((0, req.target.max(1)), format!("?/{}", req.target)),
    }
}

/// Whether every requirement of `definition` is met (logical AND)
pub fn is_satisfied(
    definition: &AchievementDefinition,
    snapshot: &StatsSnapshot,
    cache: &mut MetricCache,
) -> bool {
    definition
        .requirements
        .iter()
        .all(|req| requirement_met(req, cache, snapshot))
}

/// Progress of a locked achievement, driven by its hardest requirement
pub fn progress_for(
    definition: &AchievementDefinition,
    snapshot: &StatsSnapshot,
    cache: &mut MetricCache,
) -> AchievementProgress {
    let mut binding: Option<((u64, u64), String)> = None;
    for req in &definition.requirements {
        let (ratio, text) = requirement_ratio(req, cache, snapshot);
        let is_lower = binding.as_ref().is_none_or(|((num, den), _)| {
            (ratio.0 as u128) * (*den as u128) < (*num as u128) * (ratio.1 as u128)
        });
        if is_lower {
            binding = Some((ratio, text));
        }
    }

    let ((met, target), text) = binding.unwrap_or(((0, 1), "0/0".to_string()));
    let mut percent = ((met as u128 * 100) / target.max(1) as u128).min(100) as u8;
    if percent == 100 && !is_satisfied(definition, snapshot, cache) {
        percent = 99;
    }
    AchievementProgress { percent, text }
}

/// Evaluate every definition not yet unlocked in `state`.
///
/// Does not mutate `state`; the caller records unlocks and awards rewards.
pub fn evaluate<'a>(
    catalog: &'a AchievementCatalog,
    state: &StudentGamificationState,
    snapshot: &StatsSnapshot,
    cache: &mut MetricCache,
) -> Evaluation<'a> {
    let mut evaluation = Evaluation::default();

    for definition in catalog.iter() {
        if state.is_unlocked(&definition.id) {
            continue;
        }
        if is_satisfied(definition, snapshot, cache) {
            evaluation.newly_unlocked.push(definition);
        } else {
            evaluation
                .progress
                .insert(definition.id.clone(), progress_for(definition, snapshot, cache));
        }
    }

    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamification::definitions::{AchievementCategory, AchievementConfig, RequirementConfig};

    fn definition(id: &str, reqs: &[(&str, u64)]) -> AchievementDefinition {
        let config = AchievementConfig {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: AchievementCategory::Milestone,
            xp_reward: 10,
            requirements: reqs
                .iter()
                .map(|(kind, target)| RequirementConfig {
                    kind: kind.to_string(),
                    target: *target,
                    subject: None,
                })
                .collect(),
        };
        AchievementDefinition::from_config(&config, false).unwrap()
    }

    fn catalog(defs: Vec<AchievementDefinition>) -> AchievementCatalog {
        let configs: Vec<AchievementConfig> = defs
            .iter()
            .map(|d| AchievementConfig {
                id: d.id.clone(),
                name: d.name.clone(),
                description: String::new(),
                category: d.category,
                xp_reward: d.xp_reward,
                requirements: d
                    .requirements
                    .iter()
                    .map(|r| RequirementConfig {
                        kind: r.metric.type_name().to_string(),
                        target: r.target,
                        subject: None,
                    })
                    .collect(),
            })
            .collect();
        AchievementCatalog::from_configs(&configs, false).unwrap()
    }

    fn snapshot(sessions: u64, streak: u32) -> StatsSnapshot {
        StatsSnapshot {
            sessions_completed: sessions,
            current_streak: streak,
            level: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_all_requirements_must_be_met() {
        let def = definition("combo", &[("session_count", 10), ("streak_length", 7)]);
        let mut cache = MetricCache::new();
        assert!(!is_satisfied(&def, &snapshot(10, 3), &mut cache));
        let mut cache = MetricCache::new();
        assert!(is_satisfied(&def, &snapshot(12, 7), &mut cache));
    }

    #[test]
    fn test_progress_uses_minimum_ratio() {
        let def = definition("combo", &[("session_count", 10), ("streak_length", 10)]);
        let mut cache = MetricCache::new();
        // sessions 90%, streak 20% -> 20%
        let progress = progress_for(&def, &snapshot(9, 2), &mut cache);
        assert_eq!(progress.percent, 20);
        assert_eq!(progress.text, "2/10");
    }

    #[test]
    fn test_progress_zero_current_is_zero_percent() {
        let def = definition("first", &[("session_count", 5)]);
        let mut cache = MetricCache::new();
        let progress = progress_for(&def, &snapshot(0, 0), &mut cache);
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.text, "0/5");
    }

    #[test]
    fn test_progress_is_clamped() {
        let def = definition("combo", &[("session_count", 3), ("streak_length", 1000)]);
        let mut cache = MetricCache::new();
        let progress = progress_for(&def, &snapshot(500, 999), &mut cache);
        assert!(progress.percent <= 100);
        assert_eq!(progress.percent, 99);
    }

    #[test]
    fn test_unknown_requirement_never_unlocks() {
        let def = definition("odd", &[("karma_points", 0)]);
        let mut cache = MetricCache::new();
        assert!(!is_satisfied(&def, &snapshot(100, 100), &mut cache));
        let progress = progress_for(&def, &snapshot(100, 100), &mut cache);
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.text, "?/0");
    }

    #[test]
    fn test_evaluate_skips_unlocked_and_reports_progress() {
        let catalog = catalog(vec![
            definition("first", &[("session_count", 1)]),
            definition("ten", &[("session_count", 10)]),
            definition("streak", &[("streak_length", 3)]),
        ]);
        let mut state = StudentGamificationState::new("s1");
        state
            .unlocked_achievements
            .insert("first".to_string(), chrono::Utc::now());

        let mut cache = MetricCache::new();
        let result = evaluate(&catalog, &state, &snapshot(4, 3), &mut cache);

        let ids: Vec<&str> = result.newly_unlocked.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["streak"]);
        assert_eq!(result.progress.len(), 1);
        assert_eq!(result.progress["ten"].percent, 40);
        assert!(!result.progress.contains_key("first"));
    }

    #[test]
    fn test_subject_sessions_resolve_per_subject() {
        let mut snap = snapshot(0, 0);
        snap.sessions_by_subject.insert("math".to_string(), 4);
        let mut cache = MetricCache::new();
        assert_eq!(
            cache.resolve(&Metric::SubjectSessionCount("math".into()), &snap),
            Some(4)
        );
        assert_eq!(
            cache.resolve(&Metric::SubjectSessionCount("art".into()), &snap),
            Some(0)
        );
    }

    #[test]
    fn test_cache_must_be_cleared_after_snapshot_change() {
        let mut cache = MetricCache::new();
        let mut snap = snapshot(1, 0);
        assert_eq!(cache.resolve(&Metric::SessionCount, &snap), Some(1));
        snap.sessions_completed = 5;
        assert_eq!(cache.resolve(&Metric::SessionCount, &snap), Some(1));
        cache.clear();
        assert_eq!(cache.resolve(&Metric::SessionCount, &snap), Some(5));
    }
}
