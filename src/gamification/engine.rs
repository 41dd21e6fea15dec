//! Gamification engine - processes learning events end to end
//!
//! One orchestration per event: lock the student, update the streak, award
//! XP, evaluate achievements, and commit everything in one store transaction.
//! Nothing is persisted unless every step succeeds within the deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::checker::{self, AchievementProgress, MetricCache};
use super::definitions::{AchievementCatalog, AchievementCategory, AchievementDefinition};
use super::error::GamificationError;
use super::ledger::{DailyCaps, XpAward, XpLedger};
use super::levels::{LevelInfo, LevelTable};
use super::locks::StudentLocks;
use super::multiplier::{Multiplier, StreakMultiplierTable};
use super::rewards::XpSettings;
use super::state::{LearningStats, StatsSnapshot};
use super::stats_provider::StatsProvider;
use super::streaks::{self, StreakChange, StreakInfo};
use crate::domain::{ActivityEvent, ActivityType, StudentId};
use crate::store::{GamificationStore, StateCommit, StoreError, XpAwardRecord};

/// Tables and limits the engine runs with
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub levels: LevelTable,
    pub multipliers: StreakMultiplierTable,
    pub caps: DailyCaps,
    pub xp: XpSettings,
    /// Upper bound for one orchestration, lock wait included
    pub timeout: Duration,
    /// How long to wait for another orchestration of the same student
    pub lock_wait: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            levels: LevelTable::default(),
            multipliers: StreakMultiplierTable::default(),
            caps: DailyCaps::default()
                .with_cap(ActivityType::FlashcardReview, 50)
                .with_cap(ActivityType::SessionComplete, 200),
            xp: XpSettings::default(),
            timeout: Duration::from_millis(500),
            lock_wait: Duration::from_millis(250),
        }
    }
}

/// An achievement that was unlocked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockedAchievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: AchievementCategory,
    pub xp_reward: u64,
    pub unlocked_at: DateTime<Utc>,
}

impl UnlockedAchievement {
    fn new(definition: &AchievementDefinition, unlocked_at: DateTime<Utc>) -> Self {
        Self {
            id: definition.id.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            category: definition.category,
            xp_reward: definition.xp_reward,
            unlocked_at,
        }
    }
}

/// A locked achievement with the student's progress toward it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockedAchievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: AchievementCategory,
    pub xp_reward: u64,
    pub progress: AchievementProgress,
}

/// A level up event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelUp {
    pub old_level: u32,
    pub new_level: u32,
    pub new_title: String,
}

/// Notifications derived from one orchestration, in the order they happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GamificationEvent {
    StreakExtended { days: u32 },
    StreakReset { previous: u32 },
    XpAwarded { amount: u64, reason: String },
    DailyCapReached { activity: ActivityType, requested: u64, awarded: u64 },
    AchievementUnlocked(UnlockedAchievement),
    LevelUp(LevelUp),
}

/// Result handed to notification and UI layers
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub student_id: StudentId,
    pub activity: ActivityType,
    /// Activity XP plus achievement rewards
    pub xp_awarded: u64,
    pub activity_xp: u64,
    pub achievement_xp: u64,
    /// XP the activity would have earned without the daily cap
    pub requested_xp: u64,
    pub capped: bool,
    pub streak_multiplier: f64,
    pub total_xp: u64,
    pub leveled_up: bool,
    pub old_level: u32,
    pub new_level: u32,
    pub level_title: String,
    pub streak: StreakInfo,
    pub previous_streak: u32,
    pub newly_unlocked: Vec<UnlockedAchievement>,
}

impl ProcessOutcome {
    /// Flatten into notification events
    pub fn events(&self) -> Vec<GamificationEvent> {
        let mut events = Vec::new();

        match self.streak.change {
            StreakChange::Started | StreakChange::Incremented => {
                events.push(GamificationEvent::StreakExtended {
                    days: self.streak.current,
                });
            }
            StreakChange::ResetThenStarted => {
                events.push(GamificationEvent::StreakReset {
                    previous: self.previous_streak,
                });
            }
            StreakChange::UnchangedSameDay => {}
        }

        if self.activity_xp > 0 {
            events.push(GamificationEvent::XpAwarded {
                amount: self.activity_xp,
                reason: format!("{} ({:.2}x streak)", self.activity, self.streak_multiplier),
            });
        }
        if self.capped {
            events.push(GamificationEvent::DailyCapReached {
                activity: self.activity,
                requested: self.requested_xp,
                awarded: self.activity_xp,
            });
        }

        for unlocked in &self.newly_unlocked {
            events.push(GamificationEvent::AchievementUnlocked(unlocked.clone()));
            if unlocked.xp_reward > 0 {
                events.push(GamificationEvent::XpAwarded {
                    amount: unlocked.xp_reward,
                    reason: format!("Achievement: {}", unlocked.name),
                });
            }
        }

        if self.leveled_up {
            events.push(GamificationEvent::LevelUp(LevelUp {
                old_level: self.old_level,
                new_level: self.new_level,
                new_title: self.level_title.clone(),
            }));
        }

        events
    }
}

/// Dashboard view of one student
#[derive(Debug, Clone, Serialize)]
pub struct StudentStats {
    pub student_id: StudentId,
    pub level: LevelInfo,
    /// Streak as of the query date (0 once a day was missed)
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<NaiveDate>,
    pub streak_multiplier: f64,
    pub xp_today: u64,
    pub achievements_unlocked: usize,
    pub achievements_total: usize,
    pub learning: LearningStats,
}

/// Main entry point of the engine
pub struct GamificationEngine<S, P> {
    settings: EngineSettings,
    catalog: Arc<AchievementCatalog>,
    store: S,
    stats: P,
    locks: StudentLocks,
}

impl<S: GamificationStore, P: StatsProvider> GamificationEngine<S, P> {
    pub fn new(settings: EngineSettings, catalog: Arc<AchievementCatalog>, store: S, stats: P) -> Self {
        Self {
            settings,
            catalog,
            store,
            stats,
            locks: StudentLocks::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats_provider(&self) -> &P {
        &self.stats
    }

    /// Base XP for an event before the streak multiplier
    fn base_xp(&self, event: &ActivityEvent) -> Result<i64, GamificationError> {
        let base = event
            .base_xp_override
            .unwrap_or_else(|| self.settings.xp.base_for(&event.payload));
        if base < 0 {
            return Err(GamificationError::InvalidAmount(base));
        }
        Ok(base)
    }

    fn check_deadline(&self, started: Instant, student: &StudentId) -> Result<(), GamificationError> {
        if started.elapsed() > self.settings.timeout {
            tracing::warn!(
                student = %student,
                timeout_ms = self.settings.timeout.as_millis() as u64,
                "Orchestration deadline exceeded, nothing committed"
            );
            return Err(GamificationError::Timeout {
                student: student.to_string(),
                timeout_ms: self.settings.timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    /// Process one learning event: streak, XP, achievements, commit.
    ///
    /// Either everything is persisted or nothing is. Infrastructure failures
    /// are retryable (see [`GamificationError::is_retryable`]).
    pub fn process_event(&self, event: &ActivityEvent) -> Result<ProcessOutcome, GamificationError> {
        let started = Instant::now();
        let student = &event.student_id;

        event.validate().map_err(GamificationError::InvalidEvent)?;
        let base_xp = self.base_xp(event)?;

        let wait = self.settings.lock_wait.min(self.settings.timeout);
        let _guard = self.locks.acquire(student, wait).ok_or_else(|| {
            tracing::debug!(student = %student, "Student lock busy");
            GamificationError::ConcurrencyConflict(student.to_string())
        })?;

        let mut state = self.store.load_state(student, event.occurred_on)?;
        let old_level = state.level;
        let previous_streak = state.streak_current;

        // 1. Streak
        let change = if event.activity_type.qualifies_for_streak() {
            streaks::update_streak(&mut state, event.occurred_on)
        } else {
            StreakChange::UnchangedSameDay
        };
        let multiplier = self.settings.multipliers.multiplier_for(state.streak_current);

        // 2. Activity XP
        let ledger = XpLedger::new(&self.settings.levels, &self.settings.caps);
        let activity_award = ledger.award_xp(
            &mut state,
            event.activity_type,
            base_xp,
            multiplier,
            event.occurred_on,
        )?;

        // 3. Achievements, repeated while rewards unlock more
        let learning = self.stats.learning_stats(student)?;
        let mut snapshot = StatsSnapshot::new(&state, &learning);
        let mut cache = MetricCache::new();
        let mut newly_unlocked = Vec::new();
        let mut reward_awards = Vec::new();
        loop {
            let evaluation = checker::evaluate(&self.catalog, &state, &snapshot, &mut cache);
            if evaluation.newly_unlocked.is_empty() {
                break;
            }
            for definition in evaluation.newly_unlocked {
                let unlocked_at = Utc::now();
                state
                    .unlocked_achievements
                    .insert(definition.id.clone(), unlocked_at);
                let reward = ledger.award_xp(
                    &mut state,
                    ActivityType::AchievementReward,
                    i64::try_from(definition.xp_reward).unwrap_or(i64::MAX),
                    Multiplier::ONE,
                    event.occurred_on,
                )?;
                tracing::info!(
                    student = %student,
                    achievement = %definition.id,
                    xp = reward.awarded,
                    "Achievement unlocked"
                );
                reward_awards.push(reward);
                newly_unlocked.push(UnlockedAchievement::new(definition, unlocked_at));
            }
            snapshot.refresh_from(&state);
            cache.clear();
        }

        // 4. Commit
        self.check_deadline(started, student)?;
        let recorded_at = Utc::now();
        let awards: Vec<XpAwardRecord> = std::iter::once(&activity_award)
            .chain(reward_awards.iter())
            .filter(|award| award.awarded > 0)
            .map(|award| award_record(student, award, recorded_at))
            .collect();
        let commit = StateCommit {
            state,
            awards,
            unlocked: newly_unlocked
                .iter()
                .map(|u| (u.id.clone(), u.unlocked_at))
                .collect(),
        };
        if let Err(err) = self.store.commit(&commit) {
            tracing::error!(
                student = %student,
                error = %err,
                "Gamification commit failed, orchestration rolled back"
            );
            return Err(err.into());
        }
        let state = commit.state;

        // 5. Result
        let achievement_xp: u64 = reward_awards.iter().map(|a| a.awarded).sum();
        let new_level = state.level;
        let level_title = self.settings.levels.level_for(state.total_xp).title.clone();
        if new_level > old_level {
            tracing::info!(
                student = %student,
                old_level,
                new_level,
                title = %level_title,
                "Level up"
            );
        }

        Ok(ProcessOutcome {
            student_id: student.clone(),
            activity: event.activity_type,
            xp_awarded: activity_award.awarded + achievement_xp,
            activity_xp: activity_award.awarded,
            achievement_xp,
            requested_xp: activity_award.requested,
            capped: activity_award.was_capped(),
            streak_multiplier: multiplier.as_f64(),
            total_xp: state.total_xp,
            leveled_up: new_level > old_level,
            old_level,
            new_level,
            level_title,
            streak: StreakInfo {
                current: state.streak_current,
                longest: state.streak_longest,
                change,
                last_active_date: state.last_active_date,
            },
            previous_streak,
            newly_unlocked,
        })
    }

    /// Process an event without letting a gamification failure escape.
    ///
    /// For callers whose primary write (e.g. saving the session) must succeed
    /// regardless of the gamification side effect.
    pub fn process_event_or_log(&self, event: &ActivityEvent) -> Option<ProcessOutcome> {
        match self.process_event(event) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                tracing::warn!(
                    student = %event.student_id,
                    activity = %event.activity_type,
                    retryable = err.is_retryable(),
                    error = %err,
                    "Gamification skipped for event"
                );
                None
            }
        }
    }

    /// Stats for a dashboard, with the streak as seen on `today`
    pub fn get_stats_on(
        &self,
        student: &StudentId,
        today: NaiveDate,
    ) -> Result<StudentStats, GamificationError> {
        let state = self.store.load_state(student, today)?;
        let learning = self.stats.learning_stats(student)?;
        let current_streak = streaks::effective_streak(&state, today);

        Ok(StudentStats {
            student_id: student.clone(),
            level: LevelInfo::new(&self.settings.levels, state.total_xp),
            current_streak,
            longest_streak: state.streak_longest,
            last_active_date: state.last_active_date,
            streak_multiplier: self.settings.multipliers.multiplier_for(current_streak).as_f64(),
            xp_today: state.daily_xp.values().map(|t| t.awarded).sum(),
            achievements_unlocked: state.unlocked_achievements.len(),
            achievements_total: self.catalog.len(),
            learning,
        })
    }

    /// Stats for a dashboard as of today (UTC)
    pub fn get_stats(&self, student: &StudentId) -> Result<StudentStats, GamificationError> {
        self.get_stats_on(student, Utc::now().date_naive())
    }

    /// Unlocked achievements, oldest first
    pub fn get_unlocked_achievements(
        &self,
        student: &StudentId,
    ) -> Result<Vec<UnlockedAchievement>, GamificationError> {
        let state = self.store.load_state(student, Utc::now().date_naive())?;
        let mut unlocked: Vec<UnlockedAchievement> = state
            .unlocked_achievements
            .iter()
            .filter_map(|(id, at)| match self.catalog.get(id) {
                Some(definition) => Some(UnlockedAchievement::new(definition, *at)),
                None => {
                    tracing::debug!(student = %student, achievement = %id, "Unlocked id not in catalog");
                    None
                }
            })
            .collect();
        unlocked.sort_by(|a, b| a.unlocked_at.cmp(&b.unlocked_at).then_with(|| a.id.cmp(&b.id)));
        Ok(unlocked)
    }

    /// Locked achievements in catalog order with progress toward each
    pub fn get_locked_achievements_with_progress(
        &self,
        student: &StudentId,
    ) -> Result<Vec<LockedAchievement>, GamificationError> {
        let state = self.store.load_state(student, Utc::now().date_naive())?;
        let learning = self.stats.learning_stats(student)?;
        let snapshot = StatsSnapshot::new(&state, &learning);
        let mut cache = MetricCache::new();

        Ok(self
            .catalog
            .iter()
            .filter(|definition| !state.is_unlocked(&definition.id))
            .map(|definition| LockedAchievement {
                id: definition.id.clone(),
                name: definition.name.clone(),
                description: definition.description.clone(),
                category: definition.category,
                xp_reward: definition.xp_reward,
                progress: checker::progress_for(definition, &snapshot, &mut cache),
            })
            .collect())
    }

    /// Most recent XP awards first
    pub fn xp_history(
        &self,
        student: &StudentId,
        limit: usize,
    ) -> Result<Vec<XpAwardRecord>, GamificationError> {
        Ok(self.store.xp_history(student, limit)?)
    }
}

impl<S, P> GamificationEngine<S, P>
where
    S: GamificationStore + 'static,
    P: StatsProvider + 'static,
{
    /// Run [`Self::process_event`] on tokio's blocking pool
    pub async fn process_event_async(
        self: Arc<Self>,
        event: ActivityEvent,
    ) -> Result<ProcessOutcome, GamificationError> {
        tokio::task::spawn_blocking(move || self.process_event(&event))
            .await
            .map_err(|e| GamificationError::PersistenceFailure(StoreError::Unavailable(e.to_string())))?
    }
}

fn award_record(student: &StudentId, award: &XpAward, recorded_at: DateTime<Utc>) -> XpAwardRecord {
    XpAwardRecord {
        id: uuid::Uuid::new_v4().to_string(),
        student_id: student.clone(),
        activity_type: award.activity,
        amount: award.awarded,
        day: award.occurred_on,
        resulting_total: award.resulting_total,
        recorded_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamification::definitions::{AchievementConfig, RequirementConfig};
    use crate::gamification::stats_provider::InMemoryStatsProvider;
    use crate::store::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn achievement(id: &str, xp_reward: u64, reqs: &[(&str, u64)]) -> AchievementConfig {
        AchievementConfig {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: AchievementCategory::Milestone,
            xp_reward,
            requirements: reqs
                .iter()
                .map(|(kind, target)| RequirementConfig {
                    kind: kind.to_string(),
                    target: *target,
                    subject: None,
                })
                .collect(),
        }
    }

    fn engine(
        configs: &[AchievementConfig],
    ) -> GamificationEngine<MemoryStore, InMemoryStatsProvider> {
        let settings = EngineSettings {
            levels: LevelTable::from_thresholds(&[0, 100, 300, 600, 1000]).unwrap(),
            ..Default::default()
        };
        let catalog = AchievementCatalog::from_configs(configs, true).unwrap();
        GamificationEngine::new(
            settings,
            Arc::new(catalog),
            MemoryStore::new(),
            InMemoryStatsProvider::new(),
        )
    }

    #[test]
    fn test_first_session_starts_streak_and_awards_xp() {
        let engine = engine(&[]);
        let outcome = engine
            .process_event(&ActivityEvent::session("s1", day(10), 3, 5))
            .unwrap();

        assert_eq!(outcome.activity_xp, 20);
        assert_eq!(outcome.streak.current, 1);
        assert_eq!(outcome.streak.change, StreakChange::Started);
        assert!(!outcome.leveled_up);
        assert_eq!(
            outcome.events(),
            vec![
                GamificationEvent::StreakExtended { days: 1 },
                GamificationEvent::XpAwarded {
                    amount: 20,
                    reason: "session_complete (1.00x streak)".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_reward_cascade_unlocks_each_achievement_once() {
        let engine = engine(&[
            achievement("first", 100, &[("session_count", 1)]),
            achievement("level_2", 10, &[("level_reached", 2)]),
        ]);
        let student = StudentId::new("s1");
        let event = ActivityEvent::session("s1", day(10), 1, 2);
        engine.stats_provider().record_event(&event);

        let outcome = engine.process_event(&event).unwrap();
        let ids: Vec<&str> = outcome.newly_unlocked.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "level_2"]);
        assert_eq!(outcome.achievement_xp, 110);
        assert_eq!(outcome.total_xp, 130);
        assert!(outcome.leveled_up);
        assert_eq!(outcome.new_level, 2);

        let again = ActivityEvent::session("s1", day(10), 1, 2);
        engine.stats_provider().record_event(&again);
        let second = engine.process_event(&again).unwrap();
        assert!(second.newly_unlocked.is_empty());
        assert_eq!(second.achievement_xp, 0);

        let rewards = engine
            .store()
            .awards(&student)
            .into_iter()
            .filter(|a| a.activity_type == ActivityType::AchievementReward)
            .count();
        assert_eq!(rewards, 2);
    }

    #[test]
    fn test_failed_commit_leaves_no_trace() {
        let engine = engine(&[achievement("first", 100, &[("session_count", 1)])]);
        let student = StudentId::new("s1");
        let event = ActivityEvent::session("s1", day(10), 1, 2);
        engine.stats_provider().record_event(&event);
        engine.store().fail_next_commits(1);

        let err = engine.process_event(&event).unwrap_err();
        assert!(matches!(err, GamificationError::PersistenceFailure(_)));
        assert!(err.is_retryable());

        let stats = engine.get_stats_on(&student, day(10)).unwrap();
        assert_eq!(stats.level.total_xp, 0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.achievements_unlocked, 0);
        assert!(engine.xp_history(&student, 10).unwrap().is_empty());

        // Retry succeeds and awards everything exactly once
        let outcome = engine.process_event(&event).unwrap();
        assert_eq!(outcome.newly_unlocked.len(), 1);
        assert_eq!(outcome.total_xp, 120);
    }

    #[test]
    fn test_negative_override_is_rejected_before_mutation() {
        let engine = engine(&[]);
        let event = ActivityEvent::goal("s1", day(10), "g1").with_base_xp(-5);
        let err = engine.process_event(&event).unwrap_err();
        assert!(matches!(err, GamificationError::InvalidAmount(-5)));
        assert!(!err.is_retryable());
        assert_eq!(engine.store().commit_count(), 0);
    }

    #[test]
    fn test_invalid_payload_is_rejected() {
        let engine = engine(&[]);
        let err = engine
            .process_event(&ActivityEvent::session("s1", day(10), 6, 5))
            .unwrap_err();
        assert!(matches!(err, GamificationError::InvalidEvent(_)));
    }

    #[test]
    fn test_zero_timeout_times_out_without_commit() {
        let mut engine = engine(&[]);
        engine.settings.timeout = Duration::ZERO;
        engine.settings.lock_wait = Duration::ZERO;

        // Any measurable work exceeds a zero deadline
        let err = engine
            .process_event(&ActivityEvent::goal("s1", day(10), "g1"))
            .unwrap_err();
        assert!(matches!(err, GamificationError::Timeout { .. }));
        assert!(err.is_retryable());
        assert_eq!(engine.store().commit_count(), 0);
    }

    #[test]
    fn test_streak_multiplier_applies_after_streak_update() {
        let engine = engine(&[]);
        for d in 10..=16 {
            engine
                .process_event(&ActivityEvent::goal("s1", day(d), format!("g{}", d)))
                .unwrap();
        }
        // Seventh consecutive day: 50 * 1.10
        let history = engine.xp_history(&StudentId::new("s1"), 1).unwrap();
        assert_eq!(history[0].amount, 55);
    }

    #[test]
    fn test_locked_progress_and_unlocked_listing() {
        let engine = engine(&[
            achievement("first", 0, &[("session_count", 1)]),
            achievement("ten", 0, &[("session_count", 10)]),
        ]);
        let student = StudentId::new("s1");
        let event = ActivityEvent::session("s1", day(10), 1, 1);
        engine.stats_provider().record_event(&event);
        engine.process_event(&event).unwrap();

        let unlocked = engine.get_unlocked_achievements(&student).unwrap();
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, "first");

        let locked = engine.get_locked_achievements_with_progress(&student).unwrap();
        assert_eq!(locked.len(), 1);
        assert_eq!(locked[0].id, "ten");
        assert_eq!(locked[0].progress.percent, 10);
        assert_eq!(locked[0].progress.text, "1/10");
    }
}
