//! XP ledger: streak multiplier, per-activity daily caps, and level-ups

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::error::GamificationError;
use super::levels::LevelTable;
use super::multiplier::Multiplier;
use super::state::{DailyTally, StudentGamificationState};
use crate::domain::ActivityType;

/// Largest total a student can reach; totals are stored as signed 64-bit integers
pub const MAX_TOTAL_XP: u64 = i64::MAX as u64;

/// Per-activity daily XP caps. Activities without an entry are unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyCaps {
    caps: HashMap<ActivityType, u64>,
}

impl DailyCaps {
    pub fn new(caps: HashMap<ActivityType, u64>) -> Self {
        Self { caps }
    }

    pub fn with_cap(mut self, activity: ActivityType, cap: u64) -> Self {
        self.caps.insert(activity, cap);
        self
    }

    /// Cap for an activity; achievement rewards are always exempt
    pub fn cap_for(&self, activity: ActivityType) -> Option<u64> {
        if activity == ActivityType::AchievementReward {
            return None;
        }
        self.caps.get(&activity).copied()
    }
}

/// Result of a single XP award
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XpAward {
    pub activity: ActivityType,
    pub occurred_on: NaiveDate,
    /// XP after the multiplier, before the cap
    pub requested: u64,
    /// XP actually added to the total (may be 0 when the cap is exhausted)
    pub awarded: u64,
    pub multiplier_bp: u32,
    pub old_level: u32,
    pub new_level: u32,
    pub leveled_up: bool,
    pub resulting_total: u64,
}

impl XpAward {
    /// True when the daily cap cut this award short
    pub fn was_capped(&self) -> bool {
        self.awarded < self.requested
    }
}

/// Applies XP awards to a student's state
pub struct XpLedger<'a> {
    levels: &'a LevelTable,
    caps: &'a DailyCaps,
}

impl<'a> XpLedger<'a> {
    pub fn new(levels: &'a LevelTable, caps: &'a DailyCaps) -> Self {
        Self { levels, caps }
    }

    /// Award `base_amount * multiplier` XP for `activity`, limited by the daily cap.
    ///
    /// A zero award (cap exhausted) is a normal outcome. Negative amounts, and
    /// awards that would push the total past [`MAX_TOTAL_XP`], are rejected
    /// before `state` is touched.
    pub fn award_xp(
        &self,
        state: &mut StudentGamificationState,
        activity: ActivityType,
        base_amount: i64,
        multiplier: Multiplier,
        occurred_on: NaiveDate,
    ) -> Result<XpAward, GamificationError> {
        if base_amount < 0 {
            return Err(GamificationError::InvalidAmount(base_amount));
        }

        let requested = multiplier.apply(base_amount as u64);

        // Lazy rollover: a tally from another date counts as zero
        let already_today = state.awarded_on(activity, occurred_on);
        let allowed = match self.caps.cap_for(activity) {
            Some(cap) => cap.saturating_sub(already_today),
            None => requested,
        };
        let awarded = requested.min(allowed);

        let old_level = self.levels.level_for(state.total_xp).level;
        let new_total = state
            .total_xp
            .checked_add(awarded)
            .filter(|total| *total <= MAX_TOTAL_XP)
            .ok_or(GamificationError::InvalidAmount(base_amount))?;
        let new_level = self.levels.level_for(new_total).level;

        state.total_xp = new_total;
        state.level = new_level;
        state.daily_xp.insert(
            activity,
            DailyTally {
                date: occurred_on,
                awarded: already_today.saturating_add(awarded),
            },
        );

        if awarded < requested {
            tracing::debug!(
                student = %state.student_id,
                activity = %activity,
                requested,
                awarded,
                "Daily XP cap reached"
            );
        }

        Ok(XpAward {
            activity,
            occurred_on,
            requested,
            awarded,
            multiplier_bp: multiplier.basis_points(),
            old_level,
            new_level,
            leveled_up: new_level > old_level,
            resulting_total: new_total,
        })
    }
}
