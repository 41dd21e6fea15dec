//! Streak multiplier table
//!
//! Piecewise-constant mapping from streak length to an XP factor. Factors are
//! kept in basis points (10_000 = 1.0x) so rounding of awarded XP is exact.

use serde::{Deserialize, Serialize};

use super::error::GamificationError;

/// XP factor in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Multiplier(u32);

impl Multiplier {
    pub const ONE: Multiplier = Multiplier(10_000);

    pub const fn from_basis_points(bp: u32) -> Self {
        Self(bp)
    }

    /// Convert a decimal factor (e.g. 1.05), rounding to the nearest basis point
    pub fn from_factor(factor: f64) -> Result<Self, GamificationError> {
        if !factor.is_finite() || factor < 1.0 {
            return Err(GamificationError::Config(format!(
                "streak multiplier must be a finite factor >= 1.0, got {}",
                factor
            )));
        }
        let bp = (factor * 10_000.0).round();
        if bp > u32::MAX as f64 {
            return Err(GamificationError::Config(format!(
                "streak multiplier {} is too large",
                factor
            )));
        }
        Ok(Self(bp as u32))
    }

    pub fn basis_points(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    /// `round(amount * factor)` with halves rounded up
    pub fn apply(&self, amount: u64) -> u64 {
        let scaled = amount as u128 * self.0 as u128;
        let rounded = (scaled + 5_000) / 10_000;
        u64::try_from(rounded).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Display for Multiplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}x", self.as_f64())
    }
}

/// One breakpoint of the table as written in config
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierStep {
    /// Streak length (days) at which this factor starts applying
    pub min_days: u32,
    pub multiplier: f64,
}

/// Built-in breakpoints
const DEFAULT_STEPS: &[(u32, u32)] = &[
    (0, 10_000),
    (3, 10_500),
    (7, 11_000),
    (14, 11_500),
    (30, 12_500),
    (90, 13_500),
    (180, 15_000),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakMultiplierTable {
    /// (min_days, factor), sorted by min_days, first entry at 0
    steps: Vec<(u32, Multiplier)>,
}

impl Default for StreakMultiplierTable {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS
                .iter()
                .map(|(days, bp)| (*days, Multiplier::from_basis_points(*bp)))
                .collect(),
        }
    }
}

impl StreakMultiplierTable {
    /// Build from config steps.
    ///
    /// Breakpoints must start at 0 and strictly increase; factors must be
    /// >= 1.0 and non-decreasing.
    pub fn new(steps: &[MultiplierStep]) -> Result<Self, GamificationError> {
        let first = steps.first().ok_or_else(|| {
            GamificationError::Config("streak multiplier table must not be empty".to_string())
        })?;
        if first.min_days != 0 {
            return Err(GamificationError::Config(format!(
                "first streak multiplier breakpoint must be 0 days, found {}",
                first.min_days
            )));
        }

        let mut parsed: Vec<(u32, Multiplier)> = Vec::with_capacity(steps.len());
        for step in steps {
            let factor = Multiplier::from_factor(step.multiplier)?;
            if let Some((prev_days, prev_factor)) = parsed.last() {
                if step.min_days <= *prev_days {
                    return Err(GamificationError::Config(format!(
                        "streak breakpoints must increase: {} after {}",
                        step.min_days, prev_days
                    )));
                }
                if factor < *prev_factor {
                    return Err(GamificationError::Config(format!(
                        "streak multiplier at {} days ({}) is lower than at {} days ({})",
                        step.min_days, factor, prev_days, prev_factor
                    )));
                }
            }
            parsed.push((step.min_days, factor));
        }

        Ok(Self { steps: parsed })
    }

    /// Factor for a streak of `streak_days` consecutive days
    pub fn multiplier_for(&self, streak_days: u32) -> Multiplier {
        self.steps
            .iter()
            .rev()
            .find(|(min_days, _)| streak_days >= *min_days)
            .map(|(_, factor)| *factor)
            .unwrap_or(Multiplier::ONE)
    }

    /// Config representation of this table
    pub fn steps(&self) -> Vec<MultiplierStep> {
        self.steps
            .iter()
            .map(|(days, factor)| MultiplierStep {
                min_days: *days,
                multiplier: factor.as_f64(),
            })
            .collect()
    }
}
