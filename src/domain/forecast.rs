//! Continuous forecast hand-off between the estimators and discretization.

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::math::{Z_80, Z_95};

/// Width of a ~95% normal interval in standard deviations (`2 × 1.96`).
pub const CI95_WIDTH_IN_STD: f64 = 3.92;

/// Relative disagreement between `std` and the interval-implied std that
/// triggers reconciliation.
pub const STD_RECONCILE_TOLERANCE: f64 = 0.25;

/// A closed interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.lower <= other.lower && other.upper <= self.upper
    }
}

/// Per-horizon continuous forecast: `(mean, std, lower_ci, upper_ci)`.
///
/// Invariants: `lower_ci <= mean <= upper_ci`, and `std` never contradicts the
/// ~95% interval (see [`ForecastDistribution::new`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastDistribution {
    pub mean: f64,
    pub std: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
    /// Set when `std` (or a degenerate interval) had to be rewritten.
    #[serde(default)]
    pub std_reconciled: bool,
}

impl ForecastDistribution {
    /// Build a forecast, enforcing the invariants.
    ///
    /// - the interval is widened to contain the mean
    /// - if the interval is degenerate but `std > 0`, the interval is rebuilt
    ///   as `mean ± 1.96·std`
    /// - otherwise, if `std` disagrees with `(upper - lower) / 3.92` by more
    ///   than 25%, `std` is replaced by the interval-implied value
    pub fn new(mean: f64, std: f64, lower_ci: f64, upper_ci: f64) -> Result<Self, ForecastError> {
        if !(mean.is_finite() && lower_ci.is_finite() && upper_ci.is_finite()) {
            return Err(ForecastError::Validation(format!(
                "non-finite forecast: mean={mean}, ci=[{lower_ci}, {upper_ci}]"
            )));
        }
        let lower = lower_ci.min(mean);
        let upper = upper_ci.max(mean);
        let implied = (upper - lower) / CI95_WIDTH_IN_STD;
        let std_ok = std.is_finite() && std >= 0.0;

        if implied <= 0.0 {
            if std_ok && std > 0.0 {
                return Ok(Self {
                    mean,
                    std,
                    lower_ci: mean - Z_95 * std,
                    upper_ci: mean + Z_95 * std,
                    std_reconciled: true,
                });
            }
            return Ok(Self {
                mean,
                std: 0.0,
                lower_ci: mean,
                upper_ci: mean,
                std_reconciled: !std_ok,
            });
        }

        let consistent = std_ok && (std - implied).abs() <= STD_RECONCILE_TOLERANCE * implied;
        Ok(Self {
            mean,
            std: if consistent { std } else { implied },
            lower_ci: lower,
            upper_ci: upper,
            std_reconciled: !consistent,
        })
    }

    /// Symmetric normal forecast with a 95% interval from `std`.
    pub fn normal(mean: f64, std: f64) -> Result<Self, ForecastError> {
        if !(std.is_finite() && std >= 0.0) {
            return Err(ForecastError::Validation(format!("invalid forecast std {std}")));
        }
        Self::new(mean, std, mean - Z_95 * std, mean + Z_95 * std)
    }

    pub fn ci95(&self) -> Interval {
        Interval::new(self.lower_ci, self.upper_ci)
    }

    /// 80% interval `mean ± 1.2816·std`, clipped into the 95% interval.
    pub fn ci80(&self) -> Interval {
        let lower = (self.mean - Z_80 * self.std).max(self.lower_ci).min(self.mean);
        let upper = (self.mean + Z_80 * self.std).min(self.upper_ci).max(self.mean);
        Interval::new(lower, upper)
    }
}
