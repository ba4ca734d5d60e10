//! Continuous forecast → probabilities over step-sized outcome buckets.
//!
//! 1. Centre a grid on the mean rounded to the nearest step and extend it
//!    `ceil(3σ / step)` buckets each way.
//! 2. Give each bucket `k` the normal mass between `k ± step/2`.
//! 3. Drop buckets below the pruning floor and renormalize to exactly 1.
//!
//! The grid never exceeds `MAX_GRID_BUCKETS`, whatever the forecast std.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ForecastDistribution;
use crate::error::ForecastError;
use crate::math::std_normal_cdf;

/// Outcome step (bps).
pub const STEP_BPS: i64 = 25;

/// Buckets below this probability are pruned.
pub const PRUNE_FLOOR: f64 = 0.005;

/// Grid half-width in standard deviations.
const GRID_STD_SPAN: f64 = 3.0;

/// Most buckets one grid may hold (the span is capped, not rejected).
pub const MAX_GRID_BUCKETS: usize = 401;

/// Largest forecast mean that can be placed on a grid (bps).
pub const MAX_ABS_MEAN_BPS: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscretizationConfig {
    pub step_bps: i64,
    pub prune_floor: f64,
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self {
            step_bps: STEP_BPS,
            prune_floor: PRUNE_FLOOR,
        }
    }
}

impl DiscretizationConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.step_bps <= 0 {
            return Err(ForecastError::unsupported("step_bps", self.step_bps, "must be > 0"));
        }
        if !(self.prune_floor.is_finite() && (0.0..1.0).contains(&self.prune_floor)) {
            return Err(ForecastError::unsupported(
                "prune_floor",
                self.prune_floor,
                "must lie in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// Probability per bucket (keys are exact multiples of the step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretizedDistribution {
    pub step_bps: i64,
    pub buckets: BTreeMap<i64, f64>,
}

impl DiscretizedDistribution {
    pub fn probability(&self, bucket: i64) -> f64 {
        self.buckets.get(&bucket).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.buckets.values().sum()
    }

    pub fn expected_value(&self) -> f64 {
        self.buckets.iter().map(|(k, p)| *k as f64 * p).sum()
    }

    /// `1 - P(0)`.
    pub fn move_probability(&self) -> f64 {
        (1.0 - self.probability(0)).clamp(0.0, 1.0)
    }

    /// Most likely bucket (ties go to the smaller magnitude).
    pub fn mode(&self) -> Option<i64> {
        self.buckets
            .iter()
            .max_by(|(ka, pa), (kb, pb)| pa.total_cmp(pb).then(kb.abs().cmp(&ka.abs())))
            .map(|(k, _)| *k)
    }
}

/// Discretize a continuous forecast onto step-sized buckets.
pub fn discretize(
    forecast: &ForecastDistribution,
    config: &DiscretizationConfig,
) -> Result<DiscretizedDistribution, ForecastError> {
    config.validate()?;
    if !(forecast.mean.is_finite() && forecast.std.is_finite() && forecast.std >= 0.0) {
        return Err(ForecastError::Validation(format!(
            "cannot discretize mean={} std={}",
            forecast.mean, forecast.std
        )));
    }
    if forecast.mean.abs() > MAX_ABS_MEAN_BPS {
        return Err(ForecastError::unsupported(
            "forecast mean",
            forecast.mean,
            format!("outcomes are limited to ±{MAX_ABS_MEAN_BPS} bps"),
        ));
    }
    let step = config.step_bps as f64;
    let centre = (forecast.mean / step).round() as i64;

    if forecast.std == 0.0 {
        return Ok(DiscretizedDistribution {
            step_bps: config.step_bps,
            buckets: BTreeMap::from([(centre * config.step_bps, 1.0)]),
        });
    }

    let max_span = (MAX_GRID_BUCKETS as i64 - 1) / 2;
    let wanted = ((GRID_STD_SPAN * forecast.std / step).ceil() as i64).max(1);
    if wanted > max_span {
        debug!(wanted, max_span, "capping discretization grid");
    }
    let span = wanted.min(max_span);
    let mut raw: BTreeMap<i64, f64> = BTreeMap::new();
    for i in (centre - span)..=(centre + span) {
        let key = i * config.step_bps;
        let lo = (key as f64 - step / 2.0 - forecast.mean) / forecast.std;
        let hi = (key as f64 + step / 2.0 - forecast.mean) / forecast.std;
        raw.insert(key, (std_normal_cdf(hi) - std_normal_cdf(lo)).max(0.0));
    }

    let kept: BTreeMap<i64, f64> = raw
        .iter()
        .filter(|(_, p)| **p >= config.prune_floor)
        .map(|(k, p)| (*k, *p))
        .collect();
    let pruned = raw.len() - kept.len();
    let buckets = if kept.is_empty() || kept.values().sum::<f64>() <= 0.0 {
        debug!("every bucket below the pruning floor; keeping the full grid");
        raw
    } else {
        kept
    };

    let buckets = normalize(buckets);
    debug!(buckets = buckets.len(), pruned, "discretized forecast");
    Ok(DiscretizedDistribution {
        step_bps: config.step_bps,
        buckets,
    })
}

/// Scale to sum 1, then push the rounding residue into the largest bucket.
fn normalize(mut buckets: BTreeMap<i64, f64>) -> BTreeMap<i64, f64> {
    let total: f64 = buckets.values().sum();
    if total > 0.0 {
        for p in buckets.values_mut() {
            *p /= total;
        }
    }
    let residue = 1.0 - buckets.values().sum::<f64>();
    if let Some(largest) = buckets.values_mut().max_by(|a, b| a.total_cmp(b)) {
        *largest += residue;
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast(mean: f64, std: f64) -> ForecastDistribution {
        ForecastDistribution::normal(mean, std).unwrap()
    }

    fn check_invariants(d: &DiscretizedDistribution) {
        assert!((d.total() - 1.0).abs() <= 1e-9, "total {}", d.total());
        assert!(d.buckets.keys().all(|k| k % 25 == 0));
        assert!(d.buckets.values().all(|p| *p >= 0.0));
    }

    #[test]
    fn symmetric_around_zero() {
        let d = discretize(&forecast(0.0, 20.0), &DiscretizationConfig::default()).unwrap();
        check_invariants(&d);
        assert!((d.probability(25) - d.probability(-25)).abs() < 1e-12);
        assert_eq!(d.mode(), Some(0));
        assert!(d.expected_value().abs() < 1e-9);
    }

    #[test]
    fn invariants_hold_across_inputs() {
        for &(mean, std) in &[(9.7, 4.0), (-63.0, 31.0), (130.0, 2.0), (12.5, 60.0), (1e-3, 1e-3)] {
            let d = discretize(&forecast(mean, std), &DiscretizationConfig::default()).unwrap();
            check_invariants(&d);
        }
    }

    #[test]
    fn zero_std_is_a_point_mass() {
        let d = discretize(&forecast(37.0, 0.0), &DiscretizationConfig::default()).unwrap();
        assert_eq!(d.buckets, BTreeMap::from([(25, 1.0)]));
        assert_eq!(d.move_probability(), 1.0);
    }

    #[test]
    fn tiny_buckets_are_pruned() {
        let d = discretize(&forecast(0.0, 10.0), &DiscretizationConfig::default()).unwrap();
        // ±50 carries ~9e-5 before pruning.
        assert!(!d.buckets.contains_key(&50));
        assert!(d.buckets.contains_key(&25));
    }

    #[test]
    fn keeps_everything_when_all_below_floor() {
        let cfg = DiscretizationConfig { prune_floor: 0.9, ..Default::default() };
        let d = discretize(&forecast(0.0, 40.0), &cfg).unwrap();
        check_invariants(&d);
        assert!(d.buckets.len() > 3);
    }

    #[test]
    fn grid_size_is_capped() {
        for std in [1e5, 1e7, 1e12] {
            let d = discretize(&forecast(0.0, std), &DiscretizationConfig::default()).unwrap();
            check_invariants(&d);
            assert!(d.buckets.len() <= MAX_GRID_BUCKETS, "std {std}: {} buckets", d.buckets.len());
        }
    }

    #[test]
    fn rejects_unplaceable_mean() {
        let err = discretize(&forecast(1e12, 10.0), &DiscretizationConfig::default()).unwrap_err();
        assert!(matches!(err, ForecastError::UnsupportedValue { .. }));
    }

    #[test]
    fn rejects_bad_step() {
        let cfg = DiscretizationConfig { step_bps: 0, ..Default::default() };
        assert!(discretize(&forecast(0.0, 1.0), &cfg).is_err());
    }
}
