//! Spread a horizon's move probability across upcoming policy meetings.
//!
//! With `m` meetings strictly after the reference date (at most
//! `max_meetings`), meeting `i` (0 = nearest) gets weight
//! `decay^i / Σ_j decay^j`. Its bucket table is `P(k) · w_i` for every
//! non-zero bucket `k`, so the tables sum to the horizon's `1 - P(0)`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::discretize::buckets::DiscretizedDistribution;
use crate::domain::MeetingCalendar;
use crate::error::ForecastError;

pub const DEFAULT_DECAY: f64 = 0.5;
pub const DEFAULT_MAX_MEETINGS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Weight ratio between consecutive meetings, in `(0, 1)`.
    pub decay: f64,
    pub max_meetings: usize,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            decay: DEFAULT_DECAY,
            max_meetings: DEFAULT_MAX_MEETINGS,
        }
    }
}

impl AllocationConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(self.decay > 0.0 && self.decay < 1.0) {
            return Err(ForecastError::unsupported("decay", self.decay, "must lie in (0, 1)"));
        }
        if self.max_meetings == 0 {
            return Err(ForecastError::unsupported("max_meetings", self.max_meetings, "must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingProbability {
    pub date: NaiveDate,
    pub weight: f64,
    pub move_probability: f64,
    /// Non-zero bucket → probability of that move at this meeting.
    pub buckets: BTreeMap<i64, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingAllocation {
    pub horizon: usize,
    pub reference_date: NaiveDate,
    pub total_move_probability: f64,
    pub meetings: Vec<MeetingProbability>,
}

impl MeetingAllocation {
    pub fn allocated(&self) -> f64 {
        self.meetings.iter().map(|m| m.move_probability).sum()
    }
}

/// Normalized geometric weights `decay^i`, nearest meeting first.
pub fn decay_weights(count: usize, decay: f64) -> Vec<f64> {
    let raw: Vec<f64> = (0..count).map(|i| decay.powi(i as i32)).collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return vec![0.0; count];
    }
    raw.into_iter().map(|w| w / total).collect()
}

pub fn allocate_to_meetings(
    distribution: &DiscretizedDistribution,
    horizon: usize,
    reference_date: NaiveDate,
    calendar: &MeetingCalendar,
    config: &AllocationConfig,
) -> Result<MeetingAllocation, ForecastError> {
    config.validate()?;
    let dates = calendar.upcoming(reference_date, config.max_meetings);
    let total = distribution.move_probability();
    if dates.is_empty() {
        warn!(%reference_date, "no meetings after the reference date; move probability left unallocated");
    }

    let weights = decay_weights(dates.len(), config.decay);
    let meetings = dates
        .into_iter()
        .zip(weights)
        .map(|(date, weight)| {
            let buckets: BTreeMap<i64, f64> = distribution
                .buckets
                .iter()
                .filter(|(k, _)| **k != 0)
                .map(|(k, p)| (*k, p * weight))
                .collect();
            MeetingProbability {
                date,
                weight,
                move_probability: buckets.values().sum(),
                buckets,
            }
        })
        .collect();

    Ok(MeetingAllocation {
        horizon,
        reference_date,
        total_move_probability: total,
        meetings,
    })
}
