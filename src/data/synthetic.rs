//! Seeded synthetic foreign/domestic rate panel.
//!
//! Monthly changes (bps) follow a small structural system:
//!
//! ```text
//! Δf_t = φ_f Δf_{t-1} + η_t,                          η ~ N(0, σ_f)
//! Δd_t = φ_d Δd_{t-1} + b0 Δf_t + b1 Δf_{t-1} + ε_t,  ε ~ N(0, σ_d)
//! ```
//!
//! and levels are accumulated from a starting level. The foreign rate is
//! ordered first by construction, matching the recursive identification.

use chrono::{Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::TimeSeriesPanel;
use crate::error::ForecastError;

/// Months simulated and discarded before the first kept observation.
const BURN_IN: usize = 24;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub foreign: String,
    pub domestic: String,
    pub start: NaiveDate,
    pub n_obs: usize,
    pub seed: u64,
    /// Starting levels (bps).
    pub foreign_level: f64,
    pub domestic_level: f64,
    pub foreign_persistence: f64,
    pub domestic_persistence: f64,
    /// Same-month loading of domestic on foreign changes.
    pub pass_through: f64,
    /// Next-month loading of domestic on foreign changes.
    pub lagged_pass_through: f64,
    pub foreign_vol: f64,
    pub domestic_vol: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            foreign: "foreign_rate".to_string(),
            domestic: "domestic_rate".to_string(),
            start: NaiveDate::from_ymd_opt(2004, 1, 1).unwrap_or_default(),
            n_obs: 240,
            seed: 7,
            foreign_level: 300.0,
            domestic_level: 450.0,
            foreign_persistence: 0.3,
            domestic_persistence: 0.3,
            pass_through: 0.35,
            lagged_pass_through: 0.25,
            foreign_vol: 15.0,
            domestic_vol: 6.0,
        }
    }
}

/// Generate a level panel `[foreign, domestic]` with `n_obs` monthly rows.
pub fn synthetic_panel(config: &SyntheticConfig) -> Result<TimeSeriesPanel, ForecastError> {
    if config.n_obs < 2 {
        return Err(ForecastError::Validation(format!(
            "synthetic panel needs at least 2 observations, got {}",
            config.n_obs
        )));
    }
    for (name, phi) in [
        ("foreign_persistence", config.foreign_persistence),
        ("domestic_persistence", config.domestic_persistence),
    ] {
        if !(phi.is_finite() && phi.abs() < 1.0) {
            return Err(ForecastError::unsupported(name, phi, "must lie strictly inside (-1, 1)"));
        }
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let foreign_noise = Normal::new(0.0, config.foreign_vol)
        .map_err(|e| ForecastError::unsupported("foreign_vol", config.foreign_vol, e.to_string()))?;
    let domestic_noise = Normal::new(0.0, config.domestic_vol)
        .map_err(|e| ForecastError::unsupported("domestic_vol", config.domestic_vol, e.to_string()))?;

    let mut df_prev = 0.0;
    let mut dd_prev = 0.0;
    let mut foreign = config.foreign_level;
    let mut domestic = config.domestic_level;
    let mut rows = Vec::with_capacity(config.n_obs);

    for i in 0..(BURN_IN + config.n_obs) {
        let df = config.foreign_persistence * df_prev + foreign_noise.sample(&mut rng);
        let dd = config.domestic_persistence * dd_prev
            + config.pass_through * df
            + config.lagged_pass_through * df_prev
            + domestic_noise.sample(&mut rng);
        df_prev = df;
        dd_prev = dd;

        if i < BURN_IN {
            continue;
        }
        foreign += df;
        domestic += dd;

        let k = (i - BURN_IN) as u32;
        let period = config
            .start
            .checked_add_months(Months::new(k))
            .ok_or_else(|| ForecastError::Validation(format!("period {k} overflows the calendar")))?;
        rows.push((period, vec![foreign, domestic]));
    }

    TimeSeriesPanel::from_rows(vec![config.foreign.clone(), config.domestic.clone()], rows)
}
