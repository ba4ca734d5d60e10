//! Prediction requests and their validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::discretize::STEP_BPS;
use crate::domain::{MoveDirection, Regime};
use crate::error::ForecastError;
use crate::lp::MAX_HORIZON;
use crate::math::SeedHasher;

/// Largest foreign move or surprise accepted (bps).
pub const MAX_MOVE_BPS: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub reference_date: NaiveDate,
    /// Announced foreign move; must be a multiple of 25 bps.
    pub foreign_move_bps: i64,
    #[serde(default)]
    pub direction: Option<MoveDirection>,
    /// Unanticipated part of the move. When given, this is the shock.
    #[serde(default)]
    pub surprise_bps: Option<f64>,
    pub horizons: Vec<usize>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub regime_hint: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A request that passed every check, with defaults resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub reference_date: NaiveDate,
    pub foreign_move_bps: i64,
    /// Shock fed to the estimators (bps).
    pub shock_bps: f64,
    /// Sorted, de-duplicated.
    pub horizons: Vec<usize>,
    pub model_version: Option<String>,
    pub regime: Regime,
    pub seed: u64,
}

impl ValidatedRequest {
    pub fn shortest_horizon(&self) -> usize {
        self.horizons[0]
    }

    pub fn longest_horizon(&self) -> usize {
        self.horizons[self.horizons.len() - 1]
    }
}

impl PredictionRequest {
    /// Request for `move_bps` at `horizons`, everything else defaulted.
    pub fn new(reference_date: NaiveDate, foreign_move_bps: i64, horizons: Vec<usize>) -> Self {
        Self {
            reference_date,
            foreign_move_bps,
            direction: None,
            surprise_bps: None,
            horizons,
            model_version: None,
            regime_hint: None,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<ValidatedRequest, ForecastError> {
        if self.foreign_move_bps % STEP_BPS != 0 {
            return Err(ForecastError::unsupported(
                "foreign_move_bps",
                self.foreign_move_bps,
                format!("moves must be multiples of {STEP_BPS} bps"),
            ));
        }
        if self.foreign_move_bps.abs() > MAX_MOVE_BPS {
            return Err(ForecastError::unsupported(
                "foreign_move_bps",
                self.foreign_move_bps,
                format!("moves are limited to ±{MAX_MOVE_BPS} bps"),
            ));
        }
        if let Some(direction) = self.direction.filter(|d| !d.agrees_with(self.foreign_move_bps)) {
            return Err(ForecastError::Validation(format!(
                "direction {direction:?} contradicts a move of {} bps",
                self.foreign_move_bps
            )));
        }
        if let Some(surprise) = self.surprise_bps.filter(|s| !s.is_finite()) {
            return Err(ForecastError::Validation(format!("surprise_bps must be finite, got {surprise}")));
        }
        if let Some(surprise) = self.surprise_bps.filter(|s| s.abs() > MAX_MOVE_BPS as f64) {
            return Err(ForecastError::unsupported(
                "surprise_bps",
                surprise,
                format!("surprises are limited to ±{MAX_MOVE_BPS} bps"),
            ));
        }

        if self.horizons.is_empty() {
            return Err(ForecastError::Validation("at least one horizon is required".into()));
        }
        if let Some(h) = self.horizons.iter().find(|h| !(1..=MAX_HORIZON).contains(*h)) {
            return Err(ForecastError::Validation(format!(
                "horizon {h} is outside 1..={MAX_HORIZON}"
            )));
        }
        let mut horizons = self.horizons.clone();
        horizons.sort_unstable();
        horizons.dedup();

        let regime = Regime::from_hint(self.regime_hint.as_deref())?;
        let model_version = match self.model_version.as_deref().map(str::trim) {
            Some("") => {
                return Err(ForecastError::Validation("model_version is empty".into()));
            }
            other => other.map(str::to_string),
        };

        Ok(ValidatedRequest {
            reference_date: self.reference_date,
            foreign_move_bps: self.foreign_move_bps,
            shock_bps: self.surprise_bps.unwrap_or(self.foreign_move_bps as f64),
            regime,
            seed: self.seed.unwrap_or_else(|| derived_seed(self, &horizons, regime)),
            horizons,
            model_version,
        })
    }
}

/// Deterministic seed for a request that did not bring one.
fn derived_seed(request: &PredictionRequest, horizons: &[usize], regime: Regime) -> u64 {
    let hasher = SeedHasher::new("request")
        .bytes(request.reference_date.to_string().as_bytes())
        .i64(request.foreign_move_bps)
        .optional_u64(request.surprise_bps.map(f64::to_bits));
    horizons
        .iter()
        .fold(hasher, |h, &horizon| h.u64(horizon as u64))
        .optional_str(request.model_version.as_deref())
        .u64(regime as u64)
        .finish()
}
