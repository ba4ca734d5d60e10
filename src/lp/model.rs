//! Fitted local projections.

use serde::{Deserialize, Serialize};

use crate::domain::{ForecastDistribution, Interval};
use crate::error::ForecastError;
use crate::lp::design::{n_regressors, SHOCK_COLUMN};
use crate::lp::estimator::{BootstrapScheme, PenaltyChoice};
use crate::math::stats;

/// One successfully estimated horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpHorizon {
    pub horizon: usize,
    /// Ridge coefficients in design-column order.
    pub coefficients: Vec<f64>,
    /// Selected `λ` (the applied penalty is `λ · n_obs`).
    pub penalty: f64,
    pub effective_dof: f64,
    /// Residual std of the cumulative-change target.
    pub residual_std: f64,
    pub n_obs: usize,
    /// Bootstrap draws of the shock coefficient.
    pub shock_draws: Vec<f64>,
}

impl LpHorizon {
    pub fn shock_coefficient(&self) -> f64 {
        self.coefficients[SHOCK_COLUMN]
    }

    pub fn shock_coefficient_variance(&self) -> f64 {
        stats::sample_variance(&self.shock_draws)
    }

    /// Cumulative domestic change through this horizon for a foreign move of
    /// `shock` bps:
    ///
    /// ```text
    /// mean = β̂ · m
    /// std  = sqrt(m² · Var(β*) + σ_h²)
    /// ```
    pub fn forecast(&self, shock: f64) -> Result<ForecastDistribution, ForecastError> {
        let mean = self.shock_coefficient() * shock;
        let var = shock * shock * self.shock_coefficient_variance() + self.residual_std * self.residual_std;
        ForecastDistribution::normal(mean, var.max(0.0).sqrt())
    }

    /// Percentile band of the shock coefficient at `level` (e.g. 0.9).
    pub fn shock_band(&self, level: f64) -> Option<Interval> {
        if self.shock_draws.is_empty() || !(level > 0.0 && level < 1.0) {
            return None;
        }
        let mut draws = self.shock_draws.clone();
        stats::sort_values(&mut draws);
        let tail = (1.0 - level) / 2.0;
        Some(Interval::new(
            stats::quantile_sorted(&draws, tail),
            stats::quantile_sorted(&draws, 1.0 - tail),
        ))
    }
}

/// Per-horizon outcome; an unavailable horizon never blocks the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HorizonEstimate {
    Available(LpHorizon),
    Unavailable { horizon: usize, reason: String },
}

impl HorizonEstimate {
    pub fn horizon(&self) -> usize {
        match self {
            HorizonEstimate::Available(h) => h.horizon,
            HorizonEstimate::Unavailable { horizon, .. } => *horizon,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, HorizonEstimate::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpModel {
    pub foreign: String,
    pub domestic: String,
    pub lags: usize,
    pub penalty: PenaltyChoice,
    pub bootstrap: BootstrapScheme,
    /// Index `h-1` holds horizon `h`.
    pub horizons: Vec<HorizonEstimate>,
}

impl LpModel {
    pub fn max_horizon(&self) -> usize {
        self.horizons.len()
    }

    /// The fitted horizon `h`, or `HorizonUnavailable`.
    pub fn horizon(&self, h: usize) -> Result<&LpHorizon, ForecastError> {
        match h.checked_sub(1).and_then(|i| self.horizons.get(i)) {
            Some(HorizonEstimate::Available(fit)) => Ok(fit),
            Some(HorizonEstimate::Unavailable { reason, .. }) => Err(ForecastError::HorizonUnavailable {
                horizon: h,
                reason: reason.clone(),
            }),
            None => Err(ForecastError::HorizonUnavailable {
                horizon: h,
                reason: format!("model was trained for horizons 1..={}", self.max_horizon()),
            }),
        }
    }

    pub fn is_available(&self, h: usize) -> bool {
        self.horizon(h).is_ok()
    }

    pub fn unavailable_horizons(&self) -> Vec<usize> {
        self.horizons
            .iter()
            .filter(|e| !e.is_available())
            .map(HorizonEstimate::horizon)
            .collect()
    }

    /// Structural checks for a model that came from outside.
    pub fn validate(self) -> Result<Self, ForecastError> {
        let k = n_regressors(self.lags);
        for (i, estimate) in self.horizons.iter().enumerate() {
            if estimate.horizon() != i + 1 {
                return Err(ForecastError::Validation(format!(
                    "local projection horizons out of order: slot {} holds horizon {}",
                    i + 1,
                    estimate.horizon()
                )));
            }
            let HorizonEstimate::Available(fit) = estimate else {
                continue;
            };
            if fit.coefficients.len() != k {
                return Err(ForecastError::dimension(
                    format!("LP horizon {} coefficients", fit.horizon),
                    k,
                    fit.coefficients.len(),
                ));
            }
            let finite = fit
                .coefficients
                .iter()
                .chain(&fit.shock_draws)
                .chain([&fit.penalty, &fit.residual_std, &fit.effective_dof])
                .all(|v| v.is_finite());
            if !finite || fit.residual_std < 0.0 || fit.penalty < 0.0 {
                return Err(ForecastError::Validation(format!(
                    "LP horizon {} has invalid coefficients or scales",
                    fit.horizon
                )));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::penalty::PenaltyGrid;

    fn horizon(h: usize, beta: f64, draws: Vec<f64>) -> LpHorizon {
        LpHorizon {
            horizon: h,
            coefficients: vec![0.0, beta, 0.0, 0.0],
            penalty: 0.01,
            effective_dof: 3.5,
            residual_std: 4.0,
            n_obs: 100,
            shock_draws: draws,
        }
    }

    fn model() -> LpModel {
        LpModel {
            foreign: "f".into(),
            domestic: "d".into(),
            lags: 1,
            penalty: PenaltyChoice::Bic(PenaltyGrid::default()),
            bootstrap: BootstrapScheme::Residual,
            horizons: vec![
                HorizonEstimate::Available(horizon(1, 0.4, vec![0.3, 0.5])),
                HorizonEstimate::Unavailable { horizon: 2, reason: "singular".into() },
            ],
        }
    }

    #[test]
    fn forecast_combines_coefficient_and_residual_uncertainty() {
        let h = horizon(1, 0.4, vec![0.3, 0.5]);
        let f = h.forecast(25.0).unwrap();
        assert!((f.mean - 10.0).abs() < 1e-12);
        // Var(β*) = 0.02; 625 · 0.02 + 16 = 28.5
        assert!((f.std - 28.5f64.sqrt()).abs() < 1e-12);
        let zero = h.forecast(0.0).unwrap();
        assert_eq!(zero.mean, 0.0);
        assert!((zero.std - 4.0).abs() < 1e-12);
    }

    #[test]
    fn unavailable_horizons_are_reported() {
        let m = model();
        assert!(m.horizon(1).is_ok());
        assert!(matches!(m.horizon(2), Err(ForecastError::HorizonUnavailable { horizon: 2, .. })));
        assert!(matches!(m.horizon(3), Err(ForecastError::HorizonUnavailable { horizon: 3, .. })));
        assert!(!m.is_available(0));
        assert_eq!(m.unavailable_horizons(), vec![2]);
    }

    #[test]
    fn status_tag_round_trips() {
        let m = model();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"status\":\"unavailable\""));
        let back: LpModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.validate().unwrap(), m);
    }

    #[test]
    fn validate_rejects_wrong_width() {
        let mut m = model();
        m.lags = 2;
        assert!(matches!(m.validate(), Err(ForecastError::DimensionMismatch { .. })));
    }

    #[test]
    fn shock_band_uses_percentiles() {
        let h = horizon(1, 0.4, (0..=100).map(|i| i as f64 / 100.0).collect());
        let band = h.shock_band(0.9).unwrap();
        assert!((band.lower - 0.05).abs() < 1e-12);
        assert!((band.upper - 0.95).abs() < 1e-12);
    }
}
