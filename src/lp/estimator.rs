//! Penalized local-projection estimation with bootstrap bands.
//!
//! Horizons are independent regressions: they are fitted in parallel, each
//! with its own seeded generator, and a failure at one horizon only marks
//! that horizon unavailable.

use clap::ValueEnum;
use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{PanelRoles, TimeSeriesPanel};
use crate::error::ForecastError;
use crate::lp::design::{build_design, HorizonDesign, SHOCK_COLUMN};
use crate::lp::model::{HorizonEstimate, LpHorizon, LpModel};
use crate::lp::penalty::{fit_at, penalty_vector, score_grid, select_by_bic, PenaltyGrid};
use crate::math::{solve_ridge, sum_squared_residuals, SeedHasher};

/// Longest horizon the engine serves (months).
pub const MAX_HORIZON: usize = 12;

/// How the ridge penalty is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PenaltyChoice {
    Fixed { lambda: f64 },
    Bic(PenaltyGrid),
}

/// Bootstrap resampling scheme for the shock-coefficient bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapScheme {
    /// Resample `(x_t, y_t)` rows.
    Pairs,
    /// Keep `X`, resample centered residuals.
    Residual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpConfig {
    pub max_horizon: usize,
    pub lags: usize,
    pub penalty: PenaltyChoice,
    pub bootstrap: BootstrapScheme,
    pub n_bootstrap: usize,
    pub seed: u64,
}

impl Default for LpConfig {
    fn default() -> Self {
        Self {
            max_horizon: MAX_HORIZON,
            lags: 2,
            penalty: PenaltyChoice::Bic(PenaltyGrid::default()),
            bootstrap: BootstrapScheme::Residual,
            n_bootstrap: 500,
            seed: 0,
        }
    }
}

impl LpConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.max_horizon == 0 || self.max_horizon > MAX_HORIZON {
            return Err(ForecastError::unsupported(
                "max_horizon",
                self.max_horizon,
                format!("must be in 1..={MAX_HORIZON}"),
            ));
        }
        match self.penalty {
            PenaltyChoice::Fixed { lambda } if !(lambda.is_finite() && lambda >= 0.0) => {
                return Err(ForecastError::unsupported("lambda", lambda, "must be finite and >= 0"));
            }
            PenaltyChoice::Bic(grid) => {
                grid.values()?;
            }
            PenaltyChoice::Fixed { .. } => {}
        }
        if self.n_bootstrap < 2 {
            return Err(ForecastError::unsupported(
                "n_bootstrap",
                self.n_bootstrap,
                "need at least 2 resamples for a variance",
            ));
        }
        Ok(())
    }
}

/// Seed of horizon `h`'s generator, derived from the run seed.
fn horizon_seed(seed: u64, horizon: usize) -> u64 {
    SeedHasher::new("lp-bootstrap").u64(seed).u64(horizon as u64).finish()
}

/// Estimate horizons `1..=config.max_horizon` from a panel of monthly changes.
pub fn estimate_local_projections(
    changes: &TimeSeriesPanel,
    roles: PanelRoles,
    config: &LpConfig,
) -> Result<LpModel, ForecastError> {
    config.validate()?;

    let estimates = (1..=config.max_horizon)
        .into_par_iter()
        .map(|h| match build_design(changes, roles, config.lags, h) {
            Ok(design) => fit_horizon(&design, config),
            Err(ForecastError::HorizonUnavailable { horizon, reason }) => {
                warn!(horizon, %reason, "local projection horizon unavailable");
                Ok(HorizonEstimate::Unavailable { horizon, reason })
            }
            Err(e) => Err(e),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let variables = changes.variables();
    finish(
        variables[roles.foreign].clone(),
        variables[roles.domestic].clone(),
        estimates,
        config,
    )
}

/// Estimate from prepared designs (one per horizon, in horizon order).
pub fn estimate_from_designs(
    foreign: impl Into<String>,
    domestic: impl Into<String>,
    designs: &[HorizonDesign],
    config: &LpConfig,
) -> Result<LpModel, ForecastError> {
    config.validate()?;
    for (i, d) in designs.iter().enumerate() {
        if d.horizon != i + 1 {
            return Err(ForecastError::Validation(format!(
                "designs must cover horizons 1..={} in order; slot {} has horizon {}",
                designs.len(),
                i + 1,
                d.horizon
            )));
        }
    }
    let estimates = designs
        .par_iter()
        .map(|d| fit_horizon(d, config))
        .collect::<Result<Vec<_>, _>>()?;
    finish(foreign.into(), domestic.into(), estimates, config)
}

fn finish(
    foreign: String,
    domestic: String,
    horizons: Vec<HorizonEstimate>,
    config: &LpConfig,
) -> Result<LpModel, ForecastError> {
    let model = LpModel {
        foreign,
        domestic,
        lags: config.lags,
        penalty: config.penalty,
        bootstrap: config.bootstrap,
        horizons,
    };
    let unavailable = model.unavailable_horizons();
    info!(
        horizons = model.max_horizon(),
        unavailable = ?unavailable,
        "estimated local projections"
    );
    if unavailable.len() == model.max_horizon() {
        return Err(ForecastError::HorizonUnavailable {
            horizon: 1,
            reason: "no local projection horizon could be estimated".into(),
        });
    }
    Ok(model)
}

/// Fit one horizon; numerical failures become `Unavailable`.
pub fn fit_horizon(design: &HorizonDesign, config: &LpConfig) -> Result<HorizonEstimate, ForecastError> {
    let horizon = design.horizon;
    let unavailable = |reason: String| -> Result<HorizonEstimate, ForecastError> {
        warn!(horizon, %reason, "local projection horizon unavailable");
        Ok(HorizonEstimate::Unavailable { horizon, reason })
    };

    if let Some(reason) = design.singularity() {
        return unavailable(reason);
    }

    let chosen = match config.penalty {
        PenaltyChoice::Fixed { lambda } => fit_at(design, lambda).map(|fit| (lambda, fit)),
        PenaltyChoice::Bic(grid) => {
            let scored = score_grid(design, &grid.values()?);
            select_by_bic(&scored).map(|c| (c.lambda, c.fit.clone()))
        }
    };
    let Some((lambda, fit)) = chosen else {
        return unavailable("ridge system could not be solved for any penalty".into());
    };

    let n = design.n_rows();
    let sse = sum_squared_residuals(&design.x, &design.y, &fit.beta);
    let dof_resid = (n as f64 - fit.effective_dof).max(1.0);
    let residual_std = (sse / dof_resid).sqrt();

    let mut rng = StdRng::seed_from_u64(horizon_seed(config.seed, horizon));
    let shock_draws = bootstrap_shock(design, &fit.beta, lambda, config, &mut rng);
    if shock_draws.len() < config.n_bootstrap {
        debug!(
            horizon,
            kept = shock_draws.len(),
            requested = config.n_bootstrap,
            "some bootstrap resamples were singular and dropped"
        );
    }
    if shock_draws.len() < 2 {
        return unavailable(format!(
            "only {} of {} bootstrap resamples could be fitted",
            shock_draws.len(),
            config.n_bootstrap
        ));
    }

    debug!(horizon, lambda, residual_std, beta = fit.beta[SHOCK_COLUMN], "fitted horizon");
    Ok(HorizonEstimate::Available(LpHorizon {
        horizon,
        coefficients: fit.beta.iter().copied().collect(),
        penalty: lambda,
        effective_dof: fit.effective_dof,
        residual_std,
        n_obs: n,
        shock_draws,
    }))
}

fn bootstrap_shock(
    design: &HorizonDesign,
    beta: &DVector<f64>,
    lambda: f64,
    config: &LpConfig,
    rng: &mut StdRng,
) -> Vec<f64> {
    let n = design.n_rows();
    let penalty = penalty_vector(design, lambda);
    let fitted = &design.x * beta;
    let residuals = &design.y - &fitted;
    let centre = residuals.mean();

    let mut draws = Vec::with_capacity(config.n_bootstrap);
    for _ in 0..config.n_bootstrap {
        let fit = match config.bootstrap {
            BootstrapScheme::Pairs => {
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let x = DMatrix::from_fn(n, design.n_regressors(), |r, c| design.x[(rows[r], c)]);
                let y = DVector::from_fn(n, |r, _| design.y[rows[r]]);
                solve_ridge(&x, &y, &penalty)
            }
            BootstrapScheme::Residual => {
                let y = DVector::from_fn(n, |r, _| fitted[r] + residuals[rng.gen_range(0..n)] - centre);
                solve_ridge(&design.x, &y, &penalty)
            }
        };
        if let Some(fit) = fit {
            draws.push(fit.beta[SHOCK_COLUMN]);
        }
    }
    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{synthetic_panel, SyntheticConfig};

    fn changes() -> TimeSeriesPanel {
        synthetic_panel(&SyntheticConfig::default())
            .unwrap()
            .first_differences()
            .unwrap()
    }

    fn config() -> LpConfig {
        LpConfig {
            n_bootstrap: 200,
            seed: 5,
            ..Default::default()
        }
    }

    const ROLES: PanelRoles = PanelRoles { foreign: 0, domestic: 1 };

    #[test]
    fn recovers_impact_pass_through() {
        let model = estimate_local_projections(&changes(), ROLES, &config()).unwrap();
        assert_eq!(model.max_horizon(), MAX_HORIZON);
        let h1 = model.horizon(1).unwrap();
        assert!((h1.shock_coefficient() - 0.35).abs() < 0.1, "β1 = {}", h1.shock_coefficient());
        // Cumulative response builds up with the lagged pass-through.
        let h3 = model.horizon(3).unwrap();
        assert!(h3.shock_coefficient() > h1.shock_coefficient());
    }

    #[test]
    fn reproducible_for_a_seed() {
        let a = estimate_local_projections(&changes(), ROLES, &config()).unwrap();
        let b = estimate_local_projections(&changes(), ROLES, &config()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn both_schemes_give_positive_variance() {
        for scheme in [BootstrapScheme::Pairs, BootstrapScheme::Residual] {
            let cfg = LpConfig { bootstrap: scheme, max_horizon: 2, ..config() };
            let model = estimate_local_projections(&changes(), ROLES, &cfg).unwrap();
            let h = model.horizon(2).unwrap();
            assert!(h.shock_coefficient_variance() > 0.0);
            assert_eq!(h.shock_draws.len(), 200);
        }
    }

    #[test]
    fn singular_horizon_is_isolated() {
        let panel = changes();
        let mut designs: Vec<HorizonDesign> = (1..=4)
            .map(|h| build_design(&panel, ROLES, 2, h).unwrap())
            .collect();
        designs[2].x.column_mut(SHOCK_COLUMN).fill(0.0);

        let model = estimate_from_designs("f", "d", &designs, &LpConfig { max_horizon: 4, ..config() }).unwrap();
        assert!(model.is_available(1) && model.is_available(2) && model.is_available(4));
        assert!(matches!(
            model.horizon(3),
            Err(ForecastError::HorizonUnavailable { horizon: 3, .. })
        ));
    }

    #[test]
    fn fixed_penalty_is_used_verbatim() {
        let cfg = LpConfig {
            penalty: PenaltyChoice::Fixed { lambda: 0.05 },
            max_horizon: 1,
            ..config()
        };
        let model = estimate_local_projections(&changes(), ROLES, &cfg).unwrap();
        assert_eq!(model.horizon(1).unwrap().penalty, 0.05);
    }

    #[test]
    fn rejects_bad_config() {
        let cfg = LpConfig { max_horizon: 13, ..config() };
        assert!(matches!(cfg.validate(), Err(ForecastError::UnsupportedValue { .. })));
        let cfg = LpConfig { penalty: PenaltyChoice::Fixed { lambda: -1.0 }, ..config() };
        assert!(cfg.validate().is_err());
    }
}
