//! Ridge penalty selection by BIC.
//!
//! For every candidate `λ` on a log-spaced grid we fit the ridge regression
//! with per-row penalty `λ·n` on every coefficient except the intercept and
//! score it with
//!
//! ```text
//! BIC(λ) = n · ln(SSE/n) + dof(λ) · ln(n)
//! ```
//!
//! where `dof(λ) = tr(X (X'X + P)⁻¹ X')` is the ridge effective degrees of
//! freedom. Among candidates within 2 BIC points of the minimum, the heaviest
//! penalty wins (the shrinkage analogue of "prefer the simpler model").

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::lp::design::HorizonDesign;
use crate::math::{log_space, solve_ridge, sum_squared_residuals, RidgeFit};

/// BIC points within which a heavier penalty is preferred.
pub const BIC_TOLERANCE: f64 = 2.0;

/// Floor on SSE/n inside the log.
const MIN_MSE: f64 = 1e-300;

/// Log-spaced grid of candidate penalties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyGrid {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

impl Default for PenaltyGrid {
    fn default() -> Self {
        Self {
            min: 1e-4,
            max: 10.0,
            steps: 25,
        }
    }
}

impl PenaltyGrid {
    pub fn values(&self) -> Result<Vec<f64>, ForecastError> {
        log_space(self.min, self.max, self.steps)
    }
}

/// One scored candidate.
#[derive(Debug, Clone)]
pub struct PenaltyCandidate {
    pub lambda: f64,
    pub bic: f64,
    pub fit: RidgeFit,
}

/// Diagonal penalty `[0, λn, ..., λn]`.
pub fn penalty_vector(design: &HorizonDesign, lambda: f64) -> DVector<f64> {
    let k = design.n_regressors();
    let scaled = lambda * design.n_rows() as f64;
    DVector::from_fn(k, |j, _| if j == 0 { 0.0 } else { scaled })
}

/// Fit the ridge regression at a given `λ`.
pub fn fit_at(design: &HorizonDesign, lambda: f64) -> Option<RidgeFit> {
    solve_ridge(&design.x, &design.y, &penalty_vector(design, lambda))
}

/// BIC of a fitted candidate.
pub fn bic(design: &HorizonDesign, fit: &RidgeFit) -> f64 {
    let n = design.n_rows() as f64;
    let sse = sum_squared_residuals(&design.x, &design.y, &fit.beta);
    n * (sse / n).max(MIN_MSE).ln() + fit.effective_dof * n.ln()
}

/// Score every grid value (failed fits are skipped).
pub fn score_grid(design: &HorizonDesign, grid: &[f64]) -> Vec<PenaltyCandidate> {
    grid.iter()
        .filter_map(|&lambda| {
            let fit = fit_at(design, lambda)?;
            let bic = bic(design, &fit);
            bic.is_finite().then_some(PenaltyCandidate { lambda, bic, fit })
        })
        .collect()
}

/// Pick the heaviest penalty within [`BIC_TOLERANCE`] of the best BIC.
pub fn select_by_bic(candidates: &[PenaltyCandidate]) -> Option<&PenaltyCandidate> {
    let best = candidates
        .iter()
        .min_by(|a, b| a.bic.total_cmp(&b.bic))?
        .bic;

    candidates
        .iter()
        .filter(|c| c.bic <= best + BIC_TOLERANCE)
        .max_by(|a, b| a.lambda.total_cmp(&b.lambda))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noisy_design(noise: f64) -> HorizonDesign {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 120;
        let x = DMatrix::from_fn(n, 4, |_, c| if c == 0 { 1.0 } else { rng.gen_range(-1.0..1.0) });
        let y = DVector::from_fn(n, |r, _| 0.5 + 2.0 * x[(r, 1)] + noise * rng.gen_range(-1.0..1.0));
        HorizonDesign { horizon: 1, x, y }
    }

    #[test]
    fn intercept_is_never_penalized() {
        let d = noisy_design(0.1);
        let p = penalty_vector(&d, 0.5);
        assert_eq!(p[0], 0.0);
        assert!((p[1] - 60.0).abs() < 1e-12);
    }

    #[test]
    fn heavier_penalty_preferred_within_tolerance() {
        let d = noisy_design(0.1);
        let fit = fit_at(&d, 1e-3).unwrap();
        let candidates = vec![
            PenaltyCandidate { lambda: 1e-3, bic: 10.0, fit: fit.clone() },
            PenaltyCandidate { lambda: 1e-2, bic: 11.5, fit: fit.clone() },
            PenaltyCandidate { lambda: 1e-1, bic: 14.0, fit },
        ];
        assert_eq!(select_by_bic(&candidates).unwrap().lambda, 1e-2);
    }

    #[test]
    fn strong_signal_selects_light_penalty() {
        let d = noisy_design(0.05);
        let grid = PenaltyGrid::default().values().unwrap();
        let scored = score_grid(&d, &grid);
        assert_eq!(scored.len(), grid.len());
        let chosen = select_by_bic(&scored).unwrap();
        assert!(chosen.lambda < 0.1, "chose {}", chosen.lambda);
        assert!((chosen.fit.beta[1] - 2.0).abs() < 0.2);
    }

    #[test]
    fn dof_shrinks_with_penalty() {
        let d = noisy_design(0.5);
        let light = fit_at(&d, 1e-4).unwrap();
        let heavy = fit_at(&d, 10.0).unwrap();
        assert!(heavy.effective_dof < light.effective_dof);
        assert!(heavy.effective_dof >= 1.0 - 1e-9);
    }
}
