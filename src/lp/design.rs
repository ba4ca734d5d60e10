//! Local-projection regression designs.
//!
//! For horizon `h` and lag count `L`, every usable month `t` contributes one
//! row (all series are monthly changes):
//!
//! ```text
//! target    y_{t+h-1} - y_{t-1}  =  Δy_t + ... + Δy_{t+h-1}
//! regressors [1, Δx_t, Δy_{t-1}, ..., Δy_{t-L}, Δx_{t-1}, ..., Δx_{t-L}]
//! ```
//!
//! so the coefficient in [`SHOCK_COLUMN`] is the cumulative domestic response
//! through month `h` to a foreign move in month 1.

use nalgebra::{DMatrix, DVector};

use crate::domain::{PanelRoles, TimeSeriesPanel};
use crate::error::ForecastError;

/// Design column of the contemporaneous foreign change.
pub const SHOCK_COLUMN: usize = 1;

/// Relative singular value below which a design counts as singular.
pub const SINGULAR_VALUE_TOLERANCE: f64 = 1e-10;

/// Column norms below this count as identically zero.
const ZERO_COLUMN_NORM: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct HorizonDesign {
    pub horizon: usize,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
}

impl HorizonDesign {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_regressors(&self) -> usize {
        self.x.ncols()
    }

    /// Why this design cannot be estimated, if it cannot.
    pub fn singularity(&self) -> Option<String> {
        let (rows, k) = self.x.shape();
        if rows <= k {
            return Some(format!("{rows} rows for {k} regressors"));
        }
        for j in 0..k {
            let norm = self.x.column(j).norm();
            if !(norm > ZERO_COLUMN_NORM) {
                return Some(format!("regressor column {j} is identically zero"));
            }
        }
        let sv = self.x.clone().singular_values();
        let max = sv.max();
        let min = sv.min();
        if !(max > 0.0) || min / max < SINGULAR_VALUE_TOLERANCE {
            return Some(format!(
                "design is rank deficient (singular value ratio {:.3e})",
                if max > 0.0 { min / max } else { 0.0 }
            ));
        }
        None
    }
}

/// Number of regressors for `lags` control lags.
pub fn n_regressors(lags: usize) -> usize {
    2 + 2 * lags
}

/// Build the horizon-`horizon` design from a panel of changes.
pub fn build_design(
    changes: &TimeSeriesPanel,
    roles: PanelRoles,
    lags: usize,
    horizon: usize,
) -> Result<HorizonDesign, ForecastError> {
    if horizon == 0 {
        return Err(ForecastError::Validation("local projection horizon must be >= 1".into()));
    }
    let t_total = changes.n_obs();
    if t_total < lags + horizon {
        return Err(ForecastError::HorizonUnavailable {
            horizon,
            reason: format!("{t_total} observations cannot cover {lags} lags and {horizon} leads"),
        });
    }
    let rows = t_total - lags - horizon + 1;
    let k = n_regressors(lags);
    let dx = |t: usize| changes.value(t, roles.foreign);
    let dy = |t: usize| changes.value(t, roles.domestic);

    let mut x = DMatrix::zeros(rows, k);
    let mut y = DVector::zeros(rows);
    for r in 0..rows {
        let t = lags + r;
        x[(r, 0)] = 1.0;
        x[(r, SHOCK_COLUMN)] = dx(t);
        for l in 1..=lags {
            x[(r, 1 + l)] = dy(t - l);
            x[(r, 1 + lags + l)] = dx(t - l);
        }
        y[r] = (0..horizon).map(|k| dy(t + k)).sum();
    }

    Ok(HorizonDesign { horizon, x, y })
}

/// Designs for horizons `1..=max_horizon`.
pub fn build_designs(
    changes: &TimeSeriesPanel,
    roles: PanelRoles,
    lags: usize,
    max_horizon: usize,
) -> Result<Vec<HorizonDesign>, ForecastError> {
    (1..=max_horizon)
        .map(|h| build_design(changes, roles, lags, h))
        .collect()
}
