//! Time-series panel consumed (read-only) by the estimators.

use chrono::NaiveDate;
use nalgebra::DMatrix;
use sha2::{Digest, Sha256};

use crate::error::ForecastError;

/// Ordered monthly observations of two or more named variables.
///
/// Invariants (checked on construction):
/// - at least two variables, unique names
/// - one value row per period, all finite
/// - strictly increasing periods
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPanel {
    variables: Vec<String>,
    periods: Vec<NaiveDate>,
    /// `T × n`, row `t` is period `t`.
    values: DMatrix<f64>,
}

impl TimeSeriesPanel {
    pub fn new(
        variables: Vec<String>,
        periods: Vec<NaiveDate>,
        values: DMatrix<f64>,
    ) -> Result<Self, ForecastError> {
        if variables.len() < 2 {
            return Err(ForecastError::Validation(format!(
                "panel needs at least two variables, got {}",
                variables.len()
            )));
        }
        for (i, name) in variables.iter().enumerate() {
            if variables[..i].contains(name) {
                return Err(ForecastError::Validation(format!("duplicate variable '{name}'")));
            }
        }
        if values.ncols() != variables.len() {
            return Err(ForecastError::dimension(
                "panel width",
                variables.len(),
                values.ncols(),
            ));
        }
        if values.nrows() != periods.len() {
            return Err(ForecastError::dimension(
                "panel length",
                periods.len(),
                values.nrows(),
            ));
        }
        if let Some(w) = periods.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ForecastError::Validation(format!(
                "panel periods must be strictly increasing: {} is followed by {}",
                w[0], w[1]
            )));
        }
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            // Column-major storage.
            let (row, col) = (idx % values.nrows(), idx / values.nrows());
            return Err(ForecastError::Validation(format!(
                "non-finite value for '{}' at {}",
                variables[col], periods[row]
            )));
        }

        Ok(Self {
            variables,
            periods,
            values,
        })
    }

    /// Build from `(period, row)` pairs.
    pub fn from_rows(
        variables: Vec<String>,
        rows: Vec<(NaiveDate, Vec<f64>)>,
    ) -> Result<Self, ForecastError> {
        let n = variables.len();
        if let Some((date, row)) = rows.iter().find(|(_, r)| r.len() != n) {
            return Err(ForecastError::dimension(
                format!("panel row {date}"),
                n,
                row.len(),
            ));
        }
        let t = rows.len();
        let values = DMatrix::from_fn(t, n, |i, j| rows[i].1[j]);
        let periods = rows.into_iter().map(|(d, _)| d).collect();
        Self::new(variables, periods, values)
    }

    pub fn n_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn n_obs(&self) -> usize {
        self.periods.len()
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn value(&self, t: usize, var: usize) -> f64 {
        self.values[(t, var)]
    }

    pub fn column(&self, var: usize) -> Vec<f64> {
        self.values.column(var).iter().copied().collect()
    }

    pub fn index_of(&self, name: &str) -> Result<usize, ForecastError> {
        self.variables
            .iter()
            .position(|v| v == name)
            .ok_or_else(|| {
                ForecastError::Validation(format!(
                    "variable '{name}' not in panel (have: {})",
                    self.variables.join(", ")
                ))
            })
    }

    /// Period-over-period changes; the first period is dropped.
    pub fn first_differences(&self) -> Result<Self, ForecastError> {
        let t = self.n_obs();
        if t < 2 {
            return Err(ForecastError::Validation(format!(
                "need at least 2 observations to difference, got {t}"
            )));
        }
        let n = self.n_vars();
        let values = DMatrix::from_fn(t - 1, n, |i, j| self.values[(i + 1, j)] - self.values[(i, j)]);
        Self::new(self.variables.clone(), self.periods[1..].to_vec(), values)
    }

    /// SHA-256 over names, periods and exact value bits (hex).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.variables {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        for (t, period) in self.periods.iter().enumerate() {
            hasher.update(period.to_string().as_bytes());
            for j in 0..self.n_vars() {
                hasher.update(self.values[(t, j)].to_bits().to_le_bytes());
            }
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Indices of the foreign (driving) and domestic (target) variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelRoles {
    pub foreign: usize,
    pub domestic: usize,
}

impl PanelRoles {
    pub fn resolve(panel: &TimeSeriesPanel, foreign: &str, domestic: &str) -> Result<Self, ForecastError> {
        let roles = Self {
            foreign: panel.index_of(foreign)?,
            domestic: panel.index_of(domestic)?,
        };
        if roles.foreign == roles.domestic {
            return Err(ForecastError::Validation(
                "foreign and domestic variables must differ".into(),
            ));
        }
        Ok(roles)
    }

    /// Recursive ordering with the foreign rate first (contemporaneously
    /// exogenous) and the remaining variables in panel order.
    pub fn causal_ordering(&self, n_vars: usize) -> Vec<usize> {
        let mut ordering = vec![self.foreign];
        ordering.extend((0..n_vars).filter(|&j| j != self.foreign));
        ordering
    }
}
