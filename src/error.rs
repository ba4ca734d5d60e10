//! Error types.
//!
//! - `ForecastError` is the library taxonomy: every estimator, simulator and
//!   service function returns it, carrying the offending shapes/values.
//! - `AppError` is what the `rp` binary reports: a message plus a process exit code.

use thiserror::Error;

/// Errors raised by estimation, forecasting and request handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// Bad shrinkage configuration (non-positive scalar, bad scale).
    #[error("invalid shrinkage prior: {0}")]
    InvalidPrior(String),

    /// Panel/model/matrix shapes disagree.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// The model failed the stability check required by the operation.
    #[error(
        "model is unstable (max |eigenvalue| = {max_modulus:.6}); refusing a {horizon}-step conditional forecast (limit for unstable models: {limit})"
    )]
    UnstableModel {
        max_modulus: f64,
        horizon: usize,
        limit: usize,
    },

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Well-formed input carrying a value the engine does not support.
    #[error("unsupported {field} '{value}': {reason}")]
    UnsupportedValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Requested artifact version is not cached or failed to load.
    #[error("model version '{version}' is unavailable: {reason}")]
    ModelUnavailable { version: String, reason: String },

    /// A single local-projection horizon could not be estimated.
    #[error("horizon {horizon} is unavailable: {reason}")]
    HorizonUnavailable { horizon: usize, reason: String },
}

impl ForecastError {
    pub fn dimension(context: impl Into<String>, expected: impl ToString, actual: impl ToString) -> Self {
        ForecastError::DimensionMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn unsupported(field: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        ForecastError::UnsupportedValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit code used by the binary for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ForecastError::Validation(_) | ForecastError::UnsupportedValue { .. } => 2,
            ForecastError::InvalidPrior(_) | ForecastError::DimensionMismatch { .. } => 3,
            ForecastError::UnstableModel { .. } | ForecastError::HorizonUnavailable { .. } => 4,
            ForecastError::ModelUnavailable { .. } => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
