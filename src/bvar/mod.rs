//! Bayesian VAR: prior, estimation, identification and conditional forecasts.
//!
//! - `prior`: Minnesota shrinkage prior
//! - `estimator`: posterior-mean coefficients and residual covariance
//! - `companion`: companion form and stability
//! - `irf`: recursive identification and impulse responses
//! - `simulate`: Monte Carlo conditional forecasts

pub mod companion;
pub mod estimator;
pub mod irf;
pub mod model;
pub mod prior;
pub mod simulate;

pub use companion::Eigenvalue;
pub use estimator::estimate_bvar;
pub use irf::{impulse_response, ImpulseResponse};
pub use model::{BvarDiagnostics, BvarModel, Identification};
pub use prior::{ar_residual_variances, ShrinkageHyperparameters, ShrinkagePrior};
pub use simulate::{
    simulate_conditional, simulate_conditional_seeded, ConditionalForecast, ConditionalForecastSpec,
    VariableForecast,
};
