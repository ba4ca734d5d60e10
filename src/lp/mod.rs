//! Penalized local projections.
//!
//! - `design`: per-horizon regression designs
//! - `penalty`: ridge penalty selection by BIC
//! - `estimator`: per-horizon fits and bootstrap bands
//! - `model`: fitted horizons and forecasts

pub mod design;
pub mod estimator;
pub mod model;
pub mod penalty;

pub use design::{build_design, build_designs, HorizonDesign, SHOCK_COLUMN};
pub use estimator::{
    estimate_from_designs, estimate_local_projections, BootstrapScheme, LpConfig, PenaltyChoice, MAX_HORIZON,
};
pub use model::{HorizonEstimate, LpHorizon, LpModel};
pub use penalty::PenaltyGrid;
