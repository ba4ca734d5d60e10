//! Prediction service: request validation, model selection and assembly of
//! the response.

pub mod engine;
pub mod request;
pub mod response;
pub mod selector;

pub use engine::{forecast_with_bundle, ForecastConfig, Forecaster, DEFAULT_DRAWS};
pub use request::{PredictionRequest, ValidatedRequest};
pub use response::{HorizonOutcome, PredictionResponse, ResponseMetadata};
pub use selector::{select_model, select_models, HorizonPlan};
