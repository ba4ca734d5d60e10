//! Shared training and prediction workflow used by every subcommand.
//!
//! panel levels -> monthly changes -> prior scales -> BVAR + local projections
//! -> artifact bundle -> forecaster

use chrono::{Days, NaiveDate, Utc};
use tracing::info;

use crate::artifact::{ArtifactBundle, ArtifactMetadata};
use crate::bvar::{ar_residual_variances, estimate_bvar, ShrinkageHyperparameters, ShrinkagePrior};
use crate::domain::{MeetingCalendar, PanelRoles, TimeSeriesPanel};
use crate::error::{AppError, ForecastError};
use crate::io::ingest::{load_panel, RateUnit, RowError};
use crate::lp::{estimate_local_projections, LpConfig};
use crate::service::{ForecastConfig, Forecaster, PredictionRequest, PredictionResponse, ValidatedRequest};

/// Days between scheduled meetings in generated calendars.
const MEETING_SPACING_DAYS: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub foreign: String,
    pub domestic: String,
    /// BVAR lag order.
    pub lags: usize,
    pub shrinkage: ShrinkageHyperparameters,
    pub lp: LpConfig,
    /// Defaults to a label derived from the data fingerprint.
    pub model_version: Option<String>,
}

impl TrainConfig {
    pub fn new(foreign: impl Into<String>, domestic: impl Into<String>) -> Self {
        Self {
            foreign: foreign.into(),
            domestic: domestic.into(),
            lags: 2,
            shrinkage: ShrinkageHyperparameters::default(),
            lp: LpConfig::default(),
            model_version: None,
        }
    }
}

/// Outputs of `rp train`.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub bundle: ArtifactBundle,
    pub row_errors: Vec<RowError>,
}

/// Estimate both models from a level panel (bps) and package them.
pub fn train_bundle(levels: &TimeSeriesPanel, config: &TrainConfig) -> Result<ArtifactBundle, ForecastError> {
    let roles = PanelRoles::resolve(levels, &config.foreign, &config.domestic)?;
    let changes = levels.first_differences()?;
    let n = changes.n_vars();

    // Monthly changes are close to white noise, so the own-lag prior mean is 0.
    let variances = ar_residual_variances(&changes, config.lags)?;
    let prior = ShrinkagePrior::build(n, config.lags, config.shrinkage, &variances, &vec![0.0; n])?;
    let bvar = estimate_bvar(&changes, &prior, roles.causal_ordering(n))?;
    let lp = estimate_local_projections(&changes, roles, &config.lp)?;

    let fingerprint = levels.fingerprint();
    let version = config
        .model_version
        .clone()
        .unwrap_or_else(|| format!("rp-{}", fingerprint.get(..12).unwrap_or(&fingerprint)));
    let periods = levels.periods();
    let metadata = ArtifactMetadata {
        version,
        training_fingerprint: fingerprint,
        trained_at: Utc::now(),
        n_obs: levels.n_obs(),
        foreign: config.foreign.clone(),
        domestic: config.domestic.clone(),
        sample_start: periods[0],
        sample_end: periods[periods.len() - 1],
    };
    let bundle = ArtifactBundle::new(metadata, bvar, lp)?;
    info!(
        version = bundle.version(),
        stable = bundle.bvar.is_stable(),
        degraded = bundle.degraded(),
        "training finished"
    );
    Ok(bundle)
}

/// Load a panel CSV and train on it.
pub fn run_train(panel_path: &std::path::Path, unit: RateUnit, config: &TrainConfig) -> Result<TrainOutput, AppError> {
    let ingested = load_panel(panel_path, unit)?;
    let bundle = train_bundle(&ingested.panel, config)?;
    Ok(TrainOutput {
        bundle,
        row_errors: ingested.row_errors,
    })
}

/// Serve one request from a single bundle.
pub fn run_predict(
    bundle: ArtifactBundle,
    request: &PredictionRequest,
    calendar: &MeetingCalendar,
    config: ForecastConfig,
) -> Result<(ValidatedRequest, PredictionResponse), ForecastError> {
    let validated = request.validate()?;
    let forecaster = Forecaster::new(config)?;
    forecaster.load(bundle);
    let response = forecaster.predict(request, calendar)?;
    Ok((validated, response))
}

/// Evenly spaced meetings after `reference` (for demos without a calendar file).
pub fn spaced_calendar(reference: NaiveDate, count: usize) -> MeetingCalendar {
    let dates = (1..=count as u64)
        .filter_map(|i| reference.checked_add_days(Days::new(i * MEETING_SPACING_DAYS)))
        .collect();
    MeetingCalendar::new(dates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaced_calendar_starts_after_reference() {
        let reference = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let cal = spaced_calendar(reference, 8);
        assert_eq!(cal.dates().len(), 8);
        assert_eq!(cal.next_after(reference), Some(NaiveDate::from_ymd_opt(2025, 2, 12).unwrap()));
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let levels = crate::data::synthetic::synthetic_panel(&Default::default()).unwrap();
        let config = TrainConfig::new("nope", "domestic_rate");
        assert!(matches!(train_bundle(&levels, &config), Err(ForecastError::Validation(_))));
    }
}
