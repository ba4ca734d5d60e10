//! Request → per-horizon forecasts → discretized, calendar-mapped response.

use std::sync::Arc;

use tracing::{debug, info};

use crate::artifact::{ArtifactBundle, ModelCache};
use crate::bvar::simulate::conditional_mean_path;
use crate::bvar::{simulate_conditional_seeded, ConditionalForecastSpec};
use crate::discretize::{allocate_to_meetings, discretize, AllocationConfig, DiscretizationConfig};
use crate::domain::{ExtendPolicy, ForecastDistribution, MeetingCalendar, ModelChoice, PanelRoles};
use crate::error::ForecastError;
use crate::service::request::{PredictionRequest, ValidatedRequest};
use crate::service::response::{HorizonOutcome, PredictionResponse, ResponseMetadata};
use crate::service::selector::{select_models, HorizonPlan};

pub const DEFAULT_DRAWS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// How the foreign move continues after the first month. Required.
    pub extend_policy: ExtendPolicy,
    /// Monte Carlo draws for BVAR horizons.
    pub draws: usize,
    pub discretization: DiscretizationConfig,
    pub allocation: AllocationConfig,
    pub cache_capacity: usize,
}

impl ForecastConfig {
    pub fn new(extend_policy: ExtendPolicy) -> Self {
        Self {
            extend_policy,
            draws: DEFAULT_DRAWS,
            discretization: DiscretizationConfig::default(),
            allocation: AllocationConfig::default(),
            cache_capacity: crate::artifact::cache::DEFAULT_CAPACITY,
        }
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.draws < 2 {
            return Err(ForecastError::unsupported("draws", self.draws, "need at least 2 draws"));
        }
        self.discretization.validate()?;
        self.allocation.validate()
    }
}

/// Cache of trained artifacts plus the configuration requests run under.
pub struct Forecaster {
    cache: ModelCache,
    config: ForecastConfig,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Result<Self, ForecastError> {
        config.validate()?;
        Ok(Self {
            cache: ModelCache::new(config.cache_capacity)?,
            config,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Make a bundle servable. The first one loaded is the default version.
    pub fn load(&self, bundle: ArtifactBundle) -> Arc<ArtifactBundle> {
        self.cache.insert(bundle)
    }

    pub fn predict(
        &self,
        request: &PredictionRequest,
        calendar: &MeetingCalendar,
    ) -> Result<PredictionResponse, ForecastError> {
        let request = request.validate()?;
        let bundle = self.cache.get(request.model_version.as_deref())?;
        forecast_validated(&bundle, &request, calendar, &self.config)
    }
}

/// Serve a request from one bundle without going through a cache.
pub fn forecast_with_bundle(
    bundle: &ArtifactBundle,
    request: &PredictionRequest,
    calendar: &MeetingCalendar,
    config: &ForecastConfig,
) -> Result<PredictionResponse, ForecastError> {
    let request = request.validate()?;
    if let Some(version) = request.model_version.as_deref().filter(|v| *v != bundle.version()) {
        return Err(ForecastError::ModelUnavailable {
            version: version.to_string(),
            reason: format!("only '{}' is loaded", bundle.version()),
        });
    }
    forecast_validated(bundle, &request, calendar, config)
}

fn forecast_validated(
    bundle: &ArtifactBundle,
    request: &ValidatedRequest,
    calendar: &MeetingCalendar,
    config: &ForecastConfig,
) -> Result<PredictionResponse, ForecastError> {
    config.validate()?;
    let roles = bundle.roles()?;
    let plans = select_models(request.regime, &request.horizons, &bundle.lp);

    let bvar_paths = match plans.iter().filter(|p| p.model == ModelChoice::Bvar).map(|p| p.horizon).max() {
        Some(horizon) => Some(bvar_forecasts(bundle, roles, request, horizon, config)?),
        None => None,
    };

    let mut outcomes = Vec::with_capacity(plans.len());
    for plan in &plans {
        let (forecast, degraded) = match (plan.model, &bvar_paths) {
            (ModelChoice::Bvar, Some(paths)) => {
                let forecast = paths.cumulative[plan.horizon - 1];
                (forecast, paths.degraded || forecast.std_reconciled)
            }
            _ => {
                let forecast = bundle.lp.horizon(plan.horizon)?.forecast(request.shock_bps)?;
                (forecast, forecast.std_reconciled)
            }
        };
        outcomes.push(outcome(plan, forecast, degraded, &config.discretization)?);
    }

    let first = &outcomes[0];
    let meeting_table = allocate_to_meetings(
        &first.distribution,
        first.horizon,
        request.reference_date,
        calendar,
        &config.allocation,
    )?;
    let expected_move_bps = first.distribution.expected_value();

    let substituted_horizons: Vec<usize> = plans.iter().filter(|p| p.substituted).map(|p| p.horizon).collect();
    let degraded = bundle.degraded() || outcomes.iter().any(|o| o.degraded);
    info!(
        version = bundle.version(),
        move_bps = request.foreign_move_bps,
        shock_bps = request.shock_bps,
        regime = ?request.regime,
        horizons = ?request.horizons,
        substituted = ?substituted_horizons,
        degraded,
        "prediction served"
    );

    Ok(PredictionResponse {
        expected_move_bps,
        horizons: outcomes,
        meeting_table,
        metadata: ResponseMetadata {
            model_version: bundle.version().to_string(),
            training_fingerprint: bundle.metadata.training_fingerprint.clone(),
            methodology: methodology(&plans),
            degraded,
            substituted_horizons,
        },
    })
}

struct BvarPaths {
    /// Cumulative domestic response, index `h-1`.
    cumulative: Vec<ForecastDistribution>,
    degraded: bool,
}

/// Domestic cumulative response to the shock, measured against the
/// no-move path so that BVAR and LP forecasts answer the same question.
fn bvar_forecasts(
    bundle: &ArtifactBundle,
    roles: PanelRoles,
    request: &ValidatedRequest,
    horizon: usize,
    config: &ForecastConfig,
) -> Result<BvarPaths, ForecastError> {
    let spec = ConditionalForecastSpec {
        driving: roles.foreign,
        path: vec![request.shock_bps],
        horizon,
        extend_policy: config.extend_policy,
        draws: config.draws,
    };
    let simulated = simulate_conditional_seeded(&bundle.bvar, &spec, request.seed)?;
    let baseline = conditional_mean_path(
        &bundle.bvar,
        &ConditionalForecastSpec {
            path: vec![0.0],
            ..spec.clone()
        },
    )?;

    let domestic = simulated
        .variable(roles.domestic)
        .ok_or_else(|| ForecastError::dimension("simulated variables", roles.domestic + 1, simulated.variables.len()))?;

    let mut offset = 0.0;
    let mut cumulative = Vec::with_capacity(horizon);
    for (k, f) in domestic.cumulative.iter().enumerate() {
        offset += baseline[(k, roles.domestic)];
        let mut shifted = ForecastDistribution::new(f.mean - offset, f.std, f.lower_ci - offset, f.upper_ci - offset)?;
        shifted.std_reconciled |= f.std_reconciled;
        cumulative.push(shifted);
    }
    debug!(horizon, draws = spec.draws, "BVAR conditional forecasts ready");
    Ok(BvarPaths {
        cumulative,
        degraded: simulated.degraded,
    })
}

fn outcome(
    plan: &HorizonPlan,
    forecast: ForecastDistribution,
    degraded: bool,
    config: &DiscretizationConfig,
) -> Result<HorizonOutcome, ForecastError> {
    let distribution = discretize(&forecast, config)?;
    Ok(HorizonOutcome {
        horizon: plan.horizon,
        model: plan.model,
        substituted: plan.substituted,
        forecast,
        ci80: forecast.ci80(),
        ci95: forecast.ci95(),
        move_probability: distribution.move_probability(),
        distribution,
        degraded,
    })
}

fn methodology(plans: &[HorizonPlan]) -> String {
    let lp = plans.iter().any(|p| p.model == ModelChoice::LocalProjections);
    let bvar = plans.iter().any(|p| p.model == ModelChoice::Bvar);
    let substituted = plans.iter().any(|p| p.substituted);
    match (lp, bvar) {
        (true, false) => "penalized local projections".to_string(),
        (false, true) if substituted => {
            "Minnesota BVAR conditional simulation (substituting for local projections)".to_string()
        }
        (false, true) => "Minnesota BVAR conditional simulation".to_string(),
        _ => "penalized local projections with Minnesota BVAR substitution".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactMetadata;
    use crate::bvar::model::tests::var1;
    use crate::bvar::BvarModel;
    use crate::lp::{BootstrapScheme, HorizonEstimate, LpHorizon, LpModel, PenaltyChoice};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn lp_horizon(h: usize, beta: f64) -> HorizonEstimate {
        HorizonEstimate::Available(LpHorizon {
            horizon: h,
            coefficients: vec![0.0, beta, 0.0, 0.0],
            penalty: 0.0,
            effective_dof: 4.0,
            residual_std: 4.0,
            n_obs: 120,
            shock_draws: vec![beta - 0.02, beta, beta + 0.02],
        })
    }

    fn bundle(bvar: BvarModel, missing: &[usize]) -> ArtifactBundle {
        let horizons = (1..=6)
            .map(|h| {
                if missing.contains(&h) {
                    HorizonEstimate::Unavailable { horizon: h, reason: "singular design".into() }
                } else {
                    lp_horizon(h, 0.4 + 0.05 * h as f64)
                }
            })
            .collect();
        let lp = LpModel {
            foreign: "foreign".into(),
            domestic: "domestic".into(),
            lags: 1,
            penalty: PenaltyChoice::Fixed { lambda: 0.0 },
            bootstrap: BootstrapScheme::Pairs,
            horizons,
        };
        let metadata = ArtifactMetadata {
            version: "test".into(),
            training_fingerprint: "fp".into(),
            trained_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            n_obs: 100,
            foreign: "foreign".into(),
            domestic: "domestic".into(),
            sample_start: d(1, 1),
            sample_end: d(1, 1),
        };
        ArtifactBundle::new(metadata, bvar, lp).unwrap()
    }

    fn stable() -> BvarModel {
        var1([0.5, 0.0, 0.3, 0.4], [16.0, 4.0, 4.0, 9.0])
    }

    fn calendar() -> MeetingCalendar {
        MeetingCalendar::new(vec![d(3, 19), d(5, 7), d(6, 18)])
    }

    fn config() -> ForecastConfig {
        ForecastConfig {
            draws: 400,
            ..ForecastConfig::new(ExtendPolicy::Zero)
        }
    }

    #[test]
    fn lp_horizons_forecast_beta_times_shock() {
        let b = bundle(stable(), &[]);
        let req = PredictionRequest::new(d(2, 1), 25, vec![1, 3]);
        let resp = forecast_with_bundle(&b, &req, &calendar(), &config()).unwrap();
        let h1 = resp.outcome(1).unwrap();
        assert_eq!(h1.model, ModelChoice::LocalProjections);
        assert!((h1.forecast.mean - 0.45 * 25.0).abs() < 1e-12);
        assert!(h1.ci95.contains(&h1.ci80));
        assert!((h1.distribution.total() - 1.0).abs() < 1e-9);
        assert_eq!(resp.meeting_table.horizon, 1);
        assert!((resp.meeting_table.allocated() - h1.move_probability).abs() < 1e-9);
        assert!(resp.metadata.substituted_horizons.is_empty());
        assert_eq!(resp.metadata.methodology, "penalized local projections");
    }

    #[test]
    fn missing_lp_horizon_is_substituted() {
        let b = bundle(stable(), &[3]);
        let req = PredictionRequest::new(d(2, 1), 25, vec![1, 3]);
        let resp = forecast_with_bundle(&b, &req, &calendar(), &config()).unwrap();
        let h3 = resp.outcome(3).unwrap();
        assert_eq!(h3.model, ModelChoice::Bvar);
        assert!(h3.substituted);
        assert_eq!(resp.metadata.substituted_horizons, vec![3]);
        assert!(h3.forecast.mean > 0.0);
    }

    #[test]
    fn bvar_response_is_relative_to_no_move() {
        let b = bundle(stable(), &[]);
        let mut req = PredictionRequest::new(d(2, 1), 0, vec![1, 2]);
        req.regime_hint = Some("stress".into());
        let resp = forecast_with_bundle(&b, &req, &calendar(), &config()).unwrap();
        for o in &resp.horizons {
            assert_eq!(o.model, ModelChoice::Bvar);
            assert!(o.forecast.mean.abs() < 1.0);
        }
    }

    #[test]
    fn unstable_model_fails_long_bvar_horizons() {
        let b = bundle(var1([1.1, 0.0, 0.3, 0.4], [16.0, 4.0, 4.0, 9.0]), &[]);
        let mut req = PredictionRequest::new(d(2, 1), 25, vec![6]);
        req.regime_hint = Some("elevated".into());
        let err = forecast_with_bundle(&b, &req, &calendar(), &config()).unwrap_err();
        assert!(matches!(err, ForecastError::UnstableModel { horizon: 6, .. }));
    }

    #[test]
    fn forecaster_serves_from_cache() {
        let forecaster = Forecaster::new(config()).unwrap();
        let req = PredictionRequest::new(d(2, 1), 25, vec![1]);
        assert!(matches!(
            forecaster.predict(&req, &calendar()),
            Err(ForecastError::ModelUnavailable { .. })
        ));
        forecaster.load(bundle(stable(), &[]));
        let resp = forecaster.predict(&req, &calendar()).unwrap();
        assert_eq!(resp.metadata.model_version, "test");

        let mut other = req.clone();
        other.model_version = Some("v9".into());
        assert!(matches!(
            forecaster.predict(&other, &calendar()),
            Err(ForecastError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn same_request_same_response() {
        let b = bundle(stable(), &[2]);
        let mut req = PredictionRequest::new(d(2, 1), -25, vec![1, 2]);
        req.seed = Some(11);
        let a = forecast_with_bundle(&b, &req, &calendar(), &config()).unwrap();
        let again = forecast_with_bundle(&b, &req, &calendar(), &config()).unwrap();
        assert_eq!(a, again);
    }

    #[test]
    fn config_rejects_too_few_draws() {
        let cfg = ForecastConfig {
            draws: 1,
            ..ForecastConfig::new(ExtendPolicy::HoldLastValue)
        };
        assert!(Forecaster::new(cfg).is_err());
    }
}
