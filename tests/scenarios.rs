//! End-to-end scenarios: train on a seeded synthetic panel, then serve requests.

use std::sync::OnceLock;

use approx::assert_abs_diff_eq;
use chrono::{Days, NaiveDate};
use nalgebra::DMatrix;

use rate_passthrough::app::pipeline::{train_bundle, TrainConfig};
use rate_passthrough::artifact::ArtifactBundle;
use rate_passthrough::bvar::{BvarDiagnostics, BvarModel};
use rate_passthrough::data::{synthetic_panel, SyntheticConfig};
use rate_passthrough::domain::{ExtendPolicy, MeetingCalendar, ModelChoice, PanelRoles};
use rate_passthrough::error::ForecastError;
use rate_passthrough::io::artifact::{read_artifact_json, write_artifact_json};
use rate_passthrough::io::export::write_distribution_rows;
use rate_passthrough::lp::{build_designs, estimate_from_designs, LpConfig, SHOCK_COLUMN};
use rate_passthrough::service::{forecast_with_bundle, ForecastConfig, PredictionRequest, PredictionResponse};

const FOREIGN: &str = "foreign_rate";
const DOMESTIC: &str = "domestic_rate";

fn train_config() -> TrainConfig {
    let mut config = TrainConfig::new(FOREIGN, DOMESTIC);
    config.lp = LpConfig {
        n_bootstrap: 200,
        seed: 3,
        ..LpConfig::default()
    };
    config.model_version = Some("scenario-v1".into());
    config
}

fn trained() -> &'static ArtifactBundle {
    static BUNDLE: OnceLock<ArtifactBundle> = OnceLock::new();
    BUNDLE.get_or_init(|| {
        let levels = synthetic_panel(&SyntheticConfig::default()).unwrap();
        train_bundle(&levels, &train_config()).unwrap()
    })
}

fn reference_date() -> NaiveDate {
    trained().metadata.sample_end
}

/// One meeting already past, then three upcoming ones.
fn calendar() -> MeetingCalendar {
    let r = reference_date();
    MeetingCalendar::new(vec![
        r.checked_sub_days(Days::new(20)).unwrap(),
        r.checked_add_days(Days::new(30)).unwrap(),
        r.checked_add_days(Days::new(75)).unwrap(),
        r.checked_add_days(Days::new(120)).unwrap(),
    ])
}

fn config() -> ForecastConfig {
    ForecastConfig {
        draws: 600,
        ..ForecastConfig::new(ExtendPolicy::Zero)
    }
}

fn request(move_bps: i64, horizons: Vec<usize>) -> PredictionRequest {
    PredictionRequest {
        seed: Some(17),
        ..PredictionRequest::new(reference_date(), move_bps, horizons)
    }
}

fn assert_well_formed(response: &PredictionResponse) {
    for o in &response.horizons {
        assert_abs_diff_eq!(o.distribution.total(), 1.0, epsilon = 1e-9);
        assert!(o.distribution.buckets.keys().all(|k| k % 25 == 0));
        assert!(o.ci95.contains(&o.ci80), "horizon {}: ci80 not inside ci95", o.horizon);
        assert!(o.forecast.lower_ci <= o.forecast.mean && o.forecast.mean <= o.forecast.upper_ci);
    }
}

#[test]
fn trained_bvar_is_stable() {
    let bvar = &trained().bvar;
    assert!(bvar.is_stable());
    assert!(bvar.eigenvalues().iter().all(|e| e.modulus() < 1.0));
    assert_eq!(bvar.identification().ordering[0], 0);
}

#[test]
fn hike_of_25_bps_over_three_meetings() {
    let response = forecast_with_bundle(trained(), &request(25, vec![1, 3, 6]), &calendar(), &config()).unwrap();
    assert_well_formed(&response);

    let h1 = response.outcome(1).unwrap();
    assert_eq!(h1.model, ModelChoice::LocalProjections);
    assert!(h1.forecast.mean > 0.0);
    assert!(response.expected_move_bps > 0.0);

    let table = &response.meeting_table;
    assert_eq!(table.horizon, 1);
    assert_eq!(table.meetings.len(), 3);
    assert!(table.meetings.iter().all(|m| m.date > reference_date()));
    assert!(table.meetings[0].move_probability > table.meetings[1].move_probability);
    assert!(table.meetings[1].move_probability > table.meetings[2].move_probability);
    assert_abs_diff_eq!(table.allocated(), h1.move_probability, epsilon = 1e-9);
    assert!(response.metadata.substituted_horizons.is_empty());
    assert_eq!(response.metadata.model_version, "scenario-v1");
}

#[test]
fn no_move_centres_on_zero() {
    let response = forecast_with_bundle(trained(), &request(0, vec![1, 3]), &calendar(), &config()).unwrap();
    assert_well_formed(&response);
    for o in &response.horizons {
        assert_eq!(o.distribution.mode(), Some(0));
    }
    assert_abs_diff_eq!(response.expected_move_bps, 0.0, epsilon = 1e-6);

    let stressed = PredictionRequest {
        regime_hint: Some("stress".into()),
        ..request(0, vec![1])
    };
    let response = forecast_with_bundle(trained(), &stressed, &calendar(), &config()).unwrap();
    let h1 = response.outcome(1).unwrap();
    assert_eq!(h1.model, ModelChoice::Bvar);
    assert_eq!(h1.distribution.mode(), Some(0));
}

#[test]
fn unstable_model_refuses_twelve_steps() {
    let base = trained();
    let explosive = BvarModel::from_parts(
        base.bvar.variables().to_vec(),
        1,
        DMatrix::from_row_slice(2, 3, &[0.0, 1.05, 0.0, 0.0, 0.4, 0.5]),
        base.bvar.sigma().clone(),
        DMatrix::zeros(1, 2),
        vec![0, 1],
        BvarDiagnostics::default(),
    )
    .unwrap();
    assert!(!explosive.is_stable());
    let bundle = ArtifactBundle::new(base.metadata.clone(), explosive, base.lp.clone()).unwrap();

    let stressed = |horizons| PredictionRequest {
        regime_hint: Some("stress".into()),
        ..request(25, horizons)
    };
    match forecast_with_bundle(&bundle, &stressed(vec![12]), &calendar(), &config()) {
        Err(ForecastError::UnstableModel { max_modulus, horizon, .. }) => {
            assert!(max_modulus > 1.0);
            assert_eq!(horizon, 12);
        }
        other => panic!("expected UnstableModel, got {other:?}"),
    }
    assert!(forecast_with_bundle(&bundle, &stressed(vec![1, 3]), &calendar(), &config()).is_ok());
}

#[test]
fn singular_lp_horizon_seven_falls_back_to_bvar() {
    let base = trained();
    let levels = synthetic_panel(&SyntheticConfig::default()).unwrap();
    let changes = levels.first_differences().unwrap();
    let roles = PanelRoles::resolve(&changes, FOREIGN, DOMESTIC).unwrap();
    let lp_config = train_config().lp;

    let mut designs = build_designs(&changes, roles, lp_config.lags, lp_config.max_horizon).unwrap();
    designs[6].x.column_mut(SHOCK_COLUMN).fill(0.0);
    let lp = estimate_from_designs(FOREIGN, DOMESTIC, &designs, &lp_config).unwrap();
    assert_eq!(lp.unavailable_horizons(), vec![7]);

    let bundle = ArtifactBundle::new(base.metadata.clone(), base.bvar.clone(), lp).unwrap();
    let response = forecast_with_bundle(&bundle, &request(25, (1..=12).collect()), &calendar(), &config()).unwrap();
    assert_well_formed(&response);
    assert_eq!(response.horizons.len(), 12);

    let h7 = response.outcome(7).unwrap();
    assert_eq!(h7.model, ModelChoice::Bvar);
    assert!(h7.substituted);
    for h in (1..=12).filter(|h| *h != 7) {
        let o = response.outcome(h).unwrap();
        assert_eq!(o.model, ModelChoice::LocalProjections, "horizon {h}");
        assert!(!o.substituted, "horizon {h}");
        assert!(o.forecast.mean.is_finite() && o.forecast.std > 0.0, "horizon {h}");
    }
    assert_eq!(response.metadata.substituted_horizons, vec![7]);
}

#[test]
fn artifact_round_trips_through_json() {
    let bundle = trained();
    let path = std::env::temp_dir().join(format!("rp-scenario-{}.json", std::process::id()));
    write_artifact_json(&path, bundle).unwrap();
    let reloaded = read_artifact_json(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(&reloaded, bundle);

    let req = request(-25, vec![1, 6]);
    let a = forecast_with_bundle(bundle, &req, &calendar(), &config()).unwrap();
    let b = forecast_with_bundle(&reloaded, &req, &calendar(), &config()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn seeded_requests_are_idempotent() {
    let stressed = PredictionRequest {
        regime_hint: Some("elevated".into()),
        ..request(50, vec![1, 3, 6])
    };
    let a = forecast_with_bundle(trained(), &stressed, &calendar(), &config()).unwrap();
    let b = forecast_with_bundle(trained(), &stressed, &calendar(), &config()).unwrap();
    assert_eq!(a, b);

    let reseeded = PredictionRequest {
        seed: Some(18),
        ..stressed.clone()
    };
    let c = forecast_with_bundle(trained(), &reseeded, &calendar(), &config()).unwrap();
    assert_ne!(a.outcome(6).unwrap().forecast, c.outcome(6).unwrap().forecast);
}

#[test]
fn held_foreign_path_compounds_the_response() {
    let stressed = PredictionRequest {
        regime_hint: Some("stress".into()),
        ..request(25, vec![1, 6])
    };
    let held = ForecastConfig {
        draws: 600,
        ..ForecastConfig::new(ExtendPolicy::HoldLastValue)
    };
    let once = forecast_with_bundle(trained(), &stressed, &calendar(), &config()).unwrap();
    let repeated = forecast_with_bundle(trained(), &stressed, &calendar(), &held).unwrap();
    assert_well_formed(&repeated);

    // Both policies impose the same first month.
    assert_abs_diff_eq!(
        once.outcome(1).unwrap().forecast.mean,
        repeated.outcome(1).unwrap().forecast.mean,
        epsilon = 1e-9
    );
    // Holding repeats the 25 bp change every month, so six months accumulate more.
    let h6_once = once.outcome(6).unwrap().forecast.mean;
    let h6_held = repeated.outcome(6).unwrap().forecast.mean;
    assert!(h6_held > h6_once + 10.0, "held {h6_held} vs once {h6_once}");
}

#[test]
fn export_quotes_version_labels() {
    let base = trained();
    let mut metadata = base.metadata.clone();
    metadata.version = "v2,rc1".into();
    let bundle = ArtifactBundle::new(metadata, base.bvar.clone(), base.lp.clone()).unwrap();
    let response = forecast_with_bundle(&bundle, &request(25, vec![1, 3]), &calendar(), &config()).unwrap();

    let mut out = Vec::new();
    write_distribution_rows(&mut out, &response).unwrap();

    let mut reader = csv::Reader::from_reader(out.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.len(), 10);
    assert_eq!(&headers[0], "model_version");
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
    let expected: usize = response.horizons.iter().map(|o| o.distribution.buckets.len()).sum();
    assert_eq!(rows.len(), expected);
    for row in &rows {
        assert_eq!(row.len(), 10);
        assert_eq!(&row[0], "v2,rc1");
    }
    let total: f64 = rows
        .iter()
        .filter(|r| &r[1] == "1")
        .map(|r| r[9].parse::<f64>().unwrap())
        .sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
}
