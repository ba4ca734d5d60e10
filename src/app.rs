//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real main that:
//! - loads `.env` and installs the tracing subscriber
//! - parses CLI arguments into config structs
//! - trains, loads and serves artifacts
//! - prints reports and writes optional exports

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::bvar::impulse_response;
use crate::cli::{Command, DemoArgs, EstimationArgs, ForecastArgs, IrfArgs, PredictArgs, TrainArgs};
use crate::data::synthetic::{synthetic_panel, SyntheticConfig};
use crate::discretize::AllocationConfig;
use crate::domain::MeetingCalendar;
use crate::error::AppError;
use crate::lp::{LpConfig, PenaltyChoice, PenaltyGrid};
use crate::service::{ForecastConfig, PredictionRequest, PredictionResponse, ValidatedRequest};

pub mod pipeline;

use pipeline::TrainConfig;

/// Entry point for the `rp` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine; it only exists to carry RUST_LOG.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Train(args) => handle_train(args),
        Command::Predict(args) => handle_predict(args),
        Command::Irf(args) => handle_irf(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Logs go to stderr so reports and JSON on stdout stay clean.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = train_config_from_args(&args.foreign, &args.domestic, &args.estimation);
    let output = pipeline::run_train(&args.panel, args.units, &config)?;
    crate::io::artifact::write_artifact_json(&args.out, &output.bundle)?;

    println!(
        "{}",
        crate::report::format_training_summary(&output.bundle, &output.row_errors)
    );
    println!("Artifact written to {}", args.out.display());
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let bundle = crate::io::artifact::read_artifact_json(&args.artifact)?;
    let calendar = match &args.calendar {
        Some(path) => crate::io::ingest::load_calendar(path)?.calendar,
        None => {
            tracing::warn!("no meeting calendar given; the meeting table will be empty");
            MeetingCalendar::default()
        }
    };

    let mut request = request_from_args(args.date, &args.forecast);
    request.model_version = args.model_version.clone();
    let config = forecast_config_from_args(&args.forecast);
    let (validated, response) = pipeline::run_predict(bundle, &request, &calendar, config)?;
    emit_response(&validated, &response, &args.forecast)
}

fn handle_irf(args: IrfArgs) -> Result<(), AppError> {
    let bundle = crate::io::artifact::read_artifact_json(&args.artifact)?;
    let ordering = bundle.bvar.identification().ordering.clone();
    let irf = impulse_response(&bundle.bvar, &ordering, args.horizons)?;
    println!("{}", crate::report::format_irf(&irf));
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let synthetic = SyntheticConfig {
        n_obs: args.n_obs,
        seed: args.data_seed,
        ..SyntheticConfig::default()
    };
    let levels = synthetic_panel(&synthetic)?;
    let config = train_config_from_args(&synthetic.foreign, &synthetic.domestic, &args.estimation);
    let bundle = pipeline::train_bundle(&levels, &config)?;
    if !args.forecast.json {
        println!("{}", crate::report::format_training_summary(&bundle, &[]));
    }

    let reference = bundle.metadata.sample_end;
    let calendar = pipeline::spaced_calendar(reference, args.forecast.max_meetings);
    let request = request_from_args(reference, &args.forecast);
    let forecast_config = forecast_config_from_args(&args.forecast);
    let (validated, response) = pipeline::run_predict(bundle, &request, &calendar, forecast_config)?;
    emit_response(&validated, &response, &args.forecast)
}

fn emit_response(
    request: &ValidatedRequest,
    response: &PredictionResponse,
    args: &ForecastArgs,
) -> Result<(), AppError> {
    if args.json {
        let json = serde_json::to_string_pretty(response)
            .map_err(|e| AppError::new(2, format!("Failed to serialize response: {e}")))?;
        println!("{json}");
    } else {
        println!("{}", crate::report::format_prediction(response, request));
    }
    if let Some(path) = &args.export {
        crate::io::export::write_distribution_csv(path, response)?;
    }
    Ok(())
}

pub fn train_config_from_args(foreign: &str, domestic: &str, args: &EstimationArgs) -> TrainConfig {
    let penalty = match args.lambda {
        Some(lambda) => PenaltyChoice::Fixed { lambda },
        None => PenaltyChoice::Bic(PenaltyGrid::default()),
    };
    TrainConfig {
        foreign: foreign.to_string(),
        domestic: domestic.to_string(),
        lags: args.lags,
        shrinkage: crate::bvar::ShrinkageHyperparameters {
            overall_tightness: args.overall_tightness,
            cross_equation_tightness: args.cross_tightness,
            lag_decay: args.lag_decay,
        },
        lp: LpConfig {
            max_horizon: args.max_horizon,
            lags: args.lp_lags,
            penalty,
            bootstrap: args.bootstrap,
            n_bootstrap: args.n_bootstrap,
            seed: args.train_seed,
        },
        model_version: args.model_version.clone(),
    }
}

pub fn forecast_config_from_args(args: &ForecastArgs) -> ForecastConfig {
    ForecastConfig {
        draws: args.draws,
        allocation: AllocationConfig {
            decay: args.decay,
            max_meetings: args.max_meetings,
        },
        ..ForecastConfig::new(args.extend_policy)
    }
}

pub fn request_from_args(reference_date: chrono::NaiveDate, args: &ForecastArgs) -> PredictionRequest {
    PredictionRequest {
        direction: args.direction,
        surprise_bps: args.surprise,
        regime_hint: args.regime.clone(),
        seed: args.seed,
        ..PredictionRequest::new(reference_date, args.move_bps, args.horizons.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::ExtendPolicy;

    fn demo_args(extra: &[&str]) -> DemoArgs {
        let argv = ["rp", "demo", "--move", "25", "--extend-policy", "zero"]
            .iter()
            .copied()
            .chain(extra.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Demo(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn fixed_lambda_overrides_bic() {
        let args = demo_args(&["--lambda", "0.5", "--lags", "3"]);
        let config = train_config_from_args("f", "d", &args.estimation);
        assert_eq!(config.lp.penalty, PenaltyChoice::Fixed { lambda: 0.5 });
        assert_eq!(config.lags, 3);

        let args = demo_args(&[]);
        let config = train_config_from_args("f", "d", &args.estimation);
        assert!(matches!(config.lp.penalty, PenaltyChoice::Bic(_)));
    }

    #[test]
    fn forecast_config_keeps_required_policy() {
        let args = demo_args(&["--draws", "300", "--max-meetings", "4"]);
        let config = forecast_config_from_args(&args.forecast);
        assert_eq!(config.extend_policy, ExtendPolicy::Zero);
        assert_eq!(config.draws, 300);
        assert_eq!(config.allocation.max_meetings, 4);
    }

    #[test]
    fn request_carries_optional_fields() {
        let args = demo_args(&["--surprise", "-10", "--regime", "stress", "--seed", "5"]);
        let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 29).unwrap();
        let request = request_from_args(date, &args.forecast);
        assert_eq!(request.surprise_bps, Some(-10.0));
        assert_eq!(request.regime_hint.as_deref(), Some("stress"));
        assert_eq!(request.seed, Some(5));
        assert_eq!(request.horizons, vec![1, 3, 6, 12]);
    }
}
