//! Command-line parsing for the `rp` binary.
//!
//! Parsing and dispatch stay separate from the estimation code: `app`
//! converts these argument structs into plain config structs.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{ExtendPolicy, MoveDirection};
use crate::io::ingest::RateUnit;
use crate::lp::BootstrapScheme;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rp", version, about = "Foreign-to-domestic policy rate pass-through forecaster")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train a BVAR + local-projections artifact from a panel CSV.
    Train(TrainArgs),
    /// Forecast the domestic response to a foreign move with a stored artifact.
    Predict(PredictArgs),
    /// Print the structural impulse response of a stored artifact.
    Irf(IrfArgs),
    /// Train on a synthetic panel and run one prediction (no files needed).
    Demo(DemoArgs),
}

/// Estimation options shared by `train` and `demo`.
#[derive(Debug, Args, Clone)]
pub struct EstimationArgs {
    /// BVAR lag order.
    #[arg(long, default_value_t = 2)]
    pub lags: usize,

    /// Lags of both changes included in each local projection.
    #[arg(long, default_value_t = 2)]
    pub lp_lags: usize,

    /// Longest local-projection horizon to estimate (months, <= 12).
    #[arg(long, default_value_t = 12)]
    pub max_horizon: usize,

    /// Minnesota overall tightness.
    #[arg(long, default_value_t = 0.2)]
    pub overall_tightness: f64,

    /// Minnesota cross-equation tightness, in (0, 1].
    #[arg(long, default_value_t = 0.5)]
    pub cross_tightness: f64,

    /// Minnesota lag decay.
    #[arg(long, default_value_t = 1.0)]
    pub lag_decay: f64,

    /// Fixed ridge penalty for local projections (default: chosen by BIC).
    #[arg(long)]
    pub lambda: Option<f64>,

    /// Bootstrap scheme for local-projection bands.
    #[arg(long, value_enum, default_value_t = BootstrapScheme::Residual)]
    pub bootstrap: BootstrapScheme,

    /// Bootstrap resamples per horizon.
    #[arg(long, default_value_t = 500)]
    pub n_bootstrap: usize,

    /// Seed for the bootstrap.
    #[arg(long, default_value_t = 0)]
    pub train_seed: u64,

    /// Artifact version label (default: derived from the data fingerprint).
    #[arg(long)]
    pub model_version: Option<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct TrainArgs {
    /// Panel CSV: a `date` column plus one column per rate series.
    #[arg(long, value_name = "CSV")]
    pub panel: PathBuf,

    /// Units of the rate levels in the CSV.
    #[arg(long, value_enum, default_value_t = RateUnit::Percent)]
    pub units: RateUnit,

    /// Column holding the foreign (driving) rate.
    #[arg(long)]
    pub foreign: String,

    /// Column holding the domestic (forecast) rate.
    #[arg(long)]
    pub domestic: String,

    /// Where to write the artifact JSON.
    #[arg(long, short = 'o', value_name = "JSON")]
    pub out: PathBuf,

    #[command(flatten)]
    pub estimation: EstimationArgs,
}

/// Request and simulation options shared by `predict` and `demo`.
#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    /// Foreign move in bps (a multiple of 25).
    #[arg(long = "move", allow_hyphen_values = true)]
    pub move_bps: i64,

    /// Declared direction of the move (checked against its sign).
    #[arg(long, value_enum)]
    pub direction: Option<MoveDirection>,

    /// Unanticipated part of the move; used as the shock when given.
    #[arg(long, allow_hyphen_values = true)]
    pub surprise: Option<f64>,

    /// Horizons in months, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "1,3,6,12")]
    pub horizons: Vec<usize>,

    /// Regime hint (normal, elevated, stress).
    #[arg(long)]
    pub regime: Option<String>,

    /// How the imposed foreign path continues after the first month.
    #[arg(long, value_enum)]
    pub extend_policy: ExtendPolicy,

    /// Monte Carlo draws for BVAR horizons.
    #[arg(long, default_value_t = crate::service::DEFAULT_DRAWS)]
    pub draws: usize,

    /// Weight ratio between consecutive meetings.
    #[arg(long, default_value_t = crate::discretize::calendar::DEFAULT_DECAY)]
    pub decay: f64,

    /// Most meetings a horizon's move probability is spread over.
    #[arg(long, default_value_t = crate::discretize::calendar::DEFAULT_MAX_MEETINGS)]
    pub max_meetings: usize,

    /// Seed for the simulation (default: derived from the request).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the response as JSON instead of a report.
    #[arg(long)]
    pub json: bool,

    /// Export per-horizon bucket probabilities to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    /// Artifact JSON produced by `rp train`.
    #[arg(long, value_name = "JSON")]
    pub artifact: PathBuf,

    /// Meeting calendar CSV with a `date` column.
    #[arg(long, value_name = "CSV")]
    pub calendar: Option<PathBuf>,

    /// Reference date of the foreign decision (YYYY-MM-DD).
    #[arg(long)]
    pub date: NaiveDate,

    /// Version to serve (must match the artifact).
    #[arg(long)]
    pub model_version: Option<String>,

    #[command(flatten)]
    pub forecast: ForecastArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct IrfArgs {
    /// Artifact JSON produced by `rp train`.
    #[arg(long, value_name = "JSON")]
    pub artifact: PathBuf,

    /// Number of horizons to print.
    #[arg(long, default_value_t = 12)]
    pub horizons: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Monthly observations in the synthetic panel.
    #[arg(long, default_value_t = 240)]
    pub n_obs: usize,

    /// Seed for the synthetic panel.
    #[arg(long, default_value_t = 7)]
    pub data_seed: u64,

    #[command(flatten)]
    pub estimation: EstimationArgs,

    #[command(flatten)]
    pub forecast: ForecastArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn predict_requires_extend_policy() {
        let base = [
            "rp", "predict", "--artifact", "a.json", "--date", "2025-01-29", "--move", "-25",
        ];
        assert!(Cli::try_parse_from(base).is_err());

        let cli = Cli::try_parse_from(base.iter().copied().chain(["--extend-policy", "hold-last-value"])).unwrap();
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.forecast.move_bps, -25);
        assert_eq!(args.forecast.extend_policy, ExtendPolicy::HoldLastValue);
        assert_eq!(args.forecast.horizons, vec![1, 3, 6, 12]);
    }

    #[test]
    fn horizons_parse_as_list() {
        let cli = Cli::try_parse_from([
            "rp", "demo", "--move", "25", "--extend-policy", "zero", "--horizons", "1,2,7",
        ])
        .unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.forecast.horizons, vec![1, 2, 7]);
        assert_eq!(args.estimation.lags, 2);
    }
}
