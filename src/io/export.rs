//! Export per-horizon discretized distributions to CSV.
//!
//! One row per `(horizon, bucket)`, easy to pivot in a spreadsheet.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::AppError;
use crate::service::PredictionResponse;

#[derive(Debug, Serialize)]
struct DistributionRow<'a> {
    model_version: &'a str,
    horizon: usize,
    model: &'a str,
    substituted: bool,
    mean_bps: f64,
    std_bps: f64,
    ci95_lower: f64,
    ci95_upper: f64,
    bucket_bps: i64,
    probability: f64,
}

pub fn write_distribution_csv(path: &Path, response: &PredictionResponse) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_distribution_rows(file, response)
}

pub fn write_distribution_rows<W: Write>(out: W, response: &PredictionResponse) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    for o in &response.horizons {
        for (bucket, p) in &o.distribution.buckets {
            writer
                .serialize(DistributionRow {
                    model_version: &response.metadata.model_version,
                    horizon: o.horizon,
                    model: o.model.display_name(),
                    substituted: o.substituted,
                    mean_bps: o.forecast.mean,
                    std_bps: o.forecast.std,
                    ci95_lower: o.ci95.lower,
                    ci95_upper: o.ci95.upper,
                    bucket_bps: *bucket,
                    probability: *p,
                })
                .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
        }
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}
