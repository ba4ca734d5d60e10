//! Read/write trained artifact JSON files.
//!
//! The JSON layout is simply the serde form of `ArtifactBundle`; reading
//! always re-validates the bundle before it can be served.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::artifact::ArtifactBundle;
use crate::error::{AppError, ForecastError};

pub fn write_artifact_json(path: &Path, bundle: &ArtifactBundle) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create artifact JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, bundle)
        .map_err(|e| AppError::new(2, format!("Failed to write artifact JSON: {e}")))?;
    info!(path = %path.display(), version = bundle.version(), "artifact written");
    Ok(())
}

pub fn read_artifact_json(path: &Path) -> Result<ArtifactBundle, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open artifact JSON '{}': {e}", path.display())))?;
    let bundle: ArtifactBundle = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        AppError::from(ForecastError::ModelUnavailable {
            version: path.display().to_string(),
            reason: format!("invalid artifact JSON: {e}"),
        })
    })?;
    let bundle = bundle.validate().map_err(|e| {
        AppError::from(ForecastError::ModelUnavailable {
            version: path.display().to_string(),
            reason: e.to_string(),
        })
    })?;
    info!(path = %path.display(), version = bundle.version(), "artifact loaded");
    Ok(bundle)
}
