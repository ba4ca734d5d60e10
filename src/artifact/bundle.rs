//! Versioned, self-contained trained artifact.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::bvar::BvarModel;
use crate::domain::PanelRoles;
use crate::error::ForecastError;
use crate::lp::LpModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub version: String,
    /// SHA-256 of the training panel.
    pub training_fingerprint: String,
    pub trained_at: DateTime<Utc>,
    /// Observations in the level panel used for training.
    pub n_obs: usize,
    pub foreign: String,
    pub domestic: String,
    pub sample_start: NaiveDate,
    pub sample_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub metadata: ArtifactMetadata,
    pub bvar: BvarModel,
    pub lp: LpModel,
}

impl ArtifactBundle {
    pub fn new(metadata: ArtifactMetadata, bvar: BvarModel, lp: LpModel) -> Result<Self, ForecastError> {
        Self { metadata, bvar, lp }.validate()
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Re-derive and cross-check everything (used after deserialization).
    pub fn validate(self) -> Result<Self, ForecastError> {
        let Self { metadata, bvar, lp } = self;
        if metadata.version.trim().is_empty() {
            return Err(ForecastError::Validation("artifact version is empty".into()));
        }
        let bvar = bvar.validate()?;
        let lp = lp.validate()?;

        if lp.foreign != metadata.foreign || lp.domestic != metadata.domestic {
            return Err(ForecastError::Validation(format!(
                "local projections were fitted for {}→{}, metadata says {}→{}",
                lp.foreign, lp.domestic, metadata.foreign, metadata.domestic
            )));
        }
        let bundle = Self { metadata, bvar, lp };
        let roles = bundle.roles()?;
        if bundle.bvar.identification().ordering[0] != roles.foreign {
            return Err(ForecastError::Validation(format!(
                "BVAR identification must order '{}' first",
                bundle.metadata.foreign
            )));
        }
        Ok(bundle)
    }

    /// Indices of the foreign and domestic variables in the BVAR.
    pub fn roles(&self) -> Result<PanelRoles, ForecastError> {
        let find = |name: &str| {
            self.bvar
                .variables()
                .iter()
                .position(|v| v == name)
                .ok_or_else(|| ForecastError::Validation(format!("variable '{name}' missing from the BVAR")))
        };
        Ok(PanelRoles {
            foreign: find(&self.metadata.foreign)?,
            domestic: find(&self.metadata.domestic)?,
        })
    }

    /// True when the BVAR needed any numerical recovery during training.
    pub fn degraded(&self) -> bool {
        self.bvar.diagnostics().degraded()
    }
}
