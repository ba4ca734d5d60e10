//! Prediction responses.

use serde::{Deserialize, Serialize};

use crate::discretize::{DiscretizedDistribution, MeetingAllocation};
use crate::domain::{ForecastDistribution, Interval, ModelChoice};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonOutcome {
    pub horizon: usize,
    pub model: ModelChoice,
    pub substituted: bool,
    /// Cumulative domestic change through this horizon (bps).
    pub forecast: ForecastDistribution,
    pub ci80: Interval,
    pub ci95: Interval,
    pub distribution: DiscretizedDistribution,
    pub move_probability: f64,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model_version: String,
    pub training_fingerprint: String,
    pub methodology: String,
    pub degraded: bool,
    pub substituted_horizons: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Expected discretized move at the shortest requested horizon.
    pub expected_move_bps: f64,
    pub horizons: Vec<HorizonOutcome>,
    /// Meeting-by-meeting table for the shortest requested horizon.
    pub meeting_table: MeetingAllocation,
    pub metadata: ResponseMetadata,
}

impl PredictionResponse {
    pub fn outcome(&self, horizon: usize) -> Option<&HorizonOutcome> {
        self.horizons.iter().find(|o| o.horizon == horizon)
    }
}
