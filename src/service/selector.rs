//! Per-horizon model choice.
//!
//! | regime              | LP horizon available | model | substituted |
//! |---------------------|----------------------|-------|-------------|
//! | `Elevated`/`Stress` | any                  | BVAR  | no          |
//! | `Normal`            | yes                  | LP    | no          |
//! | `Normal`            | no                   | BVAR  | yes         |

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ModelChoice, Regime};
use crate::lp::LpModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonPlan {
    pub horizon: usize,
    pub model: ModelChoice,
    /// BVAR stands in for an unavailable LP horizon.
    pub substituted: bool,
}

pub fn select_model(regime: Regime, horizon: usize, lp: &LpModel) -> HorizonPlan {
    if regime.prefers_structural() {
        return HorizonPlan {
            horizon,
            model: ModelChoice::Bvar,
            substituted: false,
        };
    }
    match lp.horizon(horizon) {
        Ok(_) => HorizonPlan {
            horizon,
            model: ModelChoice::LocalProjections,
            substituted: false,
        },
        Err(err) => {
            warn!(horizon, %err, "local projection unavailable; substituting BVAR");
            HorizonPlan {
                horizon,
                model: ModelChoice::Bvar,
                substituted: true,
            }
        }
    }
}

pub fn select_models(regime: Regime, horizons: &[usize], lp: &LpModel) -> Vec<HorizonPlan> {
    horizons.iter().map(|&h| select_model(regime, h, lp)).collect()
}
