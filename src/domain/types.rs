//! Shared configuration enums.
//!
//! These are small, closed sets that show up both on the CLI (`ValueEnum`)
//! and inside stored artifacts/responses (`serde`).

use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// How an imposed driving-variable path continues past its last given value.
///
/// There is deliberately no `Default`: callers must pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExtendPolicy {
    /// Repeat the last imposed value.
    HoldLastValue,
    /// Impose zero after the given path.
    Zero,
}

/// Market regime hint carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    #[default]
    Normal,
    /// Elevated uncertainty short of outright stress.
    Elevated,
    Stress,
}

impl Regime {
    /// Whether the structural model should be preferred over local projections.
    pub fn prefers_structural(self) -> bool {
        match self {
            Regime::Normal => false,
            Regime::Elevated | Regime::Stress => true,
        }
    }

    /// Parse an optional free-form hint; absent means `Normal`.
    pub fn from_hint(hint: Option<&str>) -> Result<Self, ForecastError> {
        match hint {
            None => Ok(Regime::Normal),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for Regime {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "calm" | "baseline" => Ok(Regime::Normal),
            "elevated" | "volatile" | "uncertain" => Ok(Regime::Elevated),
            "stress" | "stressed" | "crisis" => Ok(Regime::Stress),
            _ => Err(ForecastError::unsupported(
                "regime_hint",
                s,
                "expected one of: normal, elevated, stress",
            )),
        }
    }
}

/// Which estimator produced a horizon's forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelChoice {
    LocalProjections,
    Bvar,
}

impl ModelChoice {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelChoice::LocalProjections => "LP",
            ModelChoice::Bvar => "BVAR",
        }
    }
}

/// Declared direction of the foreign move (a consistency check on its sign).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Hike,
    Cut,
    Hold,
}

impl MoveDirection {
    pub fn agrees_with(self, move_bps: i64) -> bool {
        match self {
            MoveDirection::Hike => move_bps > 0,
            MoveDirection::Cut => move_bps < 0,
            MoveDirection::Hold => move_bps == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regime_hints_parse_to_closed_set() {
        assert_eq!(Regime::from_hint(None).unwrap(), Regime::Normal);
        assert_eq!("Stress".parse::<Regime>().unwrap(), Regime::Stress);
        assert_eq!(" volatile ".parse::<Regime>().unwrap(), Regime::Elevated);
        assert!(matches!(
            "panic".parse::<Regime>(),
            Err(ForecastError::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn direction_checks_sign() {
        assert!(MoveDirection::Hike.agrees_with(25));
        assert!(!MoveDirection::Hike.agrees_with(-25));
        assert!(MoveDirection::Hold.agrees_with(0));
        assert!(MoveDirection::Cut.agrees_with(-50));
    }
}
