//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - configuration enums (`ExtendPolicy`, `Regime`, `ModelChoice`, `MoveDirection`)
//! - the input panel (`TimeSeriesPanel`, `PanelRoles`)
//! - the continuous forecast hand-off (`ForecastDistribution`, `Interval`)
//! - the meeting calendar (`MeetingCalendar`)

pub mod calendar;
pub mod forecast;
pub mod panel;
pub mod types;

pub use calendar::*;
pub use forecast::*;
pub use panel::*;
pub use types::*;
