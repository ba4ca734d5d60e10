//! Terminal reports for training runs, predictions and impulse responses.

pub mod format;

pub use format::*;
