//! Input/output helpers.
//!
//! - CSV ingest of panels and calendars (`ingest`)
//! - artifact JSON read/write (`artifact`)
//! - distribution exports (`export`)

pub mod artifact;
pub mod export;
pub mod ingest;

pub use artifact::*;
pub use export::*;
pub use ingest::*;
