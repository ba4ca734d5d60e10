//! Trained artifacts and the in-memory version cache.

pub mod bundle;
pub mod cache;

pub use bundle::{ArtifactBundle, ArtifactMetadata};
pub use cache::ModelCache;
