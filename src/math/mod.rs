//! Numeric utilities: least squares/ridge, symmetric linear algebra, normal
//! distribution helpers, sample statistics, grids and seed derivation.

pub mod grid;
pub mod linalg;
pub mod normal;
pub mod ols;
pub mod seed;
pub mod stats;

pub use grid::*;
pub use normal::*;
pub use ols::*;
pub use seed::SeedHasher;
