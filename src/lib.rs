//! `rate-passthrough` library crate.
//!
//! Forecasts how a domestic policy rate responds to a move in a foreign
//! reference rate: a Minnesota-prior BVAR and penalized local projections
//! produce continuous forecasts per horizon, which are discretized into
//! 25 bp buckets and spread over upcoming policy meetings.
//!
//! The binary (`rp`) is a thin wrapper around this library so the core logic
//! is testable without spawning processes.

pub mod app;
pub mod artifact;
pub mod bvar;
pub mod cli;
pub mod data;
pub mod discretize;
pub mod domain;
pub mod error;
pub mod io;
pub mod lp;
pub mod math;
pub mod report;
pub mod service;
