//! Trial analyzer - performance analysis for collaborative-editing benchmarks
//!
//! Turns a directory of independently clocked per-client logs into a
//! calibrated trial window, per-client CPU and network usage, and
//! end-to-end operation latencies with percentile statistics.
//!
//! Pipeline for one trial: [`window`] → [`sampler`] → [`latency`], driven
//! by [`trial`]; [`aggregate`] runs trials until enough are accepted and
//! [`report`] writes the summary.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod interface;
pub mod latency;
pub mod log_reader;
pub mod report;
pub mod sampler;
pub mod stats;
pub mod trial;
pub mod window;

pub use error::{AnalysisError, Result};
