//! Error taxonomy for trial analysis
//!
//! Every variant here is fatal for the whole run: it signals an
//! instrumentation or environment bug that invalidates the trial set.
//! Trial validity failures (too few clients, short trials) are not errors;
//! see [`crate::trial::SkipReason`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while analyzing benchmark logs
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed log line {path}:{line_number}: {reason}")]
    MalformedLine {
        path: PathBuf,
        line_number: usize,
        reason: String,
    },

    #[error("Wrong number of client files in {dir}: expected {expected}, found {found}")]
    ClientCountMismatch {
        dir: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("Unsure about network interface in {path}: {reason}")]
    InterfaceShape { path: PathBuf, reason: String },

    #[error("First {kind} sample in {path} is too late: {found} is more than {tolerance_secs}s after {target}")]
    StaleSample {
        path: PathBuf,
        kind: &'static str,
        target: String,
        found: String,
        tolerance_secs: u64,
    },

    #[error("No {kind} sample at or after {target} in {path}")]
    MissingSample {
        path: PathBuf,
        kind: &'static str,
        target: String,
    },

    #[error("CPU counters in {path} did not advance (total tick delta {total_delta})")]
    InvalidCpuCounters { path: PathBuf, total_delta: i128 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        AnalysisError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
