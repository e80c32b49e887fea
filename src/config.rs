//! Analysis configuration
//!
//! One `AnalysisConfig` describes a benchmark configuration (framework,
//! client count, object count) plus the tunables of the analysis. Values
//! come from built-in defaults, an optional TOML file and CLI flags, in
//! increasing order of precedence.

use crate::error::{AnalysisError, Result};
use crate::interface::InterfaceRule;
use anyhow::Context;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound for every second-valued tunable (one day)
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Configuration for analyzing the trials of one benchmark configuration
///
/// # Example
/// ```
/// use trial_analyzer::config::AnalysisConfig;
///
/// let config = AnalysisConfig {
///     framework: "yjs".to_string(),
///     num_clients: 4,
///     num_objects: 100,
///     trials_to_keep: 3,
///     ..AnalysisConfig::default()
/// };
/// assert_eq!(config.bench_name(), "yjs_4_100");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Directory holding one subdirectory per trial
    pub data_dir: PathBuf,

    /// Framework identifier (e.g. "yjs", "automerge", "collabs")
    pub framework: String,

    /// Number of clients in every trial
    pub num_clients: usize,

    /// Number of shared objects in the benchmark
    pub num_objects: usize,

    /// Stop once this many trials have been accepted
    pub trials_to_keep: usize,

    /// Trial directories numbered `1..=max_trial_attempts` are tried
    pub max_trial_attempts: usize,

    /// File name prefix of the reference-role client logs, followed by the
    /// client index
    pub client_file_prefix: String,

    /// Length of the measured interval, from the trial start
    pub measurement_length_secs: u64,

    /// Extra time all clients must keep running past the measured interval
    pub buffer_secs: u64,

    /// How late a resource sample may be relative to its target instant
    pub sample_tolerance_secs: u64,

    /// Latency ceiling; also the value imputed for missing receives
    pub max_latency_ms: u64,

    /// Which network interface carries benchmark traffic
    pub interface_rule: InterfaceRule,

    /// Sample clients of one trial on scoped threads
    pub parallel_sampling: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("logs"),
            framework: String::new(),
            num_clients: 0,
            num_objects: 0,
            trials_to_keep: 1,
            max_trial_attempts: 10,
            client_file_prefix: "client-1-".to_string(),
            measurement_length_secs: 60,
            buffer_secs: 10,
            sample_tolerance_secs: 5,
            max_latency_ms: 10_000,
            interface_rule: InterfaceRule::default(),
            parallel_sampling: true,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a TOML file; missing keys take defaults
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.framework.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "framework must not be empty".to_string(),
            ));
        }
        if self.num_clients == 0 {
            return Err(AnalysisError::InvalidConfig(
                "num_clients must be >= 1".to_string(),
            ));
        }
        if self.trials_to_keep == 0 {
            return Err(AnalysisError::InvalidConfig(
                "trials_to_keep must be >= 1".to_string(),
            ));
        }
        if self.trials_to_keep > self.max_trial_attempts {
            return Err(AnalysisError::InvalidConfig(format!(
                "trials_to_keep ({}) exceeds max_trial_attempts ({})",
                self.trials_to_keep, self.max_trial_attempts
            )));
        }
        if self.measurement_length_secs == 0 {
            return Err(AnalysisError::InvalidConfig(
                "measurement_length_secs must be > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("measurement_length_secs", self.measurement_length_secs),
            ("buffer_secs", self.buffer_secs),
            ("sample_tolerance_secs", self.sample_tolerance_secs),
        ] {
            if value > MAX_INTERVAL_SECS {
                return Err(AnalysisError::InvalidConfig(format!(
                    "{} must be <= {} (got {})",
                    name, MAX_INTERVAL_SECS, value
                )));
            }
        }
        if self.max_latency_ms > MAX_INTERVAL_SECS * 1_000 {
            return Err(AnalysisError::InvalidConfig(format!(
                "max_latency_ms must be <= {} (got {})",
                MAX_INTERVAL_SECS * 1_000,
                self.max_latency_ms
            )));
        }
        if self.client_file_prefix.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "client_file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// `<framework>_<clients>_<objects>`, the stem of every trial directory
    pub fn bench_name(&self) -> String {
        format!("{}_{}_{}", self.framework, self.num_clients, self.num_objects)
    }

    /// Directory of trial number `trial` (numbered from 1)
    pub fn trial_dir(&self, trial: usize) -> PathBuf {
        self.data_dir.join(format!("{}_{}", self.bench_name(), trial))
    }

    pub fn measurement_length(&self) -> TimeDelta {
        secs(self.measurement_length_secs)
    }

    /// Shortest acceptable trial window
    pub fn minimum_window(&self) -> TimeDelta {
        secs(self.measurement_length_secs.saturating_add(self.buffer_secs))
    }

    pub fn sample_tolerance(&self) -> TimeDelta {
        secs(self.sample_tolerance_secs)
    }
}

/// Saturates at `TimeDelta::MAX` for values `validate` rejects
fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
