//! Analysis of a single trial directory
//!
//! A trial directory holds one log per client. Analysis runs in dependency
//! order: calibrate the window, sample every client's resources at the
//! start and end of the measured interval, then reconstruct latencies over
//! that interval.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::event::Timestamp;
use crate::latency;
use crate::log_reader::ClientLog;
use crate::sampler::{self, ClientStats};
use crate::window::{self, Calibration, TrialWindow};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Why a trial was left out of the aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    TooFewClients { valid: usize, expected: usize },
    TooShort { length_secs: f64, required_secs: f64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooFewClients { valid, expected } => {
                write!(f, "too few clients ({} of {} sent operations)", valid, expected)
            }
            SkipReason::TooShort {
                length_secs,
                required_secs,
            } => write!(
                f,
                "too short ({} sec, need {} sec)",
                length_secs, required_secs
            ),
        }
    }
}

/// Per-trial measurements handed to the aggregator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialResult {
    pub client_stats: Vec<ClientStats>,
    pub latencies_ms: Vec<u64>,
    pub unaccounted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Accepted(TrialResult),
    Skipped(SkipReason),
}

/// Pattern for reference-role client logs: every name starting with the
/// prefix, capturing the client index when one follows it
pub fn client_file_pattern(prefix: &str) -> Result<Regex> {
    Regex::new(&format!(r"^{}(\d*)", regex::escape(prefix)))
        .map_err(|e| AnalysisError::InvalidConfig(format!("client file prefix: {}", e)))
}

/// List the reference-role client logs in `dir`, ordered by client index.
///
/// Every file whose name starts with `prefix` counts; names without an
/// index sort last. Finding anything other than `expected` files is a
/// configuration error, and so is a missing directory.
pub fn discover_client_files(dir: &Path, prefix: &str, expected: usize) -> Result<Vec<ClientLog>> {
    let pattern = client_file_pattern(prefix)?;
    let mut found: Vec<(u64, String, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| AnalysisError::io(dir, e))? {
        let entry = entry.map_err(|e| AnalysisError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| AnalysisError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(captures) = pattern.captures(&name) else {
            continue;
        };
        let index = captures[1].parse().unwrap_or(u64::MAX);
        found.push((index, name, entry.path()));
    }

    if found.len() != expected {
        return Err(AnalysisError::ClientCountMismatch {
            dir: dir.to_path_buf(),
            expected,
            found: found.len(),
        });
    }

    found.sort();
    Ok(found
        .into_iter()
        .map(|(_, _, path)| ClientLog::new(path))
        .collect())
}

/// Sample every client at `start` and `end`, in client order
pub fn sample_clients(
    clients: &[ClientLog],
    start: Timestamp,
    end: Timestamp,
    config: &AnalysisConfig,
) -> Result<Vec<ClientStats>> {
    let tolerance = config.sample_tolerance();
    let rule = &config.interface_rule;

    if !config.parallel_sampling {
        return clients
            .iter()
            .map(|client| sampler::measure_client(client, start, end, tolerance, rule))
            .collect();
    }

    crossbeam::thread::scope(|s| {
        let handles: Vec<_> = clients
            .iter()
            .map(|client| {
                s.spawn(move |_| sampler::measure_client(client, start, end, tolerance, rule))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect::<Result<Vec<_>>>()
    })
    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// Analyze one trial directory.
///
/// Returns `Skipped` for trials that are incomplete but otherwise sound;
/// every `Err` is fatal for the run, including a missing trial directory.
pub fn analyze_trial(dir: &Path, config: &AnalysisConfig) -> Result<TrialOutcome> {
    let candidates = discover_client_files(dir, &config.client_file_prefix, config.num_clients)?;

    let (window, clients) =
        match window::calibrate(&candidates, config.num_clients, config.minimum_window())? {
            Calibration::Calibrated { window, clients } => (window, clients),
            Calibration::TooFewClients { valid, expected } => {
                return Ok(TrialOutcome::Skipped(SkipReason::TooFewClients {
                    valid,
                    expected,
                }))
            }
            Calibration::TooShort { window, required } => {
                return Ok(TrialOutcome::Skipped(SkipReason::TooShort {
                    length_secs: window.length_secs(),
                    required_secs: required.num_milliseconds() as f64 / 1000.0,
                }))
            }
        };

    let end = window
        .start
        .checked_add_signed(config.measurement_length())
        .ok_or_else(|| {
            AnalysisError::InvalidConfig(format!(
                "measurement length of {}s overflows {}",
                config.measurement_length_secs,
                window.start.to_rfc3339()
            ))
        })?;
    let measured = TrialWindow {
        start: window.start,
        end,
    };

    let client_stats = sample_clients(&clients, measured.start, measured.end, config)?;
    for (client, stats) in clients.iter().zip(&client_stats) {
        debug!(
            client = %client.name(),
            cpu_percent = stats.cpu_usage_percent,
            net_bytes = stats.net_bytes_total,
            net_interval_secs = stats.net_interval_seconds,
            "client resource usage"
        );
    }

    let latencies =
        latency::trial_latencies(&clients, measured, config.max_latency_ms, config.num_clients)?;

    Ok(TrialOutcome::Accepted(TrialResult {
        client_stats,
        latencies_ms: latencies.latencies_ms,
        unaccounted: latencies.unaccounted,
    }))
}
