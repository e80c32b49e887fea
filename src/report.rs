//! Summary record output
//!
//! The summary of one benchmark configuration is appended as a single JSON
//! line to the output file, so repeated runs over different configurations
//! accumulate into one newline-delimited JSON file.

use crate::error::{AnalysisError, Result};
use crate::stats::{LatencyPercentiles, Summary};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Final result for one (framework, client count, object count)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    #[serde(rename = "lib")]
    pub framework: String,
    #[serde(rename = "numUsers")]
    pub num_clients: usize,
    pub num_objects: usize,
    /// Accepted trials
    pub trials: usize,
    /// Client measurements across accepted trials
    pub count: usize,
    /// CPU usage in percent
    pub cpu_usage: Summary,
    /// Network usage in bytes per second
    pub net_usage: Summary,
    /// Latency samples, imputed ones included
    pub latency_count: usize,
    #[serde(flatten)]
    pub latency: LatencyPercentiles,
    /// Percentage of latency samples that were imputed
    pub lat_unaccounted: Option<f64>,
}

/// Write `summary` as one JSON line
pub fn write_jsonl<W: Write>(mut writer: W, summary: &SummaryResult) -> io::Result<()> {
    serde_json::to_writer(&mut writer, summary)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Append `summary` to `path`, creating the file if needed
pub fn append_jsonl(path: &Path, summary: &SummaryResult) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AnalysisError::io(path, e))?;
    write_jsonl(file, summary).map_err(|e| AnalysisError::io(path, e))
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

/// Human-readable rendering of `summary`
pub fn render_summary(summary: &SummaryResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "RESULTS: {} ({} clients, {} objects)",
        summary.framework, summary.num_clients, summary.num_objects
    );
    let _ = writeln!(
        out,
        "trials: {}  client samples: {}  latency samples: {}",
        summary.trials, summary.count, summary.latency_count
    );
    let _ = writeln!(out, "               mean      stddev         min         max");
    for (label, s) in [("cpu (%)", &summary.cpu_usage), ("net (B/s)", &summary.net_usage)] {
        let _ = writeln!(
            out,
            "{:<10} {:>11} {:>11} {:>11} {:>11}",
            label,
            fmt_opt(s.mean),
            fmt_opt(s.std_dev),
            fmt_opt(s.min),
            fmt_opt(s.max)
        );
    }
    let _ = writeln!(out, "latency (ms):");
    for (p, value) in summary.latency.entries() {
        let value = value.map_or_else(|| "-".to_string(), |v| v.to_string());
        let _ = writeln!(out, "  p{:<4} {:>8}", p, value);
    }
    let _ = writeln!(
        out,
        "unaccounted: {}%",
        fmt_opt(summary.lat_unaccounted)
    );
    out
}

/// Print the summary to stderr
pub fn print_summary(summary: &SummaryResult) {
    eprint!("{}", render_summary(summary));
}
