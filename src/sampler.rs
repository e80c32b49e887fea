//! Resource sampling
//!
//! Every client logs `CPU`, `MEMORY` and `NETWORK` snapshots about once per
//! second. To measure a client over an interval we take the first snapshot
//! of each kind at or after the interval's start and end, and difference
//! the cumulative counters.

use crate::error::{AnalysisError, Result};
use crate::event::{CpuCounters, RawEvent, SampleKind, Timestamp};
use crate::interface::InterfaceRule;
use crate::log_reader::ClientLog;
use chrono::TimeDelta;
use serde::Serialize;
use std::ops::ControlFlow;

/// Network counters of the measured interface at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetSnapshot {
    pub time: Timestamp,
    pub interface: String,
    pub input_bytes: u64,
    pub output_bytes: u64,
}

/// Resource counters of one client near one target instant
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    pub cpu_time: Timestamp,
    pub cpu: CpuCounters,
    pub memory_time: Timestamp,
    pub memory: serde_json::Value,
    pub net: NetSnapshot,
}

/// Resource usage of one client over the measured interval
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    /// CPU usage in percent, counting cores with multiplicity (2 busy cores = 200)
    pub cpu_usage_percent: f64,
    /// Bytes sent plus bytes received on the measured interface
    pub net_bytes_total: i64,
    /// Observed interval between the two network snapshots
    pub net_interval_seconds: f64,
}

impl ClientStats {
    /// Usage between two snapshots of the same client.
    ///
    /// `None` when the CPU tick counter did not advance.
    pub fn between(start: &ResourceSnapshot, end: &ResourceSnapshot) -> Option<Self> {
        let cpu_usage_percent = cpu_usage_percent(&start.cpu, &end.cpu)?;
        let sent = end.net.output_bytes as i64 - start.net.output_bytes as i64;
        let received = end.net.input_bytes as i64 - start.net.input_bytes as i64;
        let interval = end.net.time - start.net.time;

        Some(ClientStats {
            cpu_usage_percent,
            net_bytes_total: sent + received,
            net_interval_seconds: interval.num_milliseconds() as f64 / 1000.0,
        })
    }

    /// Network throughput in bytes per second
    pub fn net_bytes_per_sec(&self) -> f64 {
        self.net_bytes_total as f64 / self.net_interval_seconds
    }
}

/// CPU usage between two tick counter readings, rounded to 0.01%.
///
/// `100 - round(10000 * idle_delta / total_delta) / 100`; `None` unless the
/// total tick counter increased.
pub fn cpu_usage_percent(start: &CpuCounters, end: &CpuCounters) -> Option<f64> {
    let total_delta = end.total_tick as f64 - start.total_tick as f64;
    if total_delta <= 0.0 {
        return None;
    }
    let idle_delta = end.total_idle as f64 - start.total_idle as f64;
    Some((10_000.0 - (10_000.0 * idle_delta / total_delta).round()) / 100.0)
}

/// Find the first CPU, MEMORY and NETWORK samples at or after `target`.
///
/// Reading stops once all three are found. A first qualifying sample later
/// than `target + tolerance` is a [`AnalysisError::StaleSample`]; a kind
/// missing up to end of file is a [`AnalysisError::MissingSample`].
pub fn sample_at(
    log: &ClientLog,
    target: Timestamp,
    tolerance: TimeDelta,
    rule: &InterfaceRule,
) -> Result<ResourceSnapshot> {
    let deadline = target.checked_add_signed(tolerance).ok_or_else(|| {
        AnalysisError::InvalidConfig(format!(
            "sample tolerance of {}s overflows {}",
            tolerance.num_seconds(),
            target.to_rfc3339()
        ))
    })?;
    let mut cpu = None;
    let mut memory = None;
    let mut net = None;

    log.for_each_event(|event| {
        let Some(kind) = event.sample_kind() else {
            return Ok(ControlFlow::Continue(()));
        };
        let timestamp = event.timestamp();
        let seen = match kind {
            SampleKind::Cpu => cpu.is_some(),
            SampleKind::Memory => memory.is_some(),
            SampleKind::Network => net.is_some(),
        };
        if seen || timestamp < target {
            return Ok(ControlFlow::Continue(()));
        }
        if timestamp > deadline {
            return Err(AnalysisError::StaleSample {
                path: log.path().to_path_buf(),
                kind: kind.keyword(),
                target: target.to_rfc3339(),
                found: timestamp.to_rfc3339(),
                tolerance_secs: tolerance.num_seconds().unsigned_abs(),
            });
        }

        match event {
            RawEvent::CpuSample { counters, .. } => cpu = Some((timestamp, counters)),
            RawEvent::MemSample { raw, .. } => memory = Some((timestamp, raw)),
            RawEvent::NetSample { interfaces, .. } => net = Some((timestamp, interfaces)),
            RawEvent::AppSend { .. } | RawEvent::AppReceive { .. } => {}
        }

        if cpu.is_some() && memory.is_some() && net.is_some() {
            Ok(ControlFlow::Break(()))
        } else {
            Ok(ControlFlow::Continue(()))
        }
    })?;

    let missing = |kind: SampleKind| AnalysisError::MissingSample {
        path: log.path().to_path_buf(),
        kind: kind.keyword(),
        target: target.to_rfc3339(),
    };
    let (cpu_time, cpu) = cpu.ok_or_else(|| missing(SampleKind::Cpu))?;
    let (memory_time, memory) = memory.ok_or_else(|| missing(SampleKind::Memory))?;
    let (net_time, interfaces) = net.ok_or_else(|| missing(SampleKind::Network))?;

    let selected = rule
        .select(&interfaces)
        .map_err(|reason| AnalysisError::InterfaceShape {
            path: log.path().to_path_buf(),
            reason,
        })?;

    Ok(ResourceSnapshot {
        cpu_time,
        cpu,
        memory_time,
        memory,
        net: NetSnapshot {
            time: net_time,
            interface: selected.name.clone(),
            input_bytes: selected.input_bytes,
            output_bytes: selected.output_bytes,
        },
    })
}

/// Sample a client at `start` and `end` and derive its usage in between
pub fn measure_client(
    log: &ClientLog,
    start: Timestamp,
    end: Timestamp,
    tolerance: TimeDelta,
    rule: &InterfaceRule,
) -> Result<ClientStats> {
    let first = sample_at(log, start, tolerance, rule)?;
    let last = sample_at(log, end, tolerance, rule)?;
    ClientStats::between(&first, &last).ok_or_else(|| AnalysisError::InvalidCpuCounters {
        path: log.path().to_path_buf(),
        total_delta: i128::from(last.cpu.total_tick) - i128::from(first.cpu.total_tick),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn cpu_line(secs: i64, tick: u64, idle: u64) -> String {
        format!(
            r#"CPU {} {{"totalTick":{},"totalIdle":{}}}"#,
            at(secs).to_rfc3339(),
            tick,
            idle
        )
    }

    fn mem_line(secs: i64) -> String {
        format!(r#"MEMORY {} {{"usedMemMb":100}}"#, at(secs).to_rfc3339())
    }

    fn net_line(secs: i64, input: u64, output: u64) -> String {
        format!(
            r#"NETWORK {} [{{"interface":"lo","inputBytes":7,"outputBytes":7}},{{"interface":"eth0","inputBytes":{},"outputBytes":{}}}]"#,
            at(secs).to_rfc3339(),
            input,
            output
        )
    }

    fn log(lines: &[String]) -> (NamedTempFile, ClientLog) {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        let log = ClientLog::new(file.path());
        (file, log)
    }

    fn counters(tick: u64, idle: u64) -> CpuCounters {
        CpuCounters {
            total_tick: tick,
            total_idle: idle,
        }
    }

    #[test]
    fn test_cpu_usage_formula() {
        let usage = cpu_usage_percent(&counters(0, 0), &counters(10_000, 8_000)).unwrap();
        assert_eq!(usage, 20.0);
    }

    #[test]
    fn test_cpu_usage_rounds_to_hundredths() {
        let usage = cpu_usage_percent(&counters(0, 0), &counters(3, 1)).unwrap();
        assert_eq!(usage, 66.67);
    }

    #[test]
    fn test_cpu_usage_counts_cores_with_multiplicity() {
        // Two fully busy cores against a single-core tick base.
        let usage = cpu_usage_percent(&counters(0, 100), &counters(100, 0)).unwrap();
        assert_eq!(usage, 200.0);
    }

    #[test]
    fn test_cpu_usage_requires_advancing_ticks() {
        assert!(cpu_usage_percent(&counters(50, 10), &counters(50, 10)).is_none());
        assert!(cpu_usage_percent(&counters(50, 10), &counters(40, 10)).is_none());
    }

    #[test]
    fn test_sample_at_picks_first_sample_at_or_after_target() {
        let (_file, log) = log(&[
            cpu_line(0, 100, 50),
            mem_line(0),
            net_line(0, 10, 10),
            cpu_line(1, 200, 100),
            mem_line(1),
            net_line(2, 20, 30),
            cpu_line(3, 300, 150),
        ]);
        let snapshot = sample_at(&log, at(1), TimeDelta::seconds(5), &InterfaceRule::default())
            .unwrap();
        assert_eq!(snapshot.cpu, counters(200, 100));
        assert_eq!(snapshot.cpu_time, at(1));
        assert_eq!(snapshot.memory_time, at(1));
        assert_eq!(snapshot.net.time, at(2));
        assert_eq!(snapshot.net.interface, "eth0");
        assert_eq!(snapshot.net.input_bytes, 20);
        assert_eq!(snapshot.net.output_bytes, 30);
    }

    #[test]
    fn test_sample_at_is_repeatable() {
        let (_file, log) = log(&[
            cpu_line(0, 100, 50),
            mem_line(0),
            net_line(0, 10, 10),
        ]);
        let rule = InterfaceRule::default();
        let a = sample_at(&log, at(0), TimeDelta::seconds(5), &rule).unwrap();
        let b = sample_at(&log, at(0), TimeDelta::seconds(5), &rule).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_at_rejects_stale_sample() {
        let (_file, log) = log(&[
            cpu_line(0, 100, 50),
            mem_line(0),
            net_line(0, 10, 10),
            cpu_line(20, 200, 100),
            mem_line(20),
            net_line(20, 20, 20),
        ]);
        let err = sample_at(&log, at(10), TimeDelta::seconds(5), &InterfaceRule::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::StaleSample { kind: "CPU", .. }));
    }

    #[test]
    fn test_sample_at_accepts_sample_at_tolerance_edge() {
        let (_file, log) = log(&[cpu_line(15, 1, 1), mem_line(15), net_line(15, 1, 1)]);
        assert!(sample_at(&log, at(10), TimeDelta::seconds(5), &InterfaceRule::default()).is_ok());
    }

    #[test]
    fn test_sample_at_rejects_overflowing_tolerance() {
        let (_file, log) = log(&[cpu_line(0, 1, 1), mem_line(0), net_line(0, 1, 1)]);
        let err = sample_at(&log, at(0), TimeDelta::MAX, &InterfaceRule::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn test_sample_at_missing_kind() {
        let (_file, log) = log(&[cpu_line(0, 1, 1), net_line(0, 1, 1)]);
        let err = sample_at(&log, at(0), TimeDelta::seconds(5), &InterfaceRule::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingSample { kind: "MEMORY", .. }));
    }

    #[test]
    fn test_sample_at_rejects_unexpected_interfaces() {
        let line = format!(
            r#"NETWORK {} [{{"interface":"wlan0","inputBytes":1,"outputBytes":1}}]"#,
            at(0).to_rfc3339()
        );
        let (_file, log) = log(&[cpu_line(0, 1, 1), mem_line(0), line]);
        let err = sample_at(&log, at(0), TimeDelta::seconds(5), &InterfaceRule::default())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InterfaceShape { .. }));
    }

    #[test]
    fn test_measure_client() {
        let (_file, log) = log(&[
            cpu_line(0, 1_000, 500),
            mem_line(0),
            net_line(0, 1_000, 2_000),
            cpu_line(61, 11_000, 8_500),
            mem_line(61),
            net_line(61, 4_000, 5_000),
        ]);
        let stats = measure_client(
            &log,
            at(0),
            at(60),
            TimeDelta::seconds(5),
            &InterfaceRule::default(),
        )
        .unwrap();
        assert_eq!(stats.cpu_usage_percent, 20.0);
        assert_eq!(stats.net_bytes_total, 6_000);
        assert_eq!(stats.net_interval_seconds, 61.0);
        assert!((stats.net_bytes_per_sec() - 6_000.0 / 61.0).abs() < 1e-9);
    }

    #[test]
    fn test_measure_client_rejects_frozen_cpu_counters() {
        let (_file, log) = log(&[
            cpu_line(0, 1_000, 500),
            mem_line(0),
            net_line(0, 1, 1),
            cpu_line(60, 1_000, 500),
            mem_line(60),
            net_line(60, 2, 2),
        ]);
        let err = measure_client(
            &log,
            at(0),
            at(60),
            TimeDelta::seconds(5),
            &InterfaceRule::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidCpuCounters { total_delta: 0, .. }
        ));
    }
}
