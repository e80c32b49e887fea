//! End-to-end latency reconstruction
//!
//! Every client logs `APP <t> S <key>` when it broadcasts an operation and
//! `APP <t> R <key>` when it applies one from a peer. Operation keys are not
//! unique across a trial, and messages may be dropped or reordered, so a
//! receive is paired with the latest send of the same key that precedes it.
//! Pairs longer than the latency ceiling are assumed to be key collisions
//! and dropped. Receives that never show up are imputed at the ceiling and
//! counted as unaccounted.

use crate::error::Result;
use crate::event::{RawEvent, Timestamp};
use crate::log_reader::ClientLog;
use crate::window::TrialWindow;
use std::collections::HashMap;
use std::ops::ControlFlow;
use tracing::debug;

/// Send and receive times (epoch milliseconds) of one operation key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpRecord {
    pub sends: Vec<i64>,
    pub receives: Vec<i64>,
}

/// All operation records of one trial, keyed by operation key
#[derive(Debug, Default)]
pub struct OpTable {
    ops: HashMap<String, OpRecord>,
}

impl OpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket every send and receive of the given logs, inside the window
    /// or not.
    pub fn from_logs(clients: &[ClientLog]) -> Result<Self> {
        let mut table = Self::new();
        for client in clients {
            client.for_each_event(|event| {
                table.record(event);
                Ok(ControlFlow::Continue(()))
            })?;
            debug!(client = %client.name(), keys = table.len(), "collected operations");
        }
        Ok(table)
    }

    /// Record an application event; other events are ignored
    pub fn record(&mut self, event: RawEvent) {
        match event {
            RawEvent::AppSend { op_key, timestamp } => self.record_send(op_key, timestamp),
            RawEvent::AppReceive { op_key, timestamp } => self.record_receive(op_key, timestamp),
            _ => {}
        }
    }

    pub fn record_send(&mut self, op_key: String, timestamp: Timestamp) {
        self.ops
            .entry(op_key)
            .or_default()
            .sends
            .push(timestamp.timestamp_millis());
    }

    pub fn record_receive(&mut self, op_key: String, timestamp: Timestamp) {
        self.ops
            .entry(op_key)
            .or_default()
            .receives
            .push(timestamp.timestamp_millis());
    }

    pub fn get(&self, op_key: &str) -> Option<&OpRecord> {
        self.ops.get(op_key)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Rules for turning send/receive pairs into latency samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyPolicy {
    /// Inclusive start of the measured interval (epoch ms)
    pub window_start_ms: i64,
    /// Exclusive end of the measured interval (epoch ms)
    pub window_end_ms: i64,
    /// Ceiling for recorded latencies and value imputed for missing ones
    pub max_latency_ms: u64,
    /// Receives expected per send (every client but the sender)
    pub recipients_per_send: usize,
}

impl LatencyPolicy {
    pub fn new(window: TrialWindow, max_latency_ms: u64, num_clients: usize) -> Self {
        Self {
            window_start_ms: window.start.timestamp_millis(),
            window_end_ms: window.end.timestamp_millis(),
            max_latency_ms,
            recipients_per_send: num_clients.saturating_sub(1),
        }
    }

    pub fn in_window(&self, time_ms: i64) -> bool {
        self.window_start_ms <= time_ms && time_ms < self.window_end_ms
    }
}

/// Latencies of one trial, imputed entries included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialLatencies {
    pub latencies_ms: Vec<u64>,
    /// Expected receives that never arrived within the ceiling
    pub unaccounted: usize,
}

/// Latest send strictly before `receive`, from sends sorted ascending
pub fn nearest_preceding_send(sorted_sends: &[i64], receive: i64) -> Option<i64> {
    let idx = sorted_sends.partition_point(|&send| send < receive);
    idx.checked_sub(1).map(|i| sorted_sends[i])
}

/// Latency of `receive` under the pairing rule, if it counts.
///
/// The receive pairs with its nearest preceding send. It counts only when
/// that send lies in the measured interval and the gap is within the
/// ceiling; anything longer is treated as a match against an older send
/// that reused the key.
pub fn pair_latency(sorted_sends: &[i64], receive: i64, policy: &LatencyPolicy) -> Option<u64> {
    let send = nearest_preceding_send(sorted_sends, receive)?;
    if !policy.in_window(send) {
        return None;
    }
    let latency = (receive - send).unsigned_abs();
    (latency <= policy.max_latency_ms).then_some(latency)
}

/// Latencies for one operation key, padded up to the expected receive
/// count. Returns the latencies and how many of them were imputed.
pub fn op_latencies(record: &mut OpRecord, policy: &LatencyPolicy) -> (Vec<u64>, usize) {
    record.sends.sort_unstable();
    let valid_sends = record
        .sends
        .iter()
        .filter(|&&send| policy.in_window(send))
        .count();

    let mut latencies: Vec<u64> = record
        .receives
        .iter()
        .filter_map(|&receive| pair_latency(&record.sends, receive, policy))
        .collect();

    let expected = valid_sends * policy.recipients_per_send;
    let unaccounted = expected.saturating_sub(latencies.len());
    latencies.resize(latencies.len() + unaccounted, policy.max_latency_ms);
    (latencies, unaccounted)
}

/// Flatten every key's latencies into the trial's latency list
pub fn reconstruct(table: OpTable, policy: &LatencyPolicy) -> TrialLatencies {
    let mut result = TrialLatencies::default();
    for (_, mut record) in table.ops {
        let (latencies, unaccounted) = op_latencies(&mut record, policy);
        result.latencies_ms.extend(latencies);
        result.unaccounted += unaccounted;
    }
    result
}

/// Collect operations from `clients` and reconstruct latencies for sends in
/// `window`
pub fn trial_latencies(
    clients: &[ClientLog],
    window: TrialWindow,
    max_latency_ms: u64,
    num_clients: usize,
) -> Result<TrialLatencies> {
    let table = OpTable::from_logs(clients)?;
    let policy = LatencyPolicy::new(window, max_latency_ms, num_clients);
    let latencies = reconstruct(table, &policy);
    debug!(
        samples = latencies.latencies_ms.len(),
        unaccounted = latencies.unaccounted,
        "reconstructed latencies"
    );
    Ok(latencies)
}
