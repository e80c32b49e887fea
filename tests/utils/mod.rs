// Fixture builders for trial directories
//
// A synthetic trial: every client samples CPU/MEMORY/NETWORK once per
// second and broadcasts one operation per second; every other client
// receives it a fixed number of milliseconds later.

#![allow(dead_code)]

use chrono::{SecondsFormat, TimeZone, Utc};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Trial epoch in milliseconds (2022-03-01T10:00:00Z)
pub const T0_MS: i64 = 1_646_128_800_000;

pub fn ts(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .unwrap()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn app_line(ms: i64, direction: &str, key: &str) -> String {
    format!("APP {} {} {}", ts(ms), direction, key)
}

pub fn cpu_line(ms: i64, tick: u64, idle: u64) -> String {
    format!(
        r#"CPU {} {{"totalTick":{},"totalIdle":{}}}"#,
        ts(ms),
        tick,
        idle
    )
}

pub fn mem_line(ms: i64) -> String {
    format!(
        r#"MEMORY {} {{"totalMemMb":4000,"usedMemMb":1500}}"#,
        ts(ms)
    )
}

pub fn net_line(ms: i64, input: u64, output: u64) -> String {
    format!(
        r#"NETWORK {} [{{"interface":"lo","inputBytes":5,"outputBytes":5}},{{"interface":"eth0","inputBytes":{},"outputBytes":{}}}]"#,
        ts(ms),
        input,
        output
    )
}

/// Shape of one synthetic client
#[derive(Debug, Clone)]
pub struct ClientSpec {
    /// First and last second (relative to T0) at which the client sends
    pub first_send: i64,
    pub last_send: i64,
    /// Idle ticks per 1000 total ticks
    pub idle_per_mille: u64,
    /// Bytes per second in each direction
    pub bytes_per_sec: u64,
    /// Resource samples at these seconds (relative to T0)
    pub sample_secs: Vec<i64>,
}

impl ClientSpec {
    pub fn new(first_send: i64, last_send: i64) -> Self {
        Self {
            first_send,
            last_send,
            idle_per_mille: 800,
            bytes_per_sec: 1000,
            sample_secs: (-5..=120).collect(),
        }
    }
}

/// A trial under construction
#[derive(Debug, Clone)]
pub struct TrialSpec {
    pub clients: Vec<ClientSpec>,
    /// (sender, receiver, second) triples whose receive is dropped
    pub dropped: HashSet<(usize, usize, i64)>,
}

impl TrialSpec {
    pub fn new(clients: Vec<ClientSpec>) -> Self {
        Self {
            clients,
            dropped: HashSet::new(),
        }
    }

    /// Receive delay for `receiver`, in milliseconds
    pub fn delay_ms(receiver: usize) -> i64 {
        10 * (receiver as i64 + 1)
    }

    /// Log lines of client `index`, in time order
    pub fn client_lines(&self, index: usize) -> Vec<String> {
        let client = &self.clients[index];
        let mut events: Vec<(i64, String)> = Vec::new();

        for &sec in &client.sample_secs {
            let ms = T0_MS + sec * 1000;
            let k = (sec + 10) as u64;
            events.push((ms, cpu_line(ms, k * 1000, k * client.idle_per_mille)));
            events.push((ms, mem_line(ms)));
            let bytes = k * client.bytes_per_sec;
            events.push((ms, net_line(ms, bytes, bytes)));
        }

        for sec in client.first_send..=client.last_send {
            let ms = T0_MS + sec * 1000;
            events.push((ms, app_line(ms, "S", &format!("obj{}.x {}", index, sec))));
        }

        for (sender, other) in self.clients.iter().enumerate() {
            if sender == index {
                continue;
            }
            for sec in other.first_send..=other.last_send {
                if self.dropped.contains(&(sender, index, sec)) {
                    continue;
                }
                let ms = T0_MS + sec * 1000 + Self::delay_ms(index);
                events.push((ms, app_line(ms, "R", &format!("obj{}.x {}", sender, sec))));
            }
        }

        events.sort_by_key(|(ms, _)| *ms);
        events.into_iter().map(|(_, line)| line).collect()
    }

    /// Write one `client-1-<i>` file per client into `dir`
    pub fn write(&self, dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        for index in 0..self.clients.len() {
            write_lines(&dir.join(format!("client-1-{}", index)), &self.client_lines(index));
        }
        // Non-reference logs live alongside and must be ignored.
        write_lines(&dir.join("server"), &["server started".to_string()]);
    }
}

pub fn write_lines(path: &Path, lines: &[String]) {
    let mut file = fs::File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
}

/// Three clients with CPU usage 20/30/40% and 2000/4000/6000 B/s
///
/// Window: starts at T0+2s (client 2 starts last), ends at T0+90s.
pub fn standard_trial() -> TrialSpec {
    let clients = (0..3)
        .map(|i| ClientSpec {
            idle_per_mille: 800 - 100 * i as u64,
            bytes_per_sec: 1000 * (i as u64 + 1),
            ..ClientSpec::new(i as i64, 90)
        })
        .collect();
    TrialSpec::new(clients)
}

/// Like `standard_trial`, but client 1 stops after 40 seconds
pub fn short_trial() -> TrialSpec {
    let mut trial = standard_trial();
    trial.clients[1].last_send = 40;
    trial
}

pub fn trial_dir(data_dir: &Path, bench: &str, n: usize) -> PathBuf {
    data_dir.join(format!("{}_{}", bench, n))
}
