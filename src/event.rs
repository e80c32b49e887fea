//! Log line parsing
//!
//! Every client process writes one event per line. The first
//! whitespace-delimited field is a keyword, the second an ISO-8601
//! timestamp:
//!
//! ```text
//! APP <timestamp> <S|R> <key-part-1> <key-part-2>
//! CPU <timestamp> {"totalTick":...,"totalIdle":...}
//! MEMORY <timestamp> {...}
//! NETWORK <timestamp> [{"interface":"eth0","inputBytes":...,"outputBytes":...}]
//! ```
//!
//! Lines with any other keyword are not relevant and parse to `None`.
//! `APP` lines also carry the page's console output, so an `APP` line is a
//! send only with direction `S`; any other direction with a full key is a
//! receive, and lines too short to hold a key parse to `None`. A bad
//! timestamp or sample payload is a protocol violation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Absolute instant at which an event was logged
pub type Timestamp = DateTime<Utc>;

/// Why a recognized line could not be parsed
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("invalid timestamp {value:?}: {source}")]
    BadTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid {kind} payload: {source}")]
    BadPayload {
        kind: SampleKind,
        #[source]
        source: serde_json::Error,
    },
}

/// The three kinds of periodic resource samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Cpu,
    Memory,
    Network,
}

impl SampleKind {
    pub const ALL: [SampleKind; 3] = [SampleKind::Cpu, SampleKind::Memory, SampleKind::Network];

    /// Line keyword for this sample kind
    pub fn keyword(self) -> &'static str {
        match self {
            SampleKind::Cpu => "CPU",
            SampleKind::Memory => "MEMORY",
            SampleKind::Network => "NETWORK",
        }
    }
}

impl std::fmt::Display for SampleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Cumulative CPU tick counters, summed over all cores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuCounters {
    pub total_tick: u64,
    pub total_idle: u64,
}

/// Cumulative byte counters for one network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceCounters {
    #[serde(rename = "interface")]
    pub name: String,
    pub input_bytes: u64,
    pub output_bytes: u64,
}

/// A parsed log line
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    AppSend {
        op_key: String,
        timestamp: Timestamp,
    },
    AppReceive {
        op_key: String,
        timestamp: Timestamp,
    },
    CpuSample {
        timestamp: Timestamp,
        counters: CpuCounters,
    },
    MemSample {
        timestamp: Timestamp,
        raw: serde_json::Value,
    },
    NetSample {
        timestamp: Timestamp,
        interfaces: Vec<InterfaceCounters>,
    },
}

impl RawEvent {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            RawEvent::AppSend { timestamp, .. }
            | RawEvent::AppReceive { timestamp, .. }
            | RawEvent::CpuSample { timestamp, .. }
            | RawEvent::MemSample { timestamp, .. }
            | RawEvent::NetSample { timestamp, .. } => *timestamp,
        }
    }

    /// Sample kind, or `None` for application events
    pub fn sample_kind(&self) -> Option<SampleKind> {
        match self {
            RawEvent::CpuSample { .. } => Some(SampleKind::Cpu),
            RawEvent::MemSample { .. } => Some(SampleKind::Memory),
            RawEvent::NetSample { .. } => Some(SampleKind::Network),
            RawEvent::AppSend { .. } | RawEvent::AppReceive { .. } => None,
        }
    }
}

/// Parse one log line.
///
/// Returns `Ok(None)` for blank lines, lines whose keyword is not one of
/// `APP`, `CPU`, `MEMORY`, `NETWORK`, and `APP` lines without an operation
/// key.
pub fn parse_line(line: &str) -> Result<Option<RawEvent>, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some((keyword, rest)) = line.split_once(' ') else {
        return Ok(None);
    };

    let event = match keyword {
        "APP" => return parse_app(rest),
        "CPU" => {
            let (timestamp, payload) = split_sample(rest)?;
            RawEvent::CpuSample {
                timestamp,
                counters: parse_payload(SampleKind::Cpu, payload)?,
            }
        }
        "MEMORY" => {
            let (timestamp, payload) = split_sample(rest)?;
            RawEvent::MemSample {
                timestamp,
                raw: parse_payload(SampleKind::Memory, payload)?,
            }
        }
        "NETWORK" => {
            let (timestamp, payload) = split_sample(rest)?;
            RawEvent::NetSample {
                timestamp,
                interfaces: parse_payload(SampleKind::Network, payload)?,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

/// Parse an RFC 3339 / ISO-8601 timestamp into UTC
pub fn parse_timestamp(value: &str) -> Result<Timestamp, ParseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| ParseError::BadTimestamp {
            value: value.to_string(),
            source,
        })
}

fn parse_app(rest: &str) -> Result<Option<RawEvent>, ParseError> {
    let mut fields = rest.split(' ');
    let timestamp = parse_timestamp(fields.next().unwrap_or_default())?;
    let (Some(direction), Some(key_object), Some(key_counter)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Ok(None);
    };
    let op_key = format!("{} {}", key_object, key_counter);

    Ok(Some(match direction {
        "S" => RawEvent::AppSend { op_key, timestamp },
        _ => RawEvent::AppReceive { op_key, timestamp },
    }))
}

fn split_sample(rest: &str) -> Result<(Timestamp, &str), ParseError> {
    let (timestamp, payload) = rest
        .split_once(' ')
        .ok_or(ParseError::MissingField("payload"))?;
    Ok((parse_timestamp(timestamp)?, payload))
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: SampleKind,
    payload: &str,
) -> Result<T, ParseError> {
    serde_json::from_str(payload).map_err(|source| ParseError::BadPayload { kind, source })
}
