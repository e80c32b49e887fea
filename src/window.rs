//! Trial window calibration
//!
//! Clients start and stop at slightly different moments. The trial window
//! is the interval during which every client was sending operations:
//! it opens when the last client sends its first operation and closes when
//! the first client sends its last one.

use crate::error::Result;
use crate::event::{RawEvent, Timestamp};
use crate::log_reader::ClientLog;
use chrono::TimeDelta;
use std::ops::ControlFlow;
use tracing::{debug, info};

/// `[start, end)` interval in which all clients were confirmed active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TrialWindow {
    pub fn length(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Window length in (fractional) seconds
    pub fn length_secs(&self) -> f64 {
        self.length().num_milliseconds() as f64 / 1000.0
    }

    pub fn is_long_enough(&self, minimum: TimeDelta) -> bool {
        self.length() >= minimum
    }
}

/// Outcome of calibrating one trial
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    /// Window is long enough; `clients` are the logs that contain sends
    Calibrated {
        window: TrialWindow,
        clients: Vec<ClientLog>,
    },
    /// Some clients never sent an operation
    TooFewClients { valid: usize, expected: usize },
    /// Some client stopped too early
    TooShort {
        window: TrialWindow,
        required: TimeDelta,
    },
}

/// Combine per-client first and last send times into the trial window.
///
/// `None` when no client is given.
pub fn window_from_bounds(first_sends: &[Timestamp], last_sends: &[Timestamp]) -> Option<TrialWindow> {
    Some(TrialWindow {
        start: first_sends.iter().copied().max()?,
        end: last_sends.iter().copied().min()?,
    })
}

/// Timestamp of the first `APP ... S` line; stops reading as soon as found
pub fn first_send(log: &ClientLog) -> Result<Option<Timestamp>> {
    let mut found = None;
    log.for_each_event(|event| match event {
        RawEvent::AppSend { timestamp, .. } => {
            found = Some(timestamp);
            Ok(ControlFlow::Break(()))
        }
        _ => Ok(ControlFlow::Continue(())),
    })?;
    Ok(found)
}

/// Timestamp of the last `APP ... S` line; reads the whole file
pub fn last_send(log: &ClientLog) -> Result<Option<Timestamp>> {
    let mut found = None;
    log.for_each_event(|event| {
        if let RawEvent::AppSend { timestamp, .. } = event {
            found = Some(timestamp);
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(found)
}

/// Compute the common valid window for a trial.
///
/// Clients without any send are excluded. The trial is rejected when fewer
/// than `expected_clients` remain or the window is shorter than `minimum`.
pub fn calibrate(
    clients: &[ClientLog],
    expected_clients: usize,
    minimum: TimeDelta,
) -> Result<Calibration> {
    let mut valid = Vec::with_capacity(clients.len());
    let mut first_sends = Vec::with_capacity(clients.len());
    for client in clients {
        match first_send(client)? {
            Some(first) => {
                debug!(client = %client.name(), first_send = %first, "client started");
                first_sends.push(first);
                valid.push(client.clone());
            }
            None => debug!(client = %client.name(), "no sends, excluding client"),
        }
    }

    info!("Valid clients: {}", valid.len());
    if valid.len() < expected_clients || valid.is_empty() {
        return Ok(Calibration::TooFewClients {
            valid: valid.len(),
            expected: expected_clients,
        });
    }

    let mut last_sends = Vec::with_capacity(valid.len());
    for client in &valid {
        // A client with a first send always has a last send.
        if let Some(last) = last_send(client)? {
            last_sends.push(last);
        }
    }

    let Some(window) = window_from_bounds(&first_sends, &last_sends) else {
        return Ok(Calibration::TooFewClients {
            valid: 0,
            expected: expected_clients,
        });
    };
    info!(start = %window.start, end = %window.end, "Trial window");
    info!("Length: {} sec", window.length_secs());

    if !window.is_long_enough(minimum) {
        return Ok(Calibration::TooShort {
            window,
            required: minimum,
        });
    }

    Ok(Calibration::Calibrated {
        window,
        clients: valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use tempfile::TempDir;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn app(kind: &str, secs: i64) -> String {
        format!("APP {} {} obj.x {}", at(secs).to_rfc3339(), kind, secs)
    }

    fn client(dir: &TempDir, name: &str, lines: &[String]) -> ClientLog {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        ClientLog::new(path)
    }

    #[test]
    fn test_window_from_bounds_takes_last_start_and_first_stop() {
        let window = window_from_bounds(&[at(10), at(12), at(9)], &[at(80), at(95), at(70)]).unwrap();
        assert_eq!(window.start, at(12));
        assert_eq!(window.end, at(70));
        assert_eq!(window.length(), TimeDelta::seconds(58));
        assert!(!window.is_long_enough(TimeDelta::seconds(60)));
        assert!(window.is_long_enough(TimeDelta::seconds(58)));
    }

    #[test]
    fn test_window_from_bounds_empty() {
        assert!(window_from_bounds(&[], &[]).is_none());
    }

    #[test]
    fn test_first_and_last_send_skip_receives_and_samples() {
        let dir = TempDir::new().unwrap();
        let log = client(
            &dir,
            "client-1-0",
            &[
                app("R", 1),
                format!(
                    r#"CPU {} {{"totalTick":1,"totalIdle":1}}"#,
                    at(2).to_rfc3339()
                ),
                app("S", 3),
                app("S", 40),
                app("R", 50),
            ],
        );
        assert_eq!(first_send(&log).unwrap(), Some(at(3)));
        assert_eq!(last_send(&log).unwrap(), Some(at(40)));
    }

    #[test]
    fn test_first_send_stops_before_later_garbage() {
        let dir = TempDir::new().unwrap();
        let log = client(
            &dir,
            "client-1-0",
            &[app("S", 5), "APP garbage S x 1".to_string()],
        );
        assert_eq!(first_send(&log).unwrap(), Some(at(5)));
        assert!(last_send(&log).is_err());
    }

    #[test]
    fn test_calibrate_accepts_long_trial() {
        let dir = TempDir::new().unwrap();
        let clients = vec![
            client(&dir, "client-1-0", &[app("S", 10), app("S", 80)]),
            client(&dir, "client-1-1", &[app("S", 12), app("S", 95)]),
            client(&dir, "client-1-2", &[app("S", 9), app("S", 90)]),
        ];
        match calibrate(&clients, 3, TimeDelta::seconds(60)).unwrap() {
            Calibration::Calibrated { window, clients } => {
                assert_eq!(window.start, at(12));
                assert_eq!(window.end, at(80));
                assert_eq!(clients.len(), 3);
            }
            other => panic!("expected calibrated, got {:?}", other),
        }
    }

    #[test]
    fn test_calibrate_rejects_short_trial() {
        let dir = TempDir::new().unwrap();
        let clients = vec![
            client(&dir, "client-1-0", &[app("S", 10), app("S", 80)]),
            client(&dir, "client-1-1", &[app("S", 12), app("S", 95)]),
            client(&dir, "client-1-2", &[app("S", 9), app("S", 70)]),
        ];
        match calibrate(&clients, 3, TimeDelta::seconds(60)).unwrap() {
            Calibration::TooShort { window, required } => {
                assert_eq!(window.length_secs(), 58.0);
                assert_eq!(required, TimeDelta::seconds(60));
            }
            other => panic!("expected too short, got {:?}", other),
        }
    }

    #[test]
    fn test_calibrate_excludes_silent_client() {
        let dir = TempDir::new().unwrap();
        let clients = vec![
            client(&dir, "client-1-0", &[app("S", 10), app("S", 80)]),
            client(&dir, "client-1-1", &[app("R", 12)]),
        ];
        assert_eq!(
            calibrate(&clients, 2, TimeDelta::seconds(10)).unwrap(),
            Calibration::TooFewClients {
                valid: 1,
                expected: 2
            }
        );
    }
}
