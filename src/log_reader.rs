//! Streaming line-by-line log scanning with early stop
//!
//! Client logs hold per-second samples over minutes of runtime, so they are
//! never loaded whole. A scan reads from the start of the file, hands each
//! line to a handler and ends when the handler breaks or at end of file.

use crate::error::{AnalysisError, Result};
use crate::event::{self, RawEvent};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Read `path` sequentially, calling `handler` with the 1-based line number
/// and the line (without its terminator).
///
/// Stops at end of file or as soon as `handler` returns
/// `ControlFlow::Break`. Errors from `handler` abort the scan and propagate.
pub fn for_each_line<F>(path: &Path, mut handler: F) -> Result<()>
where
    F: FnMut(usize, &str) -> Result<ControlFlow<()>>,
{
    let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();
    let mut line_number = 0;

    loop {
        buf.clear();
        let read = reader
            .read_line(&mut buf)
            .map_err(|e| AnalysisError::io(path, e))?;
        if read == 0 {
            return Ok(());
        }
        line_number += 1;
        let line = buf.trim_end_matches(['\n', '\r']);
        if handler(line_number, line)?.is_break() {
            return Ok(());
        }
    }
}

/// One client's log file for one trial
///
/// Read-only; every scan starts again from the beginning of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientLog {
    path: PathBuf,
}

impl ClientLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for log messages
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Scan the log, handing every recognized event to `handler`.
    ///
    /// Unrecognized lines are skipped. A malformed line fails the scan with
    /// [`AnalysisError::MalformedLine`].
    pub fn for_each_event<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(RawEvent) -> Result<ControlFlow<()>>,
    {
        for_each_line(&self.path, |line_number, line| {
            match event::parse_line(line) {
                Ok(Some(event)) => handler(event),
                Ok(None) => Ok(ControlFlow::Continue(())),
                Err(e) => Err(AnalysisError::MalformedLine {
                    path: self.path.clone(),
                    line_number,
                    reason: e.to_string(),
                }),
            }
        })
    }
}
