//! Incremental reader for a single append-only log file.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, SubsecRound};
use tracing::{debug, trace, warn};

use super::line_decoder::strip_timestamp;
use crate::error::Error;

/// One decoded log line.
///
/// `timestamp` is the local wall-clock time the line was read, not the time
/// embedded in the line itself.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: NaiveDateTime,
    pub text: String,
}

/// Read position within one watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailState {
    pub path: PathBuf,
    pub read_offset: u64,
}

/// Tails one file: every `poll` returns the complete lines appended since the
/// previous poll.
#[derive(Debug)]
pub struct FileTailer {
    state: TailState,
}

impl FileTailer {
    /// Open `path` positioned at its current end, so existing content is not
    /// replayed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let read_offset = fs::metadata(&path)?.len();
        debug!(path = %path.display(), offset = read_offset, "Opened log file at end");
        Ok(Self {
            state: TailState { path, read_offset },
        })
    }

    /// Continue tailing from a previously recorded position.
    pub fn resume(state: TailState) -> Self {
        Self { state }
    }

    pub fn path(&self) -> &Path {
        &self.state.path
    }

    pub fn offset(&self) -> u64 {
        self.state.read_offset
    }

    pub fn state(&self) -> &TailState {
        &self.state
    }

    pub fn into_state(self) -> TailState {
        self.state
    }

    /// Read everything appended since the last poll.
    ///
    /// A trailing line without a terminator is left unread until it is
    /// complete. Read failures are logged and the position skips to the
    /// current end of the file.
    pub fn poll(&mut self) -> Vec<LogLine> {
        match self.read_new_lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!(
                    path = %self.state.path.display(),
                    error = %e,
                    "Could not read log lines, skipping ahead"
                );
                self.skip_to_end();
                Vec::new()
            }
        }
    }

    fn read_new_lines(&mut self) -> io::Result<Vec<LogLine>> {
        let mut file = File::open(&self.state.path)?;
        let len = file.metadata()?.len();

        if len < self.state.read_offset {
            // Truncated or replaced under the same name. Old bytes are gone and
            // new ones predate us, so start over from the end.
            debug!(
                path = %self.state.path.display(),
                previous = self.state.read_offset,
                len,
                "Log file shrank, resetting to end"
            );
            self.state.read_offset = len;
            return Ok(Vec::new());
        }
        if len == self.state.read_offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.state.read_offset))?;
        let mut buf = Vec::with_capacity((len - self.state.read_offset) as usize);
        file.take(len - self.state.read_offset).read_to_end(&mut buf)?;

        let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
            trace!(path = %self.state.path.display(), "Partial line pending");
            return Ok(Vec::new());
        };

        let timestamp = Local::now().naive_local().trunc_subsecs(6);
        let lines: Vec<LogLine> = buf[..last_newline]
            .split(|b| *b == b'\n')
            .map(|raw| {
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                let decoded = String::from_utf8_lossy(raw);
                LogLine {
                    timestamp,
                    text: strip_timestamp(&decoded).to_string(),
                }
            })
            .collect();

        self.state.read_offset += last_newline as u64 + 1;
        trace!(
            path = %self.state.path.display(),
            lines = lines.len(),
            offset = self.state.read_offset,
            "Read log lines"
        );
        Ok(lines)
    }

    fn skip_to_end(&mut self) {
        if let Ok(meta) = fs::metadata(&self.state.path) {
            self.state.read_offset = meta.len();
        }
    }
}
