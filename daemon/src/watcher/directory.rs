//! Watches the log directory and tails whichever log file is active.
//!
//! Each character writes its own `eqlog_<Name>_<server>.txt`. The active file
//! is the one most recently written to, or the remembered `last_profile` at
//! startup. Inactive files keep their read offset so switching back resumes
//! where tailing left off.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use notify::event::ModifyKind;
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::file_tailer::{FileTailer, TailState};
use crate::bus::{Event, EventBus};
use crate::error::Error;

/// File name pattern of game log files.
pub const LOG_FILE_PATTERN: &str = "eqlog*.txt";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Returns true if `path` names a game log file.
pub fn is_log_file(path: &Path) -> bool {
    let Ok(pattern) = Pattern::new(LOG_FILE_PATTERN) else {
        return false;
    };
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| pattern.matches_with(name, MATCH_OPTIONS))
        .unwrap_or(false)
}

/// List the log files in `dir`, sorted by path.
pub fn scan_log_files(dir: &Path) -> Result<BTreeSet<PathBuf>, Error> {
    let mut files = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_log_file(&path) {
            files.insert(path);
        }
    }
    Ok(files)
}

/// What a filesystem notification means for the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// Files were added, removed or renamed.
    DirectoryChanged,
    /// A log file received a write.
    FileWritten(PathBuf),
}

/// Translate a raw notification into watcher signals.
pub fn classify(event: &NotifyEvent) -> Vec<WatchSignal> {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            vec![WatchSignal::DirectoryChanged]
        }
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|p| is_log_file(p))
            .map(|p| WatchSignal::FileWritten(p.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Start a non-recursive OS watch on `dir`.
///
/// The callback runs on the notification thread and only forwards events;
/// the receiver is drained by the consumer task.
pub fn watch_directory(
    dir: &Path,
) -> Result<
    (
        RecommendedWatcher,
        mpsc::UnboundedReceiver<notify::Result<NotifyEvent>>,
    ),
    Error,
> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |result| {
        if tx.send(result).is_err() {
            debug!("Log directory notification receiver dropped");
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok((watcher, rx))
}

/// Tracks the log files of one directory and tails the active one.
pub struct LogDirectoryWatcher {
    log_dir: PathBuf,
    bus: EventBus,
    /// Last read offset of every known file. The active file's entry is
    /// refreshed when it stops being active.
    offsets: BTreeMap<PathBuf, u64>,
    active: Option<FileTailer>,
}

impl LogDirectoryWatcher {
    /// Register every log file in `log_dir` at its current end.
    ///
    /// If `last_profile` names one of them, it starts out active.
    pub fn open(log_dir: &Path, last_profile: Option<&str>, bus: EventBus) -> Result<Self, Error> {
        if !log_dir.is_dir() {
            return Err(Error::LogDirNotFound(log_dir.to_path_buf()));
        }
        let log_dir = fs::canonicalize(log_dir)?;

        let mut watcher = Self {
            log_dir,
            bus,
            offsets: BTreeMap::new(),
            active: None,
        };
        for path in scan_log_files(&watcher.log_dir)? {
            watcher.register(path);
        }

        if let Some(profile) = last_profile.filter(|p| !p.is_empty()) {
            let path = watcher.log_dir.join(profile);
            match watcher.offsets.get(&path) {
                Some(&read_offset) => {
                    info!(path = %path.display(), "Starting with last profile log");
                    watcher.active = Some(FileTailer::resume(TailState { path, read_offset }));
                }
                None => warn!(profile, "Last profile log file not found"),
            }
        }

        info!(
            dir = %watcher.log_dir.display(),
            files = watcher.offsets.len(),
            "Watching log directory"
        );
        Ok(watcher)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|t| t.path())
    }

    pub fn known_files(&self) -> impl Iterator<Item = &Path> {
        self.offsets.keys().map(PathBuf::as_path)
    }

    /// Current read offset for `path`, live for the active file.
    pub fn offset_of(&self, path: &Path) -> Option<u64> {
        match &self.active {
            Some(tailer) if tailer.path() == path => Some(tailer.offset()),
            _ => self.offsets.get(path).copied(),
        }
    }

    fn register(&mut self, path: PathBuf) {
        match fs::metadata(&path) {
            Ok(meta) => {
                debug!(path = %path.display(), offset = meta.len(), "Registered log file");
                self.offsets.insert(path, meta.len());
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Could not stat log file"),
        }
    }

    /// Apply one raw notification. Returns the number of lines published.
    pub fn handle_notification(&mut self, event: &NotifyEvent) -> usize {
        classify(event)
            .into_iter()
            .map(|signal| match signal {
                WatchSignal::DirectoryChanged => {
                    self.refresh();
                    0
                }
                WatchSignal::FileWritten(path) => self.file_written(&path),
            })
            .sum()
    }

    /// Re-scan the directory: new files start at their end, vanished files
    /// are forgotten.
    pub fn refresh(&mut self) {
        let current = match scan_log_files(&self.log_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %self.log_dir.display(), error = %e, "Could not list log directory");
                return;
            }
        };

        let gone: Vec<PathBuf> = self
            .offsets
            .keys()
            .filter(|p| !current.contains(*p))
            .cloned()
            .collect();
        for path in gone {
            info!(path = %path.display(), "Log file removed");
            self.offsets.remove(&path);
            if self.active_path() == Some(path.as_path()) {
                self.active = None;
            }
        }

        for path in current {
            if !self.offsets.contains_key(&path) {
                info!(path = %path.display(), "Log file added");
                self.register(path);
            }
        }
    }

    /// Handle a write to `path`: make it active if needed, then publish its
    /// new lines. Returns the number of lines published.
    pub fn file_written(&mut self, path: &Path) -> usize {
        if !self.offsets.contains_key(path) {
            if path.parent() != Some(self.log_dir.as_path()) || !is_log_file(path) {
                return 0;
            }
            self.refresh();
            if !self.offsets.contains_key(path) {
                return 0;
            }
        }

        if self.active_path() != Some(path) {
            self.activate(path);
        }

        let Some(tailer) = self.active.as_mut() else {
            return 0;
        };
        let lines = tailer.poll();
        let count = lines.len();
        for line in lines {
            self.bus.publish(Event::LogLine(line));
        }
        count
    }

    fn activate(&mut self, path: &Path) {
        if let Some(previous) = self.active.take() {
            let state = previous.into_state();
            if self.offsets.contains_key(&state.path) {
                self.offsets.insert(state.path, state.read_offset);
            }
        }

        let read_offset = self.offsets.get(path).copied().unwrap_or(0);
        info!(path = %path.display(), offset = read_offset, "Active log file changed");
        self.active = Some(FileTailer::resume(TailState {
            path: path.to_path_buf(),
            read_offset,
        }));
        self.bus.publish(Event::ActiveFileChanged(path.to_path_buf()));
    }
}
