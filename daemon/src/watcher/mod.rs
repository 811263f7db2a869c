//! Log watching and tailing.

pub mod directory;
pub mod file_tailer;
pub mod line_decoder;

pub use directory::{
    classify, is_log_file, scan_log_files, watch_directory, LogDirectoryWatcher, WatchSignal,
    LOG_FILE_PATTERN,
};
pub use file_tailer::{FileTailer, LogLine, TailState};
pub use line_decoder::strip_timestamp;
