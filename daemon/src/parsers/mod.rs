//! Consumers of the log line stream.

pub mod location;

pub use location::{player_from_log_file, LineOutcome, LocationParser, PathRecording};
