//! Subcommands.

use std::path::PathBuf;

use nparse::{Error, Settings};

pub mod daemon;
pub mod status;

/// Settings file path from `--config` or the default location.
fn settings_path(config: Option<PathBuf>) -> Result<PathBuf, Error> {
    match config {
        Some(path) => Ok(path),
        None => Settings::default_path(),
    }
}
