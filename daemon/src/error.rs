//! Error types for nparse.

use std::path::PathBuf;

use thiserror::Error;

/// nparse error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error("EverQuest directory needs to be set before proceeding")]
    EqDirNotSet,

    #[error("Log directory not found: {0}")]
    LogDirNotFound(PathBuf),

    #[error("No EverQuest log files found in {0}. Is logging turned on in the client?")]
    NoLogFiles(PathBuf),

    #[error("Location sharing is enabled but no sharing host is set")]
    SharingHostMissing,

    #[error("Relay error: {0}")]
    Relay(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigParse(e.to_string())
    }
}

impl Error {
    /// Configuration problems the operator has to fix, as opposed to
    /// transient runtime failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ConfigParse(_)
                | Error::ConfigDirNotFound
                | Error::EqDirNotSet
                | Error::LogDirNotFound(_)
                | Error::NoLogFiles(_)
                | Error::SharingHostMissing
        )
    }
}
