//! nparse settings file.
//!
//! Stored as TOML in the user config directory. Only the fields the log
//! watcher and the location relay need live here.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::relay::RelayConfig;
use crate::watcher::scan_log_files;

/// Install locations tried when no game directory is configured.
const DEFAULT_EQ_DIRS: &[&str] = &[
    r"C:\EverQuest",
    r"C:\Program Files\EverQuest",
    r"C:\Program Files (x86)\EverQuest",
    r"D:\EverQuest",
    r"D:\Program Files\EverQuest",
    r"D:\Program Files (x86)\EverQuest",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Game install directory. Logs are read from `<eq_dir>/Logs`.
    pub eq_dir: PathBuf,
    /// File name of the log that was active last time.
    pub last_profile: String,
    pub sharing: SharingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingSettings {
    pub enabled: bool,
    /// Sharing server URL (`ws://` or `wss://`).
    pub url: String,
    /// Seconds to wait before reconnecting.
    pub reconnect_delay: u64,
    pub player_name: String,
    pub group_key: String,
    /// Voice channel overlay URL; its guild and channel ids become the group
    /// key when no explicit key is set.
    pub discord_channel: String,
}

impl Default for SharingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            reconnect_delay: 5,
            player_name: String::new(),
            group_key: String::new(),
            discord_channel: String::new(),
        }
    }
}

impl Settings {
    /// `<config dir>/nparse/nparse.toml`
    pub fn default_path() -> Result<PathBuf, Error> {
        let dir = dirs::config_dir().ok_or(Error::ConfigDirNotFound)?;
        Ok(dir.join("nparse").join("nparse.toml"))
    }

    /// Load settings from `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn last_profile(&self) -> Option<&str> {
        let profile = self.last_profile.trim();
        (!profile.is_empty()).then_some(profile)
    }

    /// Locate the directory holding the game's log files.
    pub fn resolve_log_dir(&self) -> Result<PathBuf, Error> {
        let configured = !self.eq_dir.as_os_str().is_empty();
        let candidates: Vec<PathBuf> = if configured {
            vec![self.eq_dir.clone()]
        } else {
            DEFAULT_EQ_DIRS.iter().map(PathBuf::from).collect()
        };

        for dir in &candidates {
            let logs = dir.join("Logs");
            if has_log_files(&logs) {
                return Ok(logs);
            }
            // Older settings pointed at the Logs directory itself.
            let is_logs_dir = dir
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.eq_ignore_ascii_case("logs"))
                .unwrap_or(false);
            if is_logs_dir && has_log_files(dir) {
                return Ok(dir.clone());
            }
        }

        if !configured {
            return Err(Error::EqDirNotSet);
        }
        if !self.eq_dir.is_dir() {
            return Err(Error::LogDirNotFound(self.eq_dir.clone()));
        }
        let logs = self.eq_dir.join("Logs");
        if logs.is_dir() {
            Err(Error::NoLogFiles(logs))
        } else {
            Err(Error::NoLogFiles(self.eq_dir.clone()))
        }
    }
}

fn has_log_files(dir: &Path) -> bool {
    dir.is_dir()
        && scan_log_files(dir)
            .map(|files| !files.is_empty())
            .unwrap_or(false)
}

impl SharingSettings {
    /// Explicit group key, else one derived from the linked voice channel,
    /// else empty.
    pub fn resolved_group_key(&self) -> String {
        let explicit = self.group_key.trim();
        if !explicit.is_empty() {
            return explicit.to_string();
        }
        channel_group_key(&self.discord_channel).unwrap_or_default()
    }

    pub fn player_name(&self) -> Option<&str> {
        let name = self.player_name.trim();
        (!name.is_empty()).then_some(name)
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            enabled: self.enabled,
            host: self.url.trim().to_string(),
            reconnect_delay: Duration::from_secs(self.reconnect_delay),
            group_key: self.resolved_group_key(),
        }
    }
}

/// `https://streamkit.discord.com/overlay/voice/<guild>/<channel>?...`
/// becomes `<guild>:<channel>`.
fn channel_group_key(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    let segments: Vec<&str> = path.split('/').skip(1).filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => None,
        [only] => Some((*only).to_string()),
        [.., guild, channel] => Some(format!("{guild}:{channel}")),
    }
}
