//! Show resolved paths and sharing configuration.

use std::path::{Path, PathBuf};

use nparse::parsers::player_from_log_file;
use nparse::watcher::scan_log_files;
use nparse::{Error, Settings};

/// Exit codes for status command.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const SHARING_HOST_MISSING: i32 = 2;
}

/// Run the status command.
pub fn run(config: Option<PathBuf>) -> Result<i32, Error> {
    let settings_path = super::settings_path(config)?;

    println!("nparse Status");
    println!("  Settings: {}", settings_path.display());

    let settings = match Settings::load(&settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            println!();
            println!("{}", e);
            return Ok(exit_code::CONFIG_ERROR);
        }
    };

    let log_dir = match settings.resolve_log_dir() {
        Ok(dir) => dir,
        Err(e) if e.is_configuration() => {
            println!("  Log directory: not found");
            println!();
            println!("{}", e);
            return Ok(exit_code::CONFIG_ERROR);
        }
        Err(e) => return Err(e),
    };
    println!("  Log directory: {}", log_dir.display());

    match active_candidate(&log_dir, settings.last_profile()) {
        Some(path) => {
            let name = path.file_name().unwrap_or(path.as_os_str());
            println!("  Active log: {}", name.to_string_lossy());
            if let Some(player) = player_from_log_file(&path) {
                println!("  Character: {}", player);
            }
        }
        None => println!("  Active log: none"),
    }

    let sharing = &settings.sharing;
    let relay = sharing.relay_config();
    println!(
        "  Sharing: {}",
        if sharing.enabled { "enabled" } else { "disabled" }
    );
    if sharing.enabled {
        println!(
            "  Host: {}",
            if relay.host.is_empty() { "(not set)" } else { relay.host.as_str() }
        );
        println!("  Reconnect delay: {}s", sharing.reconnect_delay);
        println!("  Player: {}", sharing.player_name().unwrap_or("(from log file)"));
        if !relay.group_key.is_empty() {
            println!("  Group key: {}", relay.group_key);
        }
    }

    if let Err(e) = relay.validate() {
        println!();
        println!("{}", e);
        return Ok(exit_code::SHARING_HOST_MISSING);
    }

    Ok(exit_code::OK)
}

/// The remembered profile if it still exists, else the most recently written
/// log file.
fn active_candidate(log_dir: &Path, last_profile: Option<&str>) -> Option<PathBuf> {
    if let Some(profile) = last_profile {
        let path = log_dir.join(profile);
        if path.is_file() {
            return Some(path);
        }
    }
    scan_log_files(log_dir)
        .ok()?
        .into_iter()
        .filter_map(|path| {
            let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}
