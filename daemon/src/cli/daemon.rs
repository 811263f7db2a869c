//! Foreground service: tail logs and share locations until Ctrl-C.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use nparse::parsers::LocationParser;
use nparse::relay::{LocationRelay, WsConnector};
use nparse::watcher::{watch_directory, LogDirectoryWatcher};
use nparse::{Error, Event, EventBus, Service, Settings, Topic};

/// Run until interrupted.
pub async fn run(config: Option<PathBuf>) -> Result<(), Error> {
    let settings_path = super::settings_path(config)?;
    let settings = Settings::load(&settings_path)?;
    let log_dir = settings.resolve_log_dir()?;
    let relay_config = settings.sharing.relay_config();
    if let Err(e) = relay_config.validate() {
        warn!(error = %e, "Location sharing stays off");
    }

    let bus = EventBus::new();
    bus.subscribe(Topic::LogLine, |event| {
        if let Event::LogLine(line) = event {
            debug!(text = %line.text, "Log line");
        }
    });
    bus.subscribe(Topic::LocationsUpdated, |event| {
        if let Event::LocationsUpdated(table) = event {
            for zone in table.zones() {
                let players = table.zone(zone).map(|p| p.len()).unwrap_or(0);
                info!(%zone, players, "Shared locations");
            }
        }
    });

    let parser = Arc::new(Mutex::new(LocationParser::new(
        settings.sharing.player_name(),
        relay_config.enabled,
    )));
    LocationParser::attach(Arc::clone(&parser), &bus);

    let watcher = LogDirectoryWatcher::open(&log_dir, settings.last_profile(), bus.clone())?;
    if let Some(active) = watcher.active_path() {
        if let Ok(mut parser) = parser.lock() {
            parser.reset(active);
        }
    }
    // Dropping the OS watcher ends notifications, so it lives as long as the
    // service runs.
    let (_os_watcher, notifications) = watch_directory(watcher.log_dir())?;

    let (relay, inbound) = LocationRelay::start(WsConnector, relay_config);
    let service = Service::new(bus, watcher, relay, inbound);

    info!(
        settings = %settings_path.display(),
        log_dir = %log_dir.display(),
        "nparse running, Ctrl-C to stop"
    );
    service
        .run(notifications, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
