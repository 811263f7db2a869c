//! Extracts the player's zone and position from log lines.
//!
//! `/loc` prints `Your Location is <y>, <x>, <z>` in game axes; the map axes
//! are both negated, so the published point is `(-x_game, -y_game, z)`.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::bus::{Event, EventBus, SubscriptionId, Topic};
use crate::relay::LocationUpdate;
use crate::watcher::LogLine;

const ZONE_PREFIX: &str = "You have entered ";
const LOCATION_PREFIX: &str = "Your Location is ";
const START_RECORDING: &str = "start_recording_";
const RENAME_RECORDING: &str = "rename_recording_";
const STOP_RECORDING: &str = "stop_recording";

/// Path recording markers typed into chat by the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRecording {
    Start(String),
    Rename(String),
    Stop,
}

/// What a single line meant to the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Ignored,
    ZoneEntered(String),
    Location(LocationUpdate),
    Recording(PathRecording),
}

/// Name from `eqlog_<Name>_<server>.txt`.
pub fn player_from_log_file(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let rest = stem
        .get(..6)
        .filter(|p| p.eq_ignore_ascii_case("eqlog_"))
        .map(|_| &stem[6..])?;
    let name = rest.split('_').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Debug, Default)]
pub struct LocationParser {
    configured_player: Option<String>,
    log_player: Option<String>,
    zone: Option<String>,
    sharing: bool,
}

impl LocationParser {
    pub fn new(player_name: Option<&str>, sharing: bool) -> Self {
        Self {
            configured_player: player_name.map(str::to_string),
            log_player: None,
            zone: None,
            sharing,
        }
    }

    /// Current zone key, lower-cased.
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    /// Configured name, else the one taken from the active log file name.
    pub fn player(&self) -> &str {
        self.configured_player
            .as_deref()
            .or(self.log_player.as_deref())
            .unwrap_or_default()
    }

    pub fn sharing(&self) -> bool {
        self.sharing
    }

    /// Forget per-character state after the active log file changed.
    pub fn reset(&mut self, active: &Path) {
        self.zone = None;
        self.log_player = player_from_log_file(active);
        debug!(path = %active.display(), player = ?self.log_player, "Location parser reset");
    }

    pub fn parse(&mut self, line: &LogLine) -> LineOutcome {
        let text = line.text.as_str();

        if let Some(rest) = text.strip_prefix(ZONE_PREFIX) {
            let zone = rest.trim_end().trim_end_matches('.').to_lowercase();
            if zone.is_empty() {
                return LineOutcome::Ignored;
            }
            self.zone = Some(zone.clone());
            return LineOutcome::ZoneEntered(zone);
        }

        if let Some(rest) = text.strip_prefix(LOCATION_PREFIX) {
            let Some((game_y, game_x, z)) = parse_coordinates(rest) else {
                debug!(line = text, "Unparseable location line");
                return LineOutcome::Ignored;
            };
            return LineOutcome::Location(LocationUpdate {
                player: self.player().to_string(),
                x: -game_x,
                y: -game_y,
                z,
                zone: self.zone.clone().unwrap_or_default(),
                timestamp: line.timestamp,
                extra: Default::default(),
            });
        }

        if let Some(name) = marker_name(text, START_RECORDING) {
            return LineOutcome::Recording(PathRecording::Start(name));
        }
        if let Some(name) = marker_name(text, RENAME_RECORDING) {
            return LineOutcome::Recording(PathRecording::Rename(name));
        }
        if text.starts_with(STOP_RECORDING) {
            return LineOutcome::Recording(PathRecording::Stop);
        }

        LineOutcome::Ignored
    }

    /// Subscribe `parser` to the bus. Locations are republished on
    /// `send_location` while sharing is on.
    pub fn attach(parser: Arc<Mutex<Self>>, bus: &EventBus) -> [SubscriptionId; 2] {
        let on_line = {
            let parser = Arc::clone(&parser);
            let publisher = bus.clone();
            bus.subscribe(Topic::LogLine, move |event| {
                let Event::LogLine(line) = event else { return };
                let (outcome, sharing) = {
                    let mut parser = parser.lock().unwrap_or_else(PoisonError::into_inner);
                    (parser.parse(line), parser.sharing)
                };
                match outcome {
                    LineOutcome::Location(update) => {
                        info!(
                            player = %update.player,
                            zone = %update.zone,
                            x = update.x,
                            y = update.y,
                            z = update.z,
                            "Location"
                        );
                        if sharing {
                            publisher.publish(Event::SendLocation(update));
                        }
                    }
                    LineOutcome::ZoneEntered(zone) => info!(%zone, "Entered zone"),
                    LineOutcome::Recording(command) => debug!(?command, "Path recording marker"),
                    LineOutcome::Ignored => {}
                }
            })
        };

        let on_switch = bus.subscribe(Topic::ActiveFileChanged, move |event| {
            if let Event::ActiveFileChanged(path) = event {
                parser
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .reset(path);
            }
        });

        [on_line, on_switch]
    }
}

fn parse_coordinates(text: &str) -> Option<(f64, f64, f64)> {
    let mut values = text.split(',').map(|v| v.trim().parse::<f64>());
    let first = values.next()?.ok()?;
    let second = values.next()?.ok()?;
    let third = values.next()?.ok()?;
    if values.next().is_some() {
        return None;
    }
    Some((first, second, third))
}

/// `start_recording_my_path` gives `my path`.
fn marker_name(text: &str, prefix: &str) -> Option<String> {
    let word = text.split_whitespace().next()?;
    let name = word.strip_prefix(prefix)?;
    (!name.is_empty()).then(|| name.replace('_', " "))
}
