//! Location payloads and the JSON frames exchanged with the sharing server.
//!
//! Outbound: `{"type": "location", "group_key": "...", "location": {...}}`
//! Inbound:  `{"type": "state", "locations": {zone: {player: {...}}}}`
//!
//! Frames with any other `type` are ignored.
//!
//! Inbound tables are normalised on decode: entries missing `player` or
//! `zone` get them from the table keys, and fields this client doesn't know
//! are carried along in `extra` so re-encoding keeps them. Timestamps are
//! written with at most microsecond precision.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// One player's position at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    #[serde(default)]
    pub player: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub zone: String,
    /// Local wall-clock time of the observation.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
    /// Fields sent by peers that this client doesn't interpret.
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &NaiveDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    timestamp.trunc_subsecs(6).serialize(serializer)
}

/// Latest known position per player, per zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationTable(BTreeMap<String, BTreeMap<String, LocationUpdate>>);

impl LocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn zone(&self, zone: &str) -> Option<&BTreeMap<String, LocationUpdate>> {
        self.0.get(zone)
    }

    pub fn get(&self, zone: &str, player: &str) -> Option<&LocationUpdate> {
        self.0.get(zone).and_then(|players| players.get(player))
    }

    /// Store `update` under its zone and player, replacing any older entry.
    pub fn insert(&mut self, update: LocationUpdate) {
        self.0
            .entry(update.zone.clone())
            .or_default()
            .insert(update.player.clone(), update);
    }

    /// Players in `zone` other than `me` (compared case-insensitively).
    ///
    /// Anyone a consumer shows in `zone` who is missing here has left it.
    pub fn others_in_zone<'a>(
        &'a self,
        zone: &str,
        me: &'a str,
    ) -> impl Iterator<Item = &'a LocationUpdate> + 'a {
        self.0
            .get(zone)
            .into_iter()
            .flat_map(|players| players.iter())
            .filter(move |(name, _)| !name.eq_ignore_ascii_case(me))
            .map(|(_, update)| update)
    }

    /// Fill in `player` and `zone` from the table keys where a peer left them
    /// out of the entry itself.
    fn fill_keys(mut self) -> Self {
        for (zone, players) in self.0.iter_mut() {
            for (player, update) in players.iter_mut() {
                if update.zone.is_empty() {
                    update.zone = zone.clone();
                }
                if update.player.is_empty() {
                    update.player = player.clone();
                }
            }
        }
        self
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage<'a> {
    Location {
        group_key: &'a str,
        location: &'a LocationUpdate,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ServerMessage {
    State {
        locations: LocationTable,
    },
    #[serde(other)]
    Unknown,
}

/// Serialize a location frame.
pub fn encode_location(group_key: &str, location: &LocationUpdate) -> serde_json::Result<String> {
    serde_json::to_string(&ClientMessage::Location {
        group_key,
        location,
    })
}

/// Decode a server frame. `Ok(None)` for well-formed frames of a type we
/// don't handle.
pub fn decode_server_message(text: &str) -> serde_json::Result<Option<LocationTable>> {
    match serde_json::from_str::<ServerMessage>(text)? {
        ServerMessage::State { locations } => Ok(Some(locations.fill_keys())),
        ServerMessage::Unknown => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn update(player: &str, zone: &str, x: f64) -> LocationUpdate {
        LocationUpdate {
            player: player.to_string(),
            x,
            y: -200.0,
            z: 3.5,
            zone: zone.to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_milli_opt(0, 0, 1, 250)
                .unwrap(),
            extra: Map::new(),
        }
    }

    #[test]
    fn location_frame_shape() {
        let text = encode_location("guild", &update("Bob", "west freeport", -100.0)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "location",
                "group_key": "guild",
                "location": {
                    "player": "Bob",
                    "x": -100.0,
                    "y": -200.0,
                    "z": 3.5,
                    "zone": "west freeport",
                    "timestamp": "2024-01-01T00:00:01.250"
                }
            })
        );
    }

    #[test]
    fn decodes_state_frame() {
        let text = r#"{"type": "state", "locations": {
            "west freeport": {
                "Alice": {"x": 1.0, "y": 2.0, "z": 3.0, "zone": "west freeport",
                          "player": "Alice", "timestamp": "2024-01-01T00:00:01.123456"},
                "Carol": {"x": 4.0, "y": 5.0, "z": 6.0, "timestamp": "2024-01-01T00:00:02"}
            }
        }}"#;
        let table = decode_server_message(text).unwrap().unwrap();

        let carol = table.get("west freeport", "Carol").unwrap();
        assert_eq!(carol.player, "Carol");
        assert_eq!(carol.zone, "west freeport");
        assert_eq!(table.get("west freeport", "Alice").unwrap().x, 1.0);
        assert_eq!(table.zones().collect::<Vec<_>>(), vec!["west freeport"]);
    }

    #[test]
    fn unknown_type_is_ignored() {
        assert!(decode_server_message(r#"{"type": "foo"}"#).unwrap().is_none());
        assert!(decode_server_message(r#"{"type": "location", "x": 1}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(decode_server_message("not json").is_err());
        assert!(decode_server_message(r#"{"locations": {}}"#).is_err());
        assert!(decode_server_message(r#"{"type": "state", "locations": 5}"#).is_err());
    }

    #[test]
    fn insert_overwrites_same_player_and_zone() {
        let mut table = LocationTable::new();
        table.insert(update("Bob", "qeynos", 1.0));
        table.insert(update("Bob", "qeynos", 2.0));
        table.insert(update("Bob", "freeport", 3.0));

        assert_eq!(table.zone("qeynos").unwrap().len(), 1);
        assert_eq!(table.get("qeynos", "Bob").unwrap().x, 2.0);
        assert_eq!(table.get("freeport", "Bob").unwrap().x, 3.0);
    }

    #[test]
    fn others_in_zone_excludes_self() {
        let mut table = LocationTable::new();
        table.insert(update("Bob", "qeynos", 1.0));
        table.insert(update("Alice", "qeynos", 2.0));
        table.insert(update("Carol", "freeport", 3.0));

        let others: Vec<_> = table.others_in_zone("qeynos", "bob").map(|u| &u.player).collect();
        assert_eq!(others, vec!["Alice"]);
        assert_eq!(table.others_in_zone("nowhere", "bob").count(), 0);
    }

    #[test]
    fn timestamp_has_at_most_microseconds() {
        let mut location = update("Bob", "qeynos", 1.0);
        location.timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_nano_opt(0, 0, 1, 123_456_789)
            .unwrap();

        let text = encode_location("guild", &location).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let timestamp = value["location"]["timestamp"].as_str().unwrap();
        assert_eq!(timestamp, "2024-01-01T00:00:01.123456");
        let fraction = timestamp.rsplit('.').next().unwrap();
        assert!(fraction.len() <= 6);
    }

    #[test]
    fn unknown_entry_fields_survive_reencoding() {
        let text = r#"{"type": "state", "locations": {"qeynos": {"Alice": {
            "x": 1.0, "y": 2.0, "z": 3.0, "timestamp": "2024-01-01T00:00:01",
            "heading": 90, "class": "Ranger"}}}}"#;
        let table = decode_server_message(text).unwrap().unwrap();
        let alice = table.get("qeynos", "Alice").unwrap();
        assert_eq!(alice.extra["heading"], 90);
        assert_eq!(alice.extra["class"], "Ranger");

        let frame = encode_location("guild", alice).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["location"]["heading"], 90);
        assert_eq!(value["location"]["player"], "Alice");
    }
}
