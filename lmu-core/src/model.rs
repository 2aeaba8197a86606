//! Live standings data model
//!
//! Wire types mirror the JSON pushed by the game's control-panel WebSocket
//! (camelCase keys, every field optional on the wire). Derived types hold
//! what the monitor computes from them.
//!
//! Sector split times in the feed are cumulative from the start of the lap:
//! `sector2 = split2 - split1`, `sector3 = lap - split2`.

use crate::units::MetersPerSecond;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Reads an explicit `null` as the type's default. Missing keys are
/// covered by the container-level `#[serde(default)]`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Vector as sent by the feed: components plus the precomputed magnitude
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarVector {
    /// Magnitude in m/s
    #[serde(deserialize_with = "null_as_default")]
    pub velocity: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub z: f64,
}

impl CarVector {
    pub fn magnitude(&self) -> MetersPerSecond {
        MetersPerSecond(self.velocity)
    }
}

/// Latest raw tick for one competitor
///
/// Replaced wholesale on every `standings` message. `time_into_lap` is
/// overwritten with the sanitized value before the snapshot is published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompetitorSnapshot {
    /// Display name, the identity key within a session
    #[serde(deserialize_with = "null_as_default")]
    pub driver_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub car_class: String,
    #[serde(deserialize_with = "null_as_default")]
    pub vehicle_name: String,
    /// Identifier used by the vehicle metadata lookup
    #[serde(deserialize_with = "null_as_default")]
    pub vehicle_filename: String,
    #[serde(rename = "steamID", deserialize_with = "null_as_default")]
    pub steam_id: i64,
    #[serde(rename = "slotID", deserialize_with = "null_as_default")]
    pub slot_id: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub car_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub full_team_name: String,

    // === Timing ===
    /// 1-based rank
    #[serde(deserialize_with = "null_as_default")]
    pub position: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub laps_completed: i32,
    /// Seconds into the current lap
    #[serde(deserialize_with = "null_as_default")]
    pub time_into_lap: f64,
    /// Last completed lap time, 0 when none yet
    #[serde(deserialize_with = "null_as_default")]
    pub last_lap_time: f64,
    /// Cumulative split at the end of sector 1 of the last lap
    #[serde(deserialize_with = "null_as_default")]
    pub last_sector_time1: f64,
    /// Cumulative split at the end of sector 2 of the last lap
    #[serde(deserialize_with = "null_as_default")]
    pub last_sector_time2: f64,
    /// Provider's best lap
    #[serde(deserialize_with = "null_as_default")]
    pub best_lap_time: f64,
    /// Cumulative split at the end of sector 1 of the provider's best lap
    #[serde(deserialize_with = "null_as_default")]
    pub best_lap_sector_time1: f64,
    /// Cumulative split at the end of sector 2 of the provider's best lap
    #[serde(deserialize_with = "null_as_default")]
    pub best_lap_sector_time2: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub time_behind_leader: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub laps_behind_leader: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub lap_distance: f64,

    // === Motion ===
    #[serde(deserialize_with = "null_as_default")]
    pub car_velocity: CarVector,

    // === Flags and state ===
    #[serde(deserialize_with = "null_as_default")]
    pub pit_state: String,
    #[serde(deserialize_with = "null_as_default")]
    pub flag: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pitstops: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub penalties: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub in_garage_stall: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub finish_status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub player: bool,
}

impl CompetitorSnapshot {
    /// Flag when one is shown (anything other than green), else pit state
    pub fn status(&self) -> &str {
        if !self.flag.is_empty() && self.flag != "green" {
            &self.flag
        } else {
            &self.pit_state
        }
    }
}

/// Session description pushed by `sessionInfo`
///
/// Identity is (track name, session label). The environmental fields are
/// carried for display only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub track_name: String,
    /// Session label, e.g. "RACE1", "QUALIFY1"
    #[serde(deserialize_with = "null_as_default")]
    pub session: String,
    #[serde(deserialize_with = "null_as_default")]
    pub server_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub game_phase: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub ambient_temp: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub track_temp: f64,
    /// Rain level (0.0 to 1.0)
    #[serde(deserialize_with = "null_as_default")]
    pub raining: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub dark_cloud: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub average_path_wetness: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub current_event_time: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub end_event_time: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub number_of_vehicles: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub max_players: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub maximum_laps: i32,
}

impl SessionInfo {
    /// True when both describe the same (track, session) pair
    pub fn same_session(&self, other: &SessionInfo) -> bool {
        self.track_name == other.track_name && self.session == other.session
    }
}

/// Vehicle entry returned by the bulk metadata query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: String,
    /// Hierarchical path, e.g. "Hypercar, Toyota, Toyota GR010, #7"
    pub full_path_tree: String,
    pub number: String,
}

/// Human-readable vehicle identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub model: String,
    pub number: String,
}

/// Durable per-competitor record for one session
///
/// Two independent "best" records are kept: the provider-reported one,
/// copied from every tick, and the calculated one, rebuilt from lap
/// completion edges. A zero time means "none yet".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitorStats {
    pub driver_name: String,
    pub vehicle_name: String,
    pub vehicle_model: String,
    pub vehicle_number: String,
    pub car_class: String,
    pub steam_id: i64,
    pub position: i32,
    pub laps_completed: i32,
    pub last_update: DateTime<Utc>,

    /// Session-wide max speed in km/h
    pub max_speed: f64,

    // === Reported by the provider ===
    pub best_lap_time: f64,
    pub best_sector1: f64,
    pub best_sector2: f64,
    pub best_sector3: f64,

    // === Calculated from lap completions ===
    pub best_lap_time_calculated: f64,
    pub best_sector1_calculated: f64,
    pub best_sector2_calculated: f64,
    pub best_sector3_calculated: f64,
    /// Max speed in km/h reached during the calculated best lap
    pub max_speed_on_best_lap_calculated: f64,
    /// Provider-side max speed on the best lap. The feed carries no such
    /// value, so it stays 0 and the calculated one always stands out.
    pub max_speed_on_best_lap: f64,
}

impl CompetitorStats {
    pub fn has_calculated_best(&self) -> bool {
        self.best_lap_time_calculated > 0.0
    }
}

/// Borrowed view of the live state, handed to the display on every refresh
#[derive(Debug, Clone, Copy)]
pub struct LiveView<'a> {
    pub session: Option<&'a SessionInfo>,
    pub competitors: &'a HashMap<String, CompetitorSnapshot>,
    pub stats: &'a HashMap<String, CompetitorStats>,
}

impl LiveView<'_> {
    pub fn to_snapshot(&self, sequence: u64) -> LiveSnapshot {
        LiveSnapshot {
            sequence,
            published_at: Utc::now(),
            session: self.session.cloned(),
            competitors: self.competitors.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Owned, read-only copy of the live state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveSnapshot {
    /// Monotonic publication counter
    pub sequence: u64,
    pub published_at: DateTime<Utc>,
    pub session: Option<SessionInfo>,
    pub competitors: HashMap<String, CompetitorSnapshot>,
    pub stats: HashMap<String, CompetitorStats>,
}

impl LiveSnapshot {
    /// Competitor snapshots ordered by position
    pub fn standings(&self) -> Vec<&CompetitorSnapshot> {
        let mut list: Vec<_> = self.competitors.values().collect();
        list.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then_with(|| a.driver_name.cmp(&b.driver_name))
        });
        list
    }

    /// Stats ordered by reported best lap; competitors without one last,
    /// ties broken by name
    pub fn stats_by_best_lap(&self) -> Vec<&CompetitorStats> {
        let mut list: Vec<_> = self.stats.values().collect();
        list.sort_by(|a, b| {
            let a_set = a.best_lap_time > 0.0;
            let b_set = b.best_lap_time > 0.0;
            match (a_set, b_set) {
                (true, true) => a
                    .best_lap_time
                    .total_cmp(&b.best_lap_time)
                    .then_with(|| a.driver_name.cmp(&b.driver_name)),
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                (false, false) => a.driver_name.cmp(&b.driver_name),
            }
        });
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_deserializes_camel_case_and_defaults() {
        let json = r#"{
            "driverName": "Alice",
            "carClass": "Hypercar",
            "vehicleFilename": "TOY_GR010_7",
            "steamID": 7656119,
            "slotID": 3,
            "position": 2,
            "lapsCompleted": 4,
            "timeIntoLap": 12.5,
            "bestLapSectorTime1": 31.0,
            "carVelocity": {"velocity": 50.0, "x": 1.0, "y": 0.0, "z": 49.9},
            "unknownField": [1, 2, 3]
        }"#;
        let snapshot: CompetitorSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.driver_name, "Alice");
        assert_eq!(snapshot.steam_id, 7656119);
        assert_eq!(snapshot.slot_id, 3);
        assert_eq!(snapshot.position, 2);
        assert_eq!(snapshot.laps_completed, 4);
        assert_eq!(snapshot.best_lap_sector_time1, 31.0);
        assert_eq!(snapshot.car_velocity.velocity, 50.0);
        // Absent fields fall back to defaults
        assert_eq!(snapshot.last_lap_time, 0.0);
        assert!(snapshot.pit_state.is_empty());
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let json = r#"{
            "driverName": "Bob",
            "fullTeamName": null,
            "steamID": null,
            "position": 3,
            "lastLapTime": null,
            "carVelocity": null
        }"#;
        let snapshot: CompetitorSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.driver_name, "Bob");
        assert_eq!(snapshot.position, 3);
        assert!(snapshot.full_team_name.is_empty());
        assert_eq!(snapshot.steam_id, 0);
        assert_eq!(snapshot.last_lap_time, 0.0);
        assert_eq!(snapshot.car_velocity, CarVector::default());

        let session: SessionInfo =
            serde_json::from_str(r#"{"trackName": "Spa", "serverName": null, "raining": null}"#)
                .unwrap();
        assert_eq!(session.track_name, "Spa");
        assert!(session.server_name.is_empty());
        assert_eq!(session.raining, 0.0);
    }

    #[test]
    fn test_status_prefers_non_green_flag() {
        let mut snapshot = CompetitorSnapshot {
            pit_state: "NONE".to_string(),
            flag: "green".to_string(),
            ..Default::default()
        };
        assert_eq!(snapshot.status(), "NONE");

        snapshot.flag = "blue".to_string();
        assert_eq!(snapshot.status(), "blue");

        snapshot.flag.clear();
        assert_eq!(snapshot.status(), "NONE");
    }

    #[test]
    fn test_same_session_ignores_environment() {
        let a = SessionInfo {
            track_name: "Le Mans".to_string(),
            session: "RACE1".to_string(),
            ambient_temp: 20.0,
            ..Default::default()
        };
        let mut b = a.clone();
        b.ambient_temp = 25.0;
        b.raining = 0.4;
        b.current_event_time = 1234.0;
        assert!(a.same_session(&b));

        b.session = "QUALIFY1".to_string();
        assert!(!a.same_session(&b));
    }

    #[test]
    fn test_stats_by_best_lap_orders_unset_last() {
        let mut snapshot = LiveSnapshot::default();
        for (name, best) in [("Carol", 0.0), ("Bob", 96.0), ("Alice", 95.2), ("Dave", 0.0)] {
            snapshot.stats.insert(
                name.to_string(),
                CompetitorStats {
                    driver_name: name.to_string(),
                    best_lap_time: best,
                    ..Default::default()
                },
            );
        }
        let names: Vec<_> = snapshot
            .stats_by_best_lap()
            .iter()
            .map(|s| s.driver_name.as_str())
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol", "Dave"]);
    }

    #[test]
    fn test_standings_sorted_by_position() {
        let mut snapshot = LiveSnapshot::default();
        for (name, pos) in [("Alice", 3), ("Bob", 1), ("Carol", 2)] {
            snapshot.competitors.insert(
                name.to_string(),
                CompetitorSnapshot {
                    driver_name: name.to_string(),
                    position: pos,
                    ..Default::default()
                },
            );
        }
        let names: Vec<_> = snapshot
            .standings()
            .iter()
            .map(|s| s.driver_name.as_str())
            .collect();
        assert_eq!(names, vec!["Bob", "Carol", "Alice"]);
    }
}
