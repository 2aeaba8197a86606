//! Per-driver statistics
//!
//! Turns the raw per-tick [`CompetitorSnapshot`] stream into monotonic
//! personal-best records. The feed only ever reports absolute state, so lap
//! completion is detected as an edge in `laps_completed` between ticks.

use crate::model::{CompetitorSnapshot, CompetitorStats, VehicleInfo};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Upper bound for a believable time into lap, in seconds
pub const MAX_TIME_INTO_LAP: f64 = 600.0;

/// Car number shown when the vehicle lookup fails
pub const UNKNOWN_VEHICLE_NUMBER: &str = "---";

/// Working memory for the lap in progress
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompetitorLapState {
    /// Max speed in km/h seen during the current, incomplete lap
    pub current_lap_max_speed: f64,
    /// Laps completed as of the previous tick
    pub last_completed_laps: i32,
    /// Last accepted time into lap
    pub last_valid_time_into_lap: f64,
}

impl CompetitorLapState {
    fn new(snapshot: &CompetitorSnapshot) -> Self {
        Self {
            last_completed_laps: snapshot.laps_completed,
            ..Default::default()
        }
    }

    /// Replace an out-of-range time into lap with the last accepted one
    pub fn sanitize_time_into_lap(&mut self, time_into_lap: f64) -> f64 {
        if (0.0..=MAX_TIME_INTO_LAP).contains(&time_into_lap) {
            self.last_valid_time_into_lap = time_into_lap;
            time_into_lap
        } else {
            self.last_valid_time_into_lap
        }
    }
}

/// Per-session statistics for every competitor seen so far
#[derive(Debug, Default)]
pub struct Aggregator {
    lap_states: HashMap<String, CompetitorLapState>,
    stats: HashMap<String, CompetitorStats>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until the competitor's first tick has been ingested
    pub fn is_new(&self, driver_name: &str) -> bool {
        !self.stats.contains_key(driver_name)
    }

    /// Fold one tick into the competitor's statistics
    ///
    /// `vehicle` is only consulted when the competitor is first seen. The
    /// snapshot's `time_into_lap` is overwritten with the sanitized value.
    pub fn ingest(
        &mut self,
        snapshot: &mut CompetitorSnapshot,
        vehicle: Option<&VehicleInfo>,
        now: DateTime<Utc>,
    ) -> &CompetitorStats {
        let key = snapshot.driver_name.clone();

        let lap_state = self
            .lap_states
            .entry(key.clone())
            .or_insert_with(|| CompetitorLapState::new(snapshot));

        snapshot.time_into_lap = lap_state.sanitize_time_into_lap(snapshot.time_into_lap);

        let stats = self.stats.entry(key).or_insert_with(|| {
            let (vehicle_model, vehicle_number) = match vehicle {
                Some(info) if !info.model.is_empty() => (info.model.clone(), info.number.clone()),
                _ => (
                    snapshot.vehicle_name.clone(),
                    UNKNOWN_VEHICLE_NUMBER.to_string(),
                ),
            };
            debug!(
                driver = %snapshot.driver_name,
                model = %vehicle_model,
                "New competitor"
            );
            CompetitorStats {
                vehicle_model,
                vehicle_number,
                ..Default::default()
            }
        });

        stats.driver_name.clone_from(&snapshot.driver_name);
        stats.vehicle_name.clone_from(&snapshot.vehicle_name);
        stats.car_class.clone_from(&snapshot.car_class);
        stats.steam_id = snapshot.steam_id;
        stats.position = snapshot.position;
        stats.laps_completed = snapshot.laps_completed;
        stats.last_update = now;

        let speed = snapshot.car_velocity.magnitude().to_kph().0;
        if speed > stats.max_speed {
            stats.max_speed = speed;
        }
        if speed > lap_state.current_lap_max_speed {
            lap_state.current_lap_max_speed = speed;
        }

        if snapshot.laps_completed > lap_state.last_completed_laps {
            let lap_time = snapshot.last_lap_time;
            if lap_time > 0.0
                && (!stats.has_calculated_best() || lap_time < stats.best_lap_time_calculated)
            {
                let (s1, s2, s3) = split_sectors(
                    lap_time,
                    snapshot.last_sector_time1,
                    snapshot.last_sector_time2,
                );
                stats.best_lap_time_calculated = lap_time;
                stats.best_sector1_calculated = s1;
                stats.best_sector2_calculated = s2;
                stats.best_sector3_calculated = s3;
                stats.max_speed_on_best_lap_calculated = lap_state.current_lap_max_speed;
                debug!(
                    driver = %snapshot.driver_name,
                    lap_time,
                    "New calculated best lap"
                );
            }
            trace!(
                driver = %snapshot.driver_name,
                laps = snapshot.laps_completed,
                "Lap completed"
            );
            lap_state.current_lap_max_speed = speed;
            lap_state.last_completed_laps = snapshot.laps_completed;
        }

        let (s1, s2, s3) = split_sectors(
            snapshot.best_lap_time,
            snapshot.best_lap_sector_time1,
            snapshot.best_lap_sector_time2,
        );
        stats.best_lap_time = snapshot.best_lap_time;
        stats.best_sector1 = s1;
        stats.best_sector2 = s2;
        stats.best_sector3 = s3;

        stats
    }

    pub fn stats(&self) -> &HashMap<String, CompetitorStats> {
        &self.stats
    }

    pub fn get(&self, driver_name: &str) -> Option<&CompetitorStats> {
        self.stats.get(driver_name)
    }

    pub fn lap_state(&self, driver_name: &str) -> Option<&CompetitorLapState> {
        self.lap_states.get(driver_name)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Drop every competitor's stats and lap state
    pub fn clear(&mut self) {
        self.lap_states.clear();
        self.stats.clear();
    }
}

/// Sector durations from cumulative splits: `(split1, split2 - split1, lap - split2)`
pub fn split_sectors(lap_time: f64, split1: f64, split2: f64) -> (f64, f64, f64) {
    (split1, split2 - split1, lap_time - split2)
}
