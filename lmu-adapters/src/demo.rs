//! Demo feed that generates a synthetic control-panel stream
//!
//! Simulates a small field lapping a circuit of straights, braking zones and
//! corners split into three sectors. Produces the same JSON envelopes the
//! game pushes over its WebSocket, including the occasional out-of-range
//! `timeIntoLap` glitch, so the whole pipeline can run without a game.

use lmu_core::message::{SESSION_INFO, STANDINGS};
use lmu_core::model::{CarVector, CompetitorSnapshot, SessionInfo};
use serde_json::json;

/// Ticks per second the game pushes standings at
pub const TICK_RATE: u32 = 5;

/// A `sessionInfo` frame is emitted every this many ticks
const SESSION_EVERY: u64 = TICK_RATE as u64;

/// Glitched `timeIntoLap` is sent on ticks divisible by this
const GLITCH_EVERY: u64 = 97;

// =============================================================================
// Track definition
// =============================================================================

#[derive(Clone, Copy)]
struct TrackSegment {
    sector: u8,
    duration: f64,     // seconds at reference pace
    target_speed: f64, // m/s at end of segment
}

/// ~86s lap, three sectors of roughly equal length
fn demo_track() -> Vec<TrackSegment> {
    vec![
        // Sector 1: start/finish straight into a slow right-hander
        TrackSegment { sector: 1, duration: 8.0, target_speed: 75.0 },
        TrackSegment { sector: 1, duration: 3.0, target_speed: 28.0 },
        TrackSegment { sector: 1, duration: 4.0, target_speed: 25.0 },
        TrackSegment { sector: 1, duration: 3.5, target_speed: 55.0 },
        TrackSegment { sector: 1, duration: 10.0, target_speed: 80.0 },
        // Sector 2: chicane and back straight
        TrackSegment { sector: 2, duration: 2.5, target_speed: 35.0 },
        TrackSegment { sector: 2, duration: 4.0, target_speed: 31.0 },
        TrackSegment { sector: 2, duration: 3.0, target_speed: 50.0 },
        TrackSegment { sector: 2, duration: 12.0, target_speed: 88.0 },
        TrackSegment { sector: 2, duration: 6.0, target_speed: 68.0 },
        // Sector 3: sweeper, hairpin, run to the line
        TrackSegment { sector: 3, duration: 5.0, target_speed: 50.0 },
        TrackSegment { sector: 3, duration: 3.5, target_speed: 22.0 },
        TrackSegment { sector: 3, duration: 4.5, target_speed: 20.0 },
        TrackSegment { sector: 3, duration: 4.0, target_speed: 55.0 },
        TrackSegment { sector: 3, duration: 8.0, target_speed: 75.0 },
    ]
}

/// Speed in m/s at a point of the reference lap
fn speed_at(track: &[TrackSegment], reference_time: f64) -> f64 {
    let mut elapsed = 0.0;
    for (i, seg) in track.iter().enumerate() {
        if reference_time < elapsed + seg.duration || i == track.len() - 1 {
            let prev = if i > 0 {
                track[i - 1].target_speed
            } else {
                track[track.len() - 1].target_speed
            };
            let t = ((reference_time - elapsed) / seg.duration).clamp(0.0, 1.0);
            return lerp(prev, seg.target_speed, smoothstep(t));
        }
        elapsed += seg.duration;
    }
    0.0
}

/// Cumulative reference time at the end of sectors 1 and 2
fn sector_splits(track: &[TrackSegment]) -> (f64, f64) {
    let through = |sector: u8| -> f64 {
        track
            .iter()
            .filter(|s| s.sector <= sector)
            .map(|s| s.duration)
            .sum()
    };
    (through(1), through(2))
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Simple deterministic noise from a seed
fn noise(seed: f64) -> f64 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f64, amplitude: f64) -> f64 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

// =============================================================================
// Field
// =============================================================================

struct DemoCar {
    name: &'static str,
    class: &'static str,
    vehicle_name: &'static str,
    vehicle_filename: &'static str,
    steam_id: i64,
    /// Base pace multiplier, 1.0 = reference lap
    pace: f64,
    /// Pace multiplier for the lap in progress
    lap_scale: f64,
    time_into_lap: f64,
    laps_completed: i32,
    last_lap: f64,
    last_splits: (f64, f64),
    best_lap: f64,
    best_splits: (f64, f64),
}

impl DemoCar {
    fn new(
        name: &'static str,
        class: &'static str,
        vehicle_name: &'static str,
        vehicle_filename: &'static str,
        steam_id: i64,
        pace: f64,
        grid_offset: f64,
    ) -> Self {
        Self {
            name,
            class,
            vehicle_name,
            vehicle_filename,
            steam_id,
            pace,
            lap_scale: pace,
            time_into_lap: grid_offset,
            laps_completed: 0,
            last_lap: 0.0,
            last_splits: (0.0, 0.0),
            best_lap: 0.0,
            best_splits: (0.0, 0.0),
        }
    }

    fn progress(&self, reference_lap: f64) -> f64 {
        self.laps_completed as f64 + self.time_into_lap / (reference_lap * self.lap_scale)
    }
}

/// Synthetic stream source
pub struct DemoFeed {
    track: Vec<TrackSegment>,
    reference_lap: f64,
    splits: (f64, f64),
    cars: Vec<DemoCar>,
    session: SessionInfo,
    tick: u64,
}

impl DemoFeed {
    pub fn new() -> Self {
        let track = demo_track();
        let reference_lap = track.iter().map(|s| s.duration).sum();
        let splits = sector_splits(&track);

        let cars = vec![
            DemoCar::new("Alice Martin", "Hypercar", "Toyota GR010 #7", "TOY_GR010_7", 76561198000000001, 1.000, 0.0),
            DemoCar::new("Bruno Costa", "Hypercar", "Ferrari 499P #51", "FER_499P_51", 76561198000000002, 1.004, 0.4),
            DemoCar::new("Chloe Weber", "Hypercar", "Porsche 963 #6", "POR_963_6", 76561198000000003, 1.009, 0.8),
            DemoCar::new("Daniel Ito", "LMP2", "Oreca 07 #22", "ORE_07_22", 76561198000000004, 1.060, 1.2),
            DemoCar::new("Emma Novak", "GT3", "Porsche 911 GT3 R #92", "POR_992_92", 76561198000000005, 1.120, 1.6),
        ];

        let session = SessionInfo {
            track_name: "Demo Circuit".to_string(),
            session: "RACE1".to_string(),
            server_name: "Demo".to_string(),
            game_phase: 5,
            ambient_temp: 22.0,
            track_temp: 31.0,
            number_of_vehicles: cars.len() as i32,
            max_players: 30,
            end_event_time: 3600.0,
            ..Default::default()
        };

        Self {
            track,
            reference_lap,
            splits,
            cars,
            session,
            tick: 0,
        }
    }

    /// Reference lap time in seconds (pace multiplier 1.0)
    pub fn reference_lap_time(&self) -> f64 {
        self.reference_lap
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    /// Advance the simulation by `dt` seconds and return the frames the game
    /// would push for this tick: a periodic `sessionInfo`, then `standings`
    pub fn tick(&mut self, dt: f64) -> Vec<String> {
        let mut frames = Vec::with_capacity(2);
        if self.tick % SESSION_EVERY == 0 {
            frames.push(self.session_frame());
        }
        frames.push(self.standings_frame(dt));
        frames
    }

    pub fn session_frame(&self) -> String {
        json!({ "type": SESSION_INFO, "body": self.session }).to_string()
    }

    /// Advance by `dt` seconds and encode the resulting standings
    pub fn standings_frame(&mut self, dt: f64) -> String {
        self.advance(dt);
        json!({ "type": STANDINGS, "body": self.snapshots() }).to_string()
    }

    fn advance(&mut self, dt: f64) {
        self.tick += 1;
        self.session.current_event_time += dt;

        for (idx, car) in self.cars.iter_mut().enumerate() {
            car.time_into_lap += dt;
            let lap_length = self.reference_lap * car.lap_scale;
            if car.time_into_lap >= lap_length {
                let splits = (self.splits.0 * car.lap_scale, self.splits.1 * car.lap_scale);
                car.last_lap = lap_length;
                car.last_splits = splits;
                if car.best_lap == 0.0 || lap_length < car.best_lap {
                    car.best_lap = lap_length;
                    car.best_splits = splits;
                }
                car.laps_completed += 1;
                car.time_into_lap -= lap_length;

                let seed = car.laps_completed as f64 * 7.31 + idx as f64 * 3.7;
                car.lap_scale = car.pace * (1.0 + jitter(seed, 0.01));
            }
        }
    }

    fn snapshots(&self) -> Vec<CompetitorSnapshot> {
        let mut order: Vec<usize> = (0..self.cars.len()).collect();
        order.sort_by(|&a, &b| {
            self.cars[b]
                .progress(self.reference_lap)
                .total_cmp(&self.cars[a].progress(self.reference_lap))
        });

        order
            .iter()
            .enumerate()
            .map(|(rank, &idx)| {
                let car = &self.cars[idx];
                let speed =
                    speed_at(&self.track, car.time_into_lap / car.lap_scale) / car.lap_scale;
                let glitch = (self.tick + idx as u64) % GLITCH_EVERY == 0;

                CompetitorSnapshot {
                    driver_name: car.name.to_string(),
                    car_class: car.class.to_string(),
                    vehicle_name: car.vehicle_name.to_string(),
                    vehicle_filename: car.vehicle_filename.to_string(),
                    steam_id: car.steam_id,
                    slot_id: idx as i32,
                    position: rank as i32 + 1,
                    laps_completed: car.laps_completed,
                    time_into_lap: if glitch { -1.0 } else { car.time_into_lap },
                    last_lap_time: car.last_lap,
                    last_sector_time1: car.last_splits.0,
                    last_sector_time2: car.last_splits.1,
                    best_lap_time: car.best_lap,
                    best_lap_sector_time1: car.best_splits.0,
                    best_lap_sector_time2: car.best_splits.1,
                    car_velocity: CarVector {
                        velocity: speed,
                        z: speed,
                        ..Default::default()
                    },
                    pit_state: "NONE".to_string(),
                    flag: "green".to_string(),
                    finish_status: "FSTAT_NONE".to_string(),
                    ..Default::default()
                }
            })
            .collect()
    }
}

impl Default for DemoFeed {
    fn default() -> Self {
        Self::new()
    }
}
