//! Unit conversions and time formatting
//!
//! The feed reports durations in seconds and velocities in meters per
//! second. Displays and result files want km/h and `M:SS.mmm`.

use serde::{Deserialize, Serialize};

/// Conversion factor from m/s to km/h
pub const MPS_TO_KPH: f64 = 3.6;

/// Tolerance used when comparing reported and calculated times
pub const TIME_EPSILON: f64 = 0.001;

/// Meters per second
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct MetersPerSecond(pub f64);

impl MetersPerSecond {
    pub fn to_kph(self) -> KilometersPerHour {
        KilometersPerHour(self.0 * MPS_TO_KPH)
    }
}

/// Kilometers per hour
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct KilometersPerHour(pub f64);

/// Format a duration in seconds as `M:SS.mmm`
///
/// Non-positive durations mean "not set" in the feed and render as `N/A`.
pub fn format_lap_time(seconds: f64) -> String {
    if seconds.is_nan() || seconds <= 0.0 {
        return "N/A".to_string();
    }
    let minutes = (seconds / 60.0).floor();
    let secs = seconds - minutes * 60.0;
    format!("{}:{:06.3}", minutes as u64, secs)
}

/// True when two times disagree by more than [`TIME_EPSILON`]
///
/// Two unset values (both zero) never disagree.
pub fn times_differ(a: f64, b: f64) -> bool {
    if a == 0.0 && b == 0.0 {
        return false;
    }
    (a - b).abs() > TIME_EPSILON
}
