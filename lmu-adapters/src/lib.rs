//! Game-side collaborators for LMU Racing Telemetry
//!
//! Concrete implementations of the core's plug-in traits: the REST vehicle
//! lookup, the per-session result file, and a synthetic feed for running
//! without the game.

pub mod demo;
pub mod rest;
pub mod results;

pub use demo::DemoFeed;
pub use rest::RestVehicleSource;
pub use results::{ResultFile, ResultFileFactory};
