//! LMU Racing Telemetry monitor
//!
//! Exposes the monitor components for integration testing.

pub mod api;
pub mod config;
pub mod connection;
pub mod console;
pub mod state;
