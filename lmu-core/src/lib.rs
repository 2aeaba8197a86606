//! LMU Racing Telemetry core library
//!
//! This crate provides the live standings data model and the ingestion path
//! that turns the raw control-panel stream into per-driver statistics:
//! envelope decoding, session boundary detection, lap/sector aggregation and
//! vehicle metadata lookup. It performs no I/O of its own; collaborators are
//! plugged in through the traits in [`sink`] and [`vehicles`].

pub mod dispatch;
pub mod message;
pub mod model;
pub mod session;
pub mod sink;
pub mod stats;
pub mod units;
pub mod vehicles;

pub use dispatch::{Dispatcher, Outcome};
pub use message::{DecodeError, Message};
pub use model::{CompetitorSnapshot, CompetitorStats, LiveSnapshot, LiveView, SessionInfo};
pub use sink::{DisplaySink, ResultSink, ResultSinkFactory};
pub use vehicles::{VehicleCache, VehicleSource};
