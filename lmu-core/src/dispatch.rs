//! Message dispatch
//!
//! The [`Dispatcher`] is the single owner of all live state. It decodes raw
//! frames, routes them to the session tracker or the stats aggregator, and
//! refreshes the display after every frame, whatever its type.

use crate::message::{DecodeError, Message};
use crate::model::{CompetitorSnapshot, LiveView, SessionInfo};
use crate::session::{SessionChange, SessionTracker};
use crate::sink::{DisplaySink, ResultSinkFactory};
use crate::stats::Aggregator;
use crate::vehicles::{VehicleCache, VehicleSource};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, warn};

/// What happened to one raw frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Standings { competitors: usize },
    Session(SessionChange),
    Ignored,
    Unknown(String),
    /// The frame could not be decoded and was dropped
    Dropped,
}

pub struct Dispatcher {
    tracker: SessionTracker,
    aggregator: Aggregator,
    vehicles: VehicleCache,
    competitors: HashMap<String, CompetitorSnapshot>,
    display: Box<dyn DisplaySink>,
}

impl Dispatcher {
    pub fn new(
        vehicles: Box<dyn VehicleSource>,
        results: Box<dyn ResultSinkFactory>,
        display: Box<dyn DisplaySink>,
    ) -> Self {
        Self::with_cache(VehicleCache::new(vehicles), results, display)
    }

    pub fn with_cache(
        vehicles: VehicleCache,
        results: Box<dyn ResultSinkFactory>,
        display: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            tracker: SessionTracker::new(results),
            aggregator: Aggregator::new(),
            vehicles,
            competitors: HashMap::new(),
            display,
        }
    }

    /// Process one raw frame; never fails
    pub async fn dispatch(&mut self, raw: &str) -> Outcome {
        let outcome = match Message::decode(raw) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                log_decode_error(&e);
                Outcome::Dropped
            }
        };
        self.refresh_display();
        outcome
    }

    async fn handle(&mut self, message: Message) -> Outcome {
        match message {
            Message::Standings(list) => {
                let competitors = list.len();
                for snapshot in list {
                    self.ingest(snapshot).await;
                }
                Outcome::Standings { competitors }
            }
            Message::SessionInfo(session) => Outcome::Session(self.observe_session(session)),
            Message::StandingsHistory => Outcome::Ignored,
            Message::Unknown { kind, body } => {
                warn!("Unsupported message type: {}, body: {}", kind, body);
                Outcome::Unknown(kind)
            }
        }
    }

    async fn ingest(&mut self, mut snapshot: CompetitorSnapshot) {
        let vehicle = if self.aggregator.is_new(&snapshot.driver_name) {
            self.vehicles.resolve(&snapshot.vehicle_filename).await
        } else {
            None
        };

        let stats = self
            .aggregator
            .ingest(&mut snapshot, vehicle.as_ref(), Utc::now());
        self.tracker.record(stats);
        self.competitors
            .insert(snapshot.driver_name.clone(), snapshot);
    }

    fn observe_session(&mut self, session: SessionInfo) -> SessionChange {
        let aggregator = &mut self.aggregator;
        let competitors = &mut self.competitors;
        self.tracker.observe(session, || {
            aggregator.clear();
            competitors.clear();
        })
    }

    fn refresh_display(&mut self) {
        let view = LiveView {
            session: self.tracker.session(),
            competitors: &self.competitors,
            stats: self.aggregator.stats(),
        };
        self.display.refresh(view);
    }

    /// Close the active result sink before exit
    pub fn shutdown(&mut self) {
        info!("Shutting down dispatcher");
        self.tracker.close_sink();
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.tracker.session()
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn competitors(&self) -> &HashMap<String, CompetitorSnapshot> {
        &self.competitors
    }
}

fn log_decode_error(e: &DecodeError) {
    match e {
        DecodeError::Envelope(_) => warn!("Error unmarshaling WebSocket message: {}", e),
        DecodeError::Body { kind, .. } => warn!(kind = *kind, "Dropping message: {}", e),
    }
}
