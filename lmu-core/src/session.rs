//! Session boundary detection
//!
//! A session is identified by (track name, session label). When that pair
//! changes, the active result sink is closed, all derived competitor state is
//! reset, and a fresh sink is opened for the new session.

use crate::model::{CompetitorStats, SessionInfo};
use crate::sink::{ResultSink, ResultSinkFactory};
use tracing::{info, warn};

/// Outcome of observing a `sessionInfo` message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Unchanged,
    Changed,
}

/// Tracks the current session and owns its result sink
pub struct SessionTracker {
    session: Option<SessionInfo>,
    factory: Box<dyn ResultSinkFactory>,
    sink: Option<Box<dyn ResultSink>>,
}

impl SessionTracker {
    pub fn new(factory: Box<dyn ResultSinkFactory>) -> Self {
        Self {
            session: None,
            factory,
            sink: None,
        }
    }

    /// Store the latest session description
    ///
    /// On a transition, `reset` runs after the old sink is closed and before
    /// the new one is opened. Environmental changes alone only refresh the
    /// stored snapshot.
    pub fn observe(&mut self, session: SessionInfo, reset: impl FnOnce()) -> SessionChange {
        let change = match &self.session {
            Some(current) if current.same_session(&session) => SessionChange::Unchanged,
            _ => SessionChange::Changed,
        };

        if change == SessionChange::Changed {
            if self.sink.is_some() {
                self.close_sink();
                info!("Previous result file closed due to session change");
            }
            reset();
            info!(
                track = %session.track_name,
                session = %session.session,
                "Session changed, all driver data reset"
            );
        }

        self.session = Some(session);
        self.ensure_sink();
        change
    }

    /// Open a sink for the current session if none is active
    fn ensure_sink(&mut self) {
        if self.sink.is_some() {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        match self.factory.open(session) {
            Ok(sink) => {
                info!(
                    "Result logging initialized for {} - {}",
                    session.track_name, session.session
                );
                self.sink = Some(sink);
            }
            Err(e) => warn!("Failed to open result file: {:#}", e),
        }
    }

    /// Forward updated stats to the active sink; failures are logged only
    pub fn record(&mut self, stats: &CompetitorStats) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.update(stats) {
                warn!(driver = %stats.driver_name, "Failed to write result file: {:#}", e);
            }
        }
    }

    /// Close the active sink, if any
    pub fn close_sink(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                warn!("Error closing result file: {:#}", e);
            }
        }
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }
}
