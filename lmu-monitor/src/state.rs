//! Application state shared with readers
//!
//! The ingestion task owns all live state. Readers (console, HTTP handlers)
//! only see immutable snapshots published through single-slot watch
//! channels.

use crate::connection::ConnectionState;
use lmu_core::model::{LiveSnapshot, LiveView};
use lmu_core::DisplaySink;
use std::sync::Arc;
use tokio::sync::watch;

/// Read side handed to the console and the HTTP API
#[derive(Clone)]
pub struct AppState {
    /// Latest published live state
    pub snapshots: watch::Receiver<Arc<LiveSnapshot>>,

    /// Current state of the stream connection
    pub connection: watch::Receiver<ConnectionState>,
}

impl AppState {
    /// Create the channels; the returned publishers belong to the ingestion task
    pub fn new() -> (Self, WatchDisplay, watch::Sender<ConnectionState>) {
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(LiveSnapshot::default()));
        let (connection_tx, connection) = watch::channel(ConnectionState::Disconnected);

        let state = Self {
            snapshots,
            connection,
        };
        (state, WatchDisplay::new(snapshot_tx), connection_tx)
    }

    /// Latest snapshot, without marking it seen
    pub fn snapshot(&self) -> Arc<LiveSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }
}

/// Display sink that publishes every refresh as a new snapshot
pub struct WatchDisplay {
    tx: watch::Sender<Arc<LiveSnapshot>>,
    sequence: u64,
}

impl WatchDisplay {
    pub fn new(tx: watch::Sender<Arc<LiveSnapshot>>) -> Self {
        Self { tx, sequence: 0 }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl DisplaySink for WatchDisplay {
    fn refresh(&mut self, view: LiveView<'_>) {
        self.sequence += 1;
        // Replaced even with no receivers so late subscribers see the latest
        self.tx.send_replace(Arc::new(view.to_snapshot(self.sequence)));
    }
}
