//! Output collaborators
//!
//! Result sinks persist per-competitor records for one session; display
//! sinks receive the whole live state after every processed message.

use crate::model::{CompetitorStats, LiveView, SessionInfo};
use anyhow::Result;

/// Per-session result writer
pub trait ResultSink: Send {
    /// Record the latest stats for one competitor
    fn update(&mut self, stats: &CompetitorStats) -> Result<()>;

    /// Flush and release the sink
    fn close(&mut self) -> Result<()>;
}

/// Opens a result sink scoped to one (track, session) pair
pub trait ResultSinkFactory: Send + Sync {
    fn open(&self, session: &SessionInfo) -> Result<Box<dyn ResultSink>>;
}

/// Receiver of display refreshes
pub trait DisplaySink: Send {
    fn refresh(&mut self, view: LiveView<'_>);
}

/// Factory that never opens a sink
pub struct NoResults;

impl ResultSinkFactory for NoResults {
    fn open(&self, _session: &SessionInfo) -> Result<Box<dyn ResultSink>> {
        Ok(Box::new(DiscardResults))
    }
}

/// Sink that drops every record
pub struct DiscardResults;

impl ResultSink for DiscardResults {
    fn update(&mut self, _stats: &CompetitorStats) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
