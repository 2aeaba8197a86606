//! Read-only REST API and SSE routes over the published snapshot

use crate::connection::ConnectionState;
use crate::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use lmu_core::model::{CompetitorSnapshot, CompetitorStats, SessionInfo};
use serde::Serialize;
use std::convert::Infallible;
use tokio_stream::wrappers::WatchStream;
use tower_http::cors::CorsLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/session", get(session))
        .route("/api/standings", get(standings))
        .route("/api/stats", get(stats))
        .route("/api/stream", get(stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    connection: ConnectionState,
    sequence: u64,
    track: Option<String>,
    session: Option<String>,
    competitors: usize,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.snapshot();
    Json(StatusResponse {
        connection: state.connection_state(),
        sequence: snapshot.sequence,
        track: snapshot.session.as_ref().map(|s| s.track_name.clone()),
        session: snapshot.session.as_ref().map(|s| s.session.clone()),
        competitors: snapshot.competitors.len(),
    })
}

async fn session(State(state): State<AppState>) -> Json<Option<SessionInfo>> {
    Json(state.snapshot().session.clone())
}

async fn standings(State(state): State<AppState>) -> Json<Vec<CompetitorSnapshot>> {
    let snapshot = state.snapshot();
    Json(snapshot.standings().into_iter().cloned().collect())
}

async fn stats(State(state): State<AppState>) -> Json<Vec<CompetitorStats>> {
    let snapshot = state.snapshot();
    Json(snapshot.stats_by_best_lap().into_iter().cloned().collect())
}

/// One JSON snapshot per publication, starting with the current one
async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.snapshots.clone()).filter_map(|snapshot| async move {
        match serde_json::to_string(snapshot.as_ref()) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(e) => {
                tracing::error!("Failed to serialize snapshot: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
