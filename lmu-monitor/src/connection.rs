//! Stream connection manager
//!
//! Owns the WebSocket to the game's control panel. Connects, forwards every
//! frame to the [`Dispatcher`], and reconnects with exponential backoff
//! until cancelled. The state machine is
//! `Disconnected -> Connecting -> Connected -> Disconnected`.

use futures::StreamExt;
use lmu_adapters::DemoFeed;
use lmu_core::Dispatcher;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const BACKOFF_MULTIPLIER: f64 = 1.5;
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to WebSocket {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("WebSocket read error: {0}")]
    Read(#[source] tungstenite::Error),
}

/// Delay between reconnection attempts
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            initial,
            multiplier,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; grows the next one, capped at the maximum
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.multiplier).min(self.max);
        delay
    }

    /// Call once a connection has been established and later dropped
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, BACKOFF_MULTIPLIER, MAX_BACKOFF)
    }
}

/// How a receive loop ended without a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    Closed,
    Cancelled,
}

/// Open one WebSocket connection
pub async fn connect(url: &str) -> Result<WsStream, ConnectionError> {
    let (socket, _response) = connect_async(url)
        .await
        .map_err(|source| ConnectionError::Connect {
            url: url.to_string(),
            source,
        })?;
    Ok(socket)
}

pub struct ConnectionManager {
    url: String,
    backoff: Backoff,
    state: watch::Sender<ConnectionState>,
    reconnecting: bool,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>, state: watch::Sender<ConnectionState>) -> Self {
        Self {
            url: url.into(),
            backoff: Backoff::default(),
            state,
            reconnecting: false,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Connect and feed the dispatcher until cancelled, then close the
    /// active result sink
    pub async fn run(mut self, dispatcher: &mut Dispatcher, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            if self.reconnecting {
                info!("Attempting to reconnect to WebSocket...");
            } else {
                info!("Attempting to connect to WebSocket...");
            }

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                connected = connect(&self.url) => connected,
            };

            let socket = match connected {
                Ok(socket) => socket,
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    let delay = self.backoff.next_delay();
                    if self.reconnecting {
                        warn!("Reconnection failed: {}. Retrying in {:?}...", e, delay);
                    } else {
                        warn!("Initial connection failed: {}. Retrying in {:?}...", e, delay);
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };

            info!(url = %self.url, "Connected to WebSocket");
            if self.reconnecting {
                info!("Reconnected successfully!");
                self.reconnecting = false;
            }
            self.set_state(ConnectionState::Connected);

            let end = receive(socket, dispatcher, &cancel).await;
            self.set_state(ConnectionState::Disconnected);
            match end {
                Ok(Disconnect::Cancelled) => break,
                Ok(Disconnect::Closed) => info!("WebSocket closed by server"),
                Err(e) => warn!("{}", e),
            }

            if cancel.is_cancelled() {
                break;
            }
            self.reconnecting = true;
            self.backoff.reset();
        }

        self.set_state(ConnectionState::Disconnected);
        dispatcher.shutdown();
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// Forward frames until the socket closes, fails or cancellation is requested
async fn receive(
    mut socket: WsStream,
    dispatcher: &mut Dispatcher,
    cancel: &CancellationToken,
) -> Result<Disconnect, ConnectionError> {
    let end = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break Ok(Disconnect::Cancelled),
            next = socket.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                dispatcher.dispatch(&text).await;
            }
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                Ok(text) => {
                    dispatcher.dispatch(&text).await;
                }
                Err(e) => warn!("Dropping non-UTF-8 binary frame: {}", e),
            },
            Some(Ok(Message::Close(_))) | None => break Ok(Disconnect::Closed),
            Some(Ok(_)) => {}
            Some(Err(e)) => break Err(ConnectionError::Read(e)),
        }
    };

    if let Err(e) = socket.close(None).await {
        debug!("Error closing WebSocket connection: {}", e);
    }
    end
}

/// Drive the dispatcher from the synthetic feed until cancelled
pub async fn run_demo(
    mut feed: DemoFeed,
    dispatcher: &mut Dispatcher,
    state: watch::Sender<ConnectionState>,
    tick: Duration,
    cancel: CancellationToken,
) {
    info!("Running demo feed at {:?} per tick", tick);
    state.send_replace(ConnectionState::Connected);

    let mut interval = tokio::time::interval(tick);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                for frame in feed.tick(tick.as_secs_f64()) {
                    dispatcher.dispatch(&frame).await;
                }
            }
        }
    }

    state.send_replace(ConnectionState::Disconnected);
    dispatcher.shutdown();
}
