//! Client façade. Owns the connection and coordinates its three tasks.
//!
//! LIFECYCLE
//! =========
//! 1. `dial` (or `from_socket` / `new`) validates config and splits the stream
//! 2. Dispatcher, keepalive pump, and closer tasks start; constructor returns
//! 3. Callers send through the façade and drain the `Inbox` at their own pace
//! 4. First terminal condition (local close, peer close, idle timeout, read
//!    error, failed ping) records a `CloseReason`, the closer sends the close
//!    frame, and every inbox stream ends

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Role;
use tracing::{debug, info, warn};
use wire::{Action, WireMessage};

use crate::config::{ClientConfig, ConfigError};
use crate::dispatch::{self, DropCounters, Dispatcher, Inbox};
use crate::keepalive;
use crate::outbound::Outbound;
use crate::shutdown::{CloseReason, Shutdown};

/// Errors surfaced by client construction. Nothing after construction is
/// reported as an error; see [`Client::closed`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid client config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
}

/// Connect to `url` and start a client on the resulting connection.
///
/// # Errors
///
/// Returns [`ClientError`] for invalid config or URL, handshake failure, or
/// a handshake that outlives `config.handshake_timeout`.
pub async fn dial(url: &str, config: &ClientConfig) -> Result<(Client, Inbox), ClientError> {
    config.validate()?;
    let request = url
        .into_client_request()
        .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

    let connect = tokio_tungstenite::connect_async_with_config(
        request,
        Some(config.websocket_config()),
        false,
    );
    let (stream, response) = tokio::time::timeout(config.handshake_timeout, connect)
        .await
        .map_err(|_| ClientError::HandshakeTimeout(config.handshake_timeout))?
        .map_err(|e| ClientError::Connect(Box::new(e)))?;

    info!(url, status = %response.status(), "netws: connected");
    Client::new(stream, config)
}

/// Cloneable handle to a running connection.
#[derive(Clone, Debug)]
pub struct Client {
    outbound: Outbound,
    shutdown: Shutdown,
    dropped: Arc<DropCounters>,
}

impl Client {
    /// Start a client on an established websocket.
    ///
    /// Spawns the pumps on the current tokio runtime and returns immediately.
    /// Transport limits (`max_message_size`, buffer sizes) are whatever
    /// `stream` was built with; use [`dial`] or [`Client::from_socket`] to
    /// have them taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if `config` fails validation.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new<S>(stream: WebSocketStream<S>, config: &ClientConfig) -> Result<(Self, Inbox), ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;

        let (sink, frames) = stream.split();
        let (routes, inbox) = dispatch::queues(config.queue_capacity);
        let dropped = routes.dropped();
        let shutdown = Shutdown::new();
        let outbound = Outbound::new(sink, config.write_deadline);

        dispatch::spawn_dispatcher(Dispatcher::new(
            frames,
            routes,
            config.idle_timeout,
            config.overflow,
            shutdown.clone(),
        ));
        keepalive::spawn_keepalive(outbound.clone(), config.ping_period, shutdown.clone());
        spawn_closer(outbound.clone(), shutdown.clone());

        debug!(
            idle_timeout = ?config.idle_timeout,
            ping_period = ?config.ping_period,
            queue_capacity = config.queue_capacity,
            overflow = ?config.overflow,
            "netws: client started"
        );

        let client = Self {
            outbound,
            shutdown,
            dropped,
        };
        Ok((client, inbox))
    }

    /// Start a client on a raw socket whose websocket handshake has already
    /// completed, applying the transport limits from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if `config` fails validation.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub async fn from_socket<S>(socket: S, config: &ClientConfig) -> Result<(Self, Inbox), ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;
        let stream =
            WebSocketStream::from_raw_socket(socket, Role::Client, Some(config.websocket_config())).await;
        Self::new(stream, config)
    }

    /// Send a broadcast to every peer.
    pub async fn send_broadcast(&self, payload: impl Into<String>) {
        self.send(&WireMessage::broadcast(payload)).await;
    }

    /// Send `payload` to peer `target`. An empty target sends nothing.
    pub async fn send_message(&self, payload: impl Into<String>, target: &str) {
        if target.is_empty() {
            debug!("netws: message without target not sent");
            return;
        }
        self.send(&WireMessage::message(target, payload)).await;
    }

    /// Ask the server for a status report; the reply arrives on `Inbox::status`.
    pub async fn send_status_request(&self) {
        self.send(&WireMessage::status_request()).await;
    }

    /// Write an arbitrary message. Fire-and-forget: failures are logged only.
    pub async fn send(&self, message: &WireMessage) {
        self.outbound.send(message).await;
    }

    /// Close the connection. Safe to call repeatedly and from clones; every
    /// call returns once the close frame has been written (or abandoned).
    pub async fn close(&self) {
        if self.shutdown.trigger(CloseReason::Closed) {
            info!("netws: closing");
        }
        close_connection(&self.outbound).await;
    }

    /// Wait until the client stops, returning the first recorded reason.
    pub async fn closed(&self) -> CloseReason {
        self.shutdown.wait().await
    }

    /// Why the client stopped, or `None` while it is running.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shutdown.reason()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close_reason().is_some()
    }

    /// Inbound messages of kind `action` discarded under
    /// `OverflowPolicy::DropNewest`.
    #[must_use]
    pub fn dropped(&self, action: &Action) -> u64 {
        self.dropped.get(action)
    }
}

/// Tear the connection down once any component reports a terminal condition.
fn spawn_closer(outbound: Outbound, shutdown: Shutdown) {
    tokio::spawn(async move {
        let reason = shutdown.wait().await;
        debug!(%reason, "netws: shutting down connection");
        close_connection(&outbound).await;
    });
}

async fn close_connection(outbound: &Outbound) {
    if let Err(error) = outbound.close().await {
        warn!(%error, "netws: close frame not delivered");
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
