//! Inbound dispatcher, the sole reader of the connection.
//!
//! DESIGN
//! ======
//! Reads frames until a terminal condition, decodes text frames as
//! [`WireMessage`]s, and routes each one to its per-kind queue through a
//! [`Routes`] table keyed by [`Action`]. Kinds without a route are dropped.
//!
//! LIVENESS
//! ========
//! The read deadline starts at `idle_timeout` and is pushed out by every
//! pong. Data frames do not extend it: a peer that talks but never answers
//! pings is still considered dead.
//!
//! BACKPRESSURE
//! ============
//! `OverflowPolicy::Block` waits on a full queue, which stalls every kind
//! behind the slow consumer. `DropNewest` never waits and counts drops per
//! kind. Shutdown interrupts a blocked enqueue either way.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, trace};
use wire::{Action, WireMessage};

use crate::config::OverflowPolicy;
use crate::shutdown::{CloseReason, Shutdown};

// =============================================================================
// INBOX
// =============================================================================

/// Per-kind inbound streams. Each ends (`recv` returns `None`) once the
/// connection is gone.
#[derive(Debug)]
pub struct Inbox {
    pub status: Receiver<WireMessage>,
    pub connect: Receiver<WireMessage>,
    pub disconnect: Receiver<WireMessage>,
    pub message: Receiver<WireMessage>,
    pub broadcast: Receiver<WireMessage>,
}

impl Inbox {
    /// Stream for a routable action, or `None` for [`Action::Other`].
    pub fn stream_mut(&mut self, action: &Action) -> Option<&mut Receiver<WireMessage>> {
        match action {
            Action::Status => Some(&mut self.status),
            Action::Connect => Some(&mut self.connect),
            Action::Disconnect => Some(&mut self.disconnect),
            Action::Message => Some(&mut self.message),
            Action::Broadcast => Some(&mut self.broadcast),
            Action::Other(_) => None,
        }
    }
}

// =============================================================================
// ROUTES
// =============================================================================

/// Messages discarded by `OverflowPolicy::DropNewest`, per kind.
#[derive(Debug)]
pub(crate) struct DropCounters {
    counts: HashMap<Action, AtomicU64>,
}

impl DropCounters {
    fn new() -> Self {
        Self {
            counts: Action::ROUTABLE
                .into_iter()
                .map(|action| (action, AtomicU64::new(0)))
                .collect(),
        }
    }

    fn record(&self, action: &Action) {
        if let Some(count) = self.counts.get(action) {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn get(&self, action: &Action) -> u64 {
        self.counts
            .get(action)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }
}

/// Outcome of routing one decoded message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Routed {
    Delivered,
    Unrouted,
    Dropped,
    ConsumerGone,
    Interrupted(CloseReason),
}

/// Action → queue mapping. Owns the sending side of every inbox stream.
#[derive(Debug)]
pub(crate) struct Routes {
    queues: HashMap<Action, Sender<WireMessage>>,
    dropped: Arc<DropCounters>,
}

/// Allocate the five bounded queues and the routing table that feeds them.
pub(crate) fn queues(capacity: usize) -> (Routes, Inbox) {
    let (status_tx, status) = mpsc::channel(capacity);
    let (connect_tx, connect) = mpsc::channel(capacity);
    let (disconnect_tx, disconnect) = mpsc::channel(capacity);
    let (message_tx, message) = mpsc::channel(capacity);
    let (broadcast_tx, broadcast) = mpsc::channel(capacity);

    let queues = HashMap::from([
        (Action::Status, status_tx),
        (Action::Connect, connect_tx),
        (Action::Disconnect, disconnect_tx),
        (Action::Message, message_tx),
        (Action::Broadcast, broadcast_tx),
    ]);

    let routes = Routes {
        queues,
        dropped: Arc::new(DropCounters::new()),
    };
    let inbox = Inbox {
        status,
        connect,
        disconnect,
        message,
        broadcast,
    };
    (routes, inbox)
}

impl Routes {
    pub(crate) fn dropped(&self) -> Arc<DropCounters> {
        Arc::clone(&self.dropped)
    }

    pub(crate) async fn route(
        &self,
        message: WireMessage,
        overflow: OverflowPolicy,
        shutdown: &Shutdown,
    ) -> Routed {
        let Some(tx) = self.queues.get(&message.action) else {
            return Routed::Unrouted;
        };

        match overflow {
            OverflowPolicy::Block => {
                tokio::select! {
                    sent = tx.send(message) => {
                        if sent.is_ok() { Routed::Delivered } else { Routed::ConsumerGone }
                    }
                    reason = shutdown.wait() => Routed::Interrupted(reason),
                }
            }
            OverflowPolicy::DropNewest => match tx.try_send(message) {
                Ok(()) => Routed::Delivered,
                Err(TrySendError::Full(dropped)) => {
                    self.dropped.record(&dropped.action);
                    Routed::Dropped
                }
                Err(TrySendError::Closed(_)) => Routed::ConsumerGone,
            },
        }
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

pub(crate) struct Dispatcher<S> {
    frames: S,
    routes: Routes,
    idle_timeout: Duration,
    overflow: OverflowPolicy,
    shutdown: Shutdown,
}

impl<S> Dispatcher<S>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    pub(crate) fn new(
        frames: S,
        routes: Routes,
        idle_timeout: Duration,
        overflow: OverflowPolicy,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            frames,
            routes,
            idle_timeout,
            overflow,
            shutdown,
        }
    }

    /// Read and route until a terminal condition; returns why it stopped.
    pub(crate) async fn run(&mut self) -> CloseReason {
        let mut deadline = Instant::now() + self.idle_timeout;

        loop {
            let next = tokio::select! {
                next = tokio::time::timeout_at(deadline, self.frames.next()) => next,
                reason = self.shutdown.wait() => return reason,
            };

            let frame = match next {
                Err(_) => return CloseReason::IdleTimeout,
                Ok(None) => return CloseReason::PeerClosed,
                Ok(Some(Err(error))) => return CloseReason::ReadFailed(error.to_string()),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => {
                    if let Some(reason) = self.dispatch_text(text.as_str()).await {
                        return reason;
                    }
                }
                Message::Pong(_) => {
                    deadline = Instant::now() + self.idle_timeout;
                    trace!("netws: pong, read deadline extended");
                }
                Message::Ping(_) | Message::Frame(_) => {}
                Message::Binary(_) => return CloseReason::UnexpectedFrame,
                Message::Close(_) => return CloseReason::PeerClosed,
            }
        }
    }

    async fn dispatch_text(&mut self, text: &str) -> Option<CloseReason> {
        let message = match wire::decode(text) {
            Ok(message) => message,
            Err(error) => {
                debug!(%error, "netws: discarding malformed frame");
                return None;
            }
        };

        let action = message.action.clone();
        match self.routes.route(message, self.overflow, &self.shutdown).await {
            Routed::Delivered => trace!(%action, "netws: routed"),
            Routed::Unrouted => trace!(%action, "netws: no route, dropped"),
            Routed::Dropped => debug!(%action, "netws: queue full, dropped"),
            Routed::ConsumerGone => trace!(%action, "netws: consumer gone, dropped"),
            Routed::Interrupted(reason) => return Some(reason),
        }
        None
    }
}

/// Run the dispatcher on its own task. On exit it records the close reason
/// and then drops the queue senders, ending every inbox stream.
pub(crate) fn spawn_dispatcher<S>(mut dispatcher: Dispatcher<S>) -> JoinHandle<()>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let reason = dispatcher.run().await;
        info!(%reason, "netws: dispatcher stopped");
        dispatcher.shutdown.trigger(reason);
        drop(dispatcher);
    })
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
