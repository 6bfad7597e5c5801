//! Connection teardown signal shared by the façade and both pumps.
//!
//! The first component to observe a terminal condition records a
//! [`CloseReason`]; later reports are ignored. Every task waits on the same
//! signal, so one failure tears the whole client down.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Why a client stopped. Recorded once, by whichever path got there first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// `Client::close` was called.
    Closed,
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// No pong arrived within the idle window.
    IdleTimeout,
    /// The peer sent a non-text data frame.
    UnexpectedFrame,
    /// The transport reported a read error (includes oversized frames).
    ReadFailed(String),
    /// A keepalive ping could not be written.
    KeepaliveFailed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed locally"),
            Self::PeerClosed => f.write_str("closed by peer"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::UnexpectedFrame => f.write_str("unexpected non-text frame"),
            Self::ReadFailed(error) => write!(f, "read failed: {error}"),
            Self::KeepaliveFailed => f.write_str("keepalive ping failed"),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Shutdown {
    tx: Arc<watch::Sender<Option<CloseReason>>>,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record `reason` unless a reason is already set. Returns true if this
    /// call was the one that triggered shutdown.
    pub(crate) fn trigger(&self, reason: CloseReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub(crate) fn reason(&self) -> Option<CloseReason> {
        self.tx.borrow().clone()
    }

    /// Resolve once shutdown has been triggered. Cancel-safe.
    pub(crate) async fn wait(&self) -> CloseReason {
        let mut rx = self.tx.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(current) => (*current).clone(),
            // The sender lives in `self`, so the channel cannot close under us.
            Err(_) => None,
        };
        reason.unwrap_or(CloseReason::Closed)
    }
}

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod tests;
