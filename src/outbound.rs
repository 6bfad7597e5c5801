//! Outbound sender: the single serialized write path.
//!
//! DESIGN
//! ======
//! Application sends and keepalive pings share one sink behind an async
//! mutex, so frames from the two writers never interleave. Each write
//! (including the wait for the lock) is bounded by the write deadline.
//!
//! Application sends are fire-and-forget: encode and write failures are
//! logged and dropped. A dead connection is noticed by the dispatcher or the
//! keepalive pump, not by the sender.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace, warn};
use wire::WireMessage;

type BoxSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum WriteError {
    #[error("write deadline of {0:?} exceeded")]
    Deadline(Duration),
    #[error("connection already closed")]
    Closed,
    #[error("websocket write failed: {0}")]
    Transport(#[from] WsError),
}

struct WriteHalf {
    sink: BoxSink,
    closed: bool,
}

#[derive(Clone)]
pub(crate) struct Outbound {
    half: Arc<Mutex<WriteHalf>>,
    write_deadline: Duration,
}

impl fmt::Debug for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound")
            .field("write_deadline", &self.write_deadline)
            .finish_non_exhaustive()
    }
}

impl Outbound {
    pub(crate) fn new<S>(sink: S, write_deadline: Duration) -> Self
    where
        S: Sink<Message, Error = WsError> + Send + 'static,
    {
        Self {
            half: Arc::new(Mutex::new(WriteHalf {
                sink: Box::pin(sink),
                closed: false,
            })),
            write_deadline,
        }
    }

    /// Encode and write one text frame. Failures are logged, never returned.
    pub(crate) async fn send(&self, message: &WireMessage) {
        let text = match wire::encode(message) {
            Ok(text) => text,
            Err(error) => {
                warn!(action = %message.action, %error, "netws: dropping unencodable message");
                return;
            }
        };

        match self.write(Message::Text(text.into())).await {
            Ok(()) => trace!(action = %message.action, "netws: sent"),
            Err(WriteError::Closed) => debug!(action = %message.action, "netws: send after close ignored"),
            Err(error) => warn!(action = %message.action, %error, "netws: send failed"),
        }
    }

    /// Write one empty ping frame.
    pub(crate) async fn ping(&self) -> Result<(), WriteError> {
        self.write(Message::Ping(Vec::<u8>::new().into())).await
    }

    /// Send the close frame and shut the sink. Later calls (and later
    /// writes) find the half already closed and return without I/O.
    pub(crate) async fn close(&self) -> Result<(), WriteError> {
        let deadline = self.write_deadline;
        tokio::time::timeout(deadline, async {
            let mut half = self.half.lock().await;
            if half.closed {
                return Ok(());
            }
            half.closed = true;
            half.sink.close().await.map_err(WriteError::from)
        })
        .await
        .map_err(|_| WriteError::Deadline(deadline))?
    }

    async fn write(&self, message: Message) -> Result<(), WriteError> {
        let deadline = self.write_deadline;
        tokio::time::timeout(deadline, async {
            let mut half = self.half.lock().await;
            if half.closed {
                return Err(WriteError::Closed);
            }
            half.sink.send(message).await.map_err(WriteError::from)
        })
        .await
        .map_err(|_| WriteError::Deadline(deadline))?
    }
}

#[cfg(test)]
#[path = "outbound_test.rs"]
mod tests;
