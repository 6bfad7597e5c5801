//! Shared fixtures: in-memory websocket pairs and scripted sinks.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use wire::WireMessage;

use crate::{Client, ClientConfig, Inbox};

/// Server end of an in-memory connection.
pub(crate) type Peer = WebSocketStream<DuplexStream>;

/// Short timings so liveness tests finish in well under a second.
pub(crate) fn fast_config() -> ClientConfig {
    ClientConfig {
        idle_timeout: Duration::from_millis(300),
        ping_period: Duration::from_millis(80),
        write_deadline: Duration::from_millis(200),
        queue_capacity: 16,
        ..ClientConfig::default()
    }
}

/// Timings loose enough that liveness never interferes with a test.
pub(crate) fn steady_config() -> ClientConfig {
    ClientConfig {
        idle_timeout: Duration::from_secs(5),
        ping_period: Duration::from_secs(1),
        write_deadline: Duration::from_millis(500),
        queue_capacity: 16,
        ..ClientConfig::default()
    }
}

/// Client wired to an in-memory peer over a duplex pipe.
pub(crate) async fn connected(config: &ClientConfig) -> (Client, Inbox, Peer) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let peer = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let (client, inbox) = Client::from_socket(client_io, config)
        .await
        .expect("client should start");
    (client, inbox, peer)
}

pub(crate) async fn peer_send(peer: &mut Peer, message: &WireMessage) {
    let text = wire::encode(message).expect("encode");
    peer_send_text(peer, &text).await;
}

pub(crate) async fn peer_send_text(peer: &mut Peer, text: &str) {
    peer.send(Message::Text(text.to_owned().into()))
        .await
        .expect("peer send");
}

/// Next text frame the client wrote, skipping control frames.
pub(crate) async fn peer_next_text(peer: &mut Peer) -> String {
    timeout(Duration::from_secs(1), async {
        loop {
            match peer.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                other => panic!("expected text frame, got {other:?}"),
            }
        }
    })
    .await
    .expect("peer read timed out")
}

/// Keep polling the peer so it answers pings, forwarding text frames.
pub(crate) fn spawn_peer_reader(mut peer: Peer) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(Ok(message)) = peer.next().await {
            if let Message::Text(text) = message {
                if tx.send(text.as_str().to_owned()).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

pub(crate) async fn recv_within(
    rx: &mut mpsc::Receiver<WireMessage>,
    wait: Duration,
) -> Option<WireMessage> {
    timeout(wait, rx.recv()).await.unwrap_or(None)
}

/// Sink that forwards every written message to a channel.
pub(crate) fn recording_sink() -> (
    impl Sink<Message, Error = WsError> + Send + 'static,
    mpsc::UnboundedReceiver<Message>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = futures_util::sink::unfold(
        tx,
        |tx: mpsc::UnboundedSender<Message>, message: Message| async move {
            tx.send(message).map_err(|_| WsError::ConnectionClosed)?;
            Ok::<_, WsError>(tx)
        },
    );
    (sink, rx)
}

/// Sink whose every write fails.
pub(crate) fn failing_sink() -> impl Sink<Message, Error = WsError> + Send + 'static {
    futures_util::sink::unfold((), |(), _message: Message| async {
        Err::<(), WsError>(WsError::ConnectionClosed)
    })
}

/// Sink whose writes never complete.
pub(crate) fn stalled_sink() -> impl Sink<Message, Error = WsError> + Send + 'static {
    futures_util::sink::unfold((), |(), _message: Message| {
        std::future::pending::<Result<(), WsError>>()
    })
}
