//! Message-oriented websocket client with per-kind inbound streams.
//!
//! ARCHITECTURE
//! ============
//! One connection, three tasks:
//! - dispatcher: sole reader; decodes text frames and routes them by
//!   [`Action`] into five bounded queues exposed as an [`Inbox`]
//! - keepalive: pings on a fixed period through the shared write path
//! - closer: sends the close frame once any path reports a [`CloseReason`]
//!
//! Callers write through [`Client`] (fire-and-forget) and drain the inbox
//! streams independently. Ordering holds within one kind, not across kinds.
//!
//! ```no_run
//! # async fn run() -> Result<(), netws::ClientError> {
//! let config = netws::ClientConfig::from_env();
//! let (client, mut inbox) = netws::dial("ws://127.0.0.1:8080/ws", &config).await?;
//! client.send_status_request().await;
//! if let Some(reply) = inbox.status.recv().await {
//!     println!("{}", reply.payload);
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod dispatch;
mod keepalive;
mod outbound;
mod shutdown;

#[cfg(test)]
mod test_helpers;

pub use client::{Client, ClientError, dial};
pub use config::{ClientConfig, ConfigError, OverflowPolicy};
pub use dispatch::Inbox;
pub use shutdown::CloseReason;
pub use wire::{Action, CodecError, WireMessage};
