//! Client tunables: handshake, frame limits, liveness timing, queue sizing.
//!
//! DESIGN
//! ======
//! Defaults match the server it talks to (60s idle window, ping at 9/10 of it,
//! 10s write deadline, 255-slot queues). `from_env` overlays `NETWS_*`
//! variables; unparsable values fall back to the default rather than failing.

use std::time::Duration;

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;
const DEFAULT_READ_BUFFER_SIZE: usize = 8192;
const DEFAULT_WRITE_BUFFER_SIZE: usize = 8192;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_PING_PERIOD_MS: u64 = DEFAULT_IDLE_TIMEOUT_MS * 9 / 10;
const DEFAULT_WRITE_DEADLINE_MS: u64 = 10_000;
const DEFAULT_QUEUE_CAPACITY: usize = 255;

// Upper bounds. Larger values either overflow deadline arithmetic, exceed
// the channel's permit limit, or trip the transport's config assertions.
const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;
const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// What the dispatcher does when a per-kind queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for the consumer. A stalled consumer of one kind stalls every kind.
    #[default]
    Block,
    /// Drop the incoming message and count it. Kinds never stall each other.
    DropNewest,
}

impl std::str::FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop-newest" | "drop_newest" | "drop" => Ok(Self::DropNewest),
            _ => Err(ConfigError::UnknownOverflowPolicy(s.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ping period ({ping_period:?}) must be shorter than idle timeout ({idle_timeout:?})")]
    PingNotBeforeIdle {
        ping_period: Duration,
        idle_timeout: Duration,
    },
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),
    #[error("`{0}` exceeds its supported maximum")]
    TooLarge(&'static str),
    #[error("unknown overflow policy `{0}` (expected `block` or `drop-newest`)")]
    UnknownOverflowPolicy(String),
}

/// Connection and pump tuning for a [`crate::Client`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Upper bound on the dial handshake.
    pub handshake_timeout: Duration,
    /// Largest inbound message accepted; larger ones end the connection.
    pub max_message_size: usize,
    /// Transport read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Transport write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Silence window (no pong) after which the connection is considered dead.
    pub idle_timeout: Duration,
    /// Keepalive cadence. Must be shorter than `idle_timeout`.
    pub ping_period: Duration,
    /// Per-write deadline for messages, pings, and the close frame.
    pub write_deadline: Duration,
    /// Capacity of each per-kind delivery queue.
    pub queue_capacity: usize,
    /// Full-queue behavior of the dispatcher.
    pub overflow: OverflowPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            ping_period: Duration::from_millis(DEFAULT_PING_PERIOD_MS),
            write_deadline: Duration::from_millis(DEFAULT_WRITE_DEADLINE_MS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl ClientConfig {
    /// Load config from `NETWS_*` environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Used by `from_env` and tests.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let ms = |key: &str, default: u64| Duration::from_millis(parse_or(&lookup, key, default));

        Self {
            handshake_timeout: ms("NETWS_HANDSHAKE_TIMEOUT_MS", DEFAULT_HANDSHAKE_TIMEOUT_MS),
            max_message_size: parse_or(&lookup, "NETWS_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE),
            read_buffer_size: parse_or(&lookup, "NETWS_READ_BUFFER_SIZE", DEFAULT_READ_BUFFER_SIZE),
            write_buffer_size: parse_or(&lookup, "NETWS_WRITE_BUFFER_SIZE", DEFAULT_WRITE_BUFFER_SIZE),
            idle_timeout: ms("NETWS_IDLE_TIMEOUT_MS", DEFAULT_IDLE_TIMEOUT_MS),
            ping_period: ms("NETWS_PING_PERIOD_MS", DEFAULT_PING_PERIOD_MS),
            write_deadline: ms("NETWS_WRITE_DEADLINE_MS", DEFAULT_WRITE_DEADLINE_MS),
            queue_capacity: parse_or(&lookup, "NETWS_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
            overflow: parse_or(&lookup, "NETWS_OVERFLOW", OverflowPolicy::Block),
        }
    }

    /// Check the invariants the pumps rely on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for zero or oversized durations, buffers and
    /// capacities, and when the ping period does not fall strictly inside the
    /// idle window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("handshake_timeout", self.handshake_timeout.is_zero()),
            ("idle_timeout", self.idle_timeout.is_zero()),
            ("ping_period", self.ping_period.is_zero()),
            ("write_deadline", self.write_deadline.is_zero()),
            ("max_message_size", self.max_message_size == 0),
            ("queue_capacity", self.queue_capacity == 0),
        ];
        if let Some((name, _)) = required.into_iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::Zero(name));
        }
        let bounded = [
            ("handshake_timeout", self.handshake_timeout > MAX_DURATION),
            ("idle_timeout", self.idle_timeout > MAX_DURATION),
            ("write_deadline", self.write_deadline > MAX_DURATION),
            ("read_buffer_size", self.read_buffer_size > MAX_BUFFER_SIZE),
            ("write_buffer_size", self.write_buffer_size > MAX_BUFFER_SIZE),
            ("queue_capacity", self.queue_capacity > MAX_QUEUE_CAPACITY),
        ];
        if let Some((name, _)) = bounded.into_iter().find(|(_, over)| *over) {
            return Err(ConfigError::TooLarge(name));
        }
        if self.ping_period >= self.idle_timeout {
            return Err(ConfigError::PingNotBeforeIdle {
                ping_period: self.ping_period,
                idle_timeout: self.idle_timeout,
            });
        }
        Ok(())
    }

    /// Transport-level settings derived from this config.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .read_buffer_size(self.read_buffer_size)
            .write_buffer_size(self.write_buffer_size)
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or(default),
        None => default,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
