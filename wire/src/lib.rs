//! Shared wire message model and JSON text codec for the relay socket.
//!
//! Every application payload crossing the connection is a [`WireMessage`]
//! carried in a single text frame. The `action` field selects the inbound
//! delivery queue; liveness probes are transport ping/pong frames and never
//! appear here.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Error returned by [`encode`] and [`decode`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text could not be parsed as (or rendered from) a wire message.
    #[error("invalid wire message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Message kind. Selects which inbound stream a message is delivered on.
///
/// Unknown kinds decode to [`Action::Other`] rather than failing, so a peer
/// speaking a newer dialect does not break decoding of the frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// A peer joined.
    Connect,
    /// A peer left.
    Disconnect,
    /// Status request (outbound) or status report (inbound).
    Status,
    /// Payload fanned out to every peer.
    Broadcast,
    /// Payload addressed to a single peer.
    Message,
    /// Any action string this client does not recognize.
    Other(String),
}

impl Action {
    /// The five kinds that have a delivery queue, in routing-table order.
    pub const ROUTABLE: [Action; 5] = [
        Action::Status,
        Action::Connect,
        Action::Disconnect,
        Action::Message,
        Action::Broadcast,
    ];

    /// Wire spelling of the action.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Status => "status",
            Self::Broadcast => "broadcast",
            Self::Message => "message",
            Self::Other(raw) => raw,
        }
    }

    /// True for the five recognized kinds.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for Action {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "connect" => Self::Connect,
            "disconnect" => Self::Disconnect,
            "status" => Self::Status,
            "broadcast" => Self::Broadcast,
            "message" => Self::Message,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for Action {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single application message on the wire.
///
/// Absent and `null` fields decode to their empty value, so
/// `{"action":"status","target":null}` is a valid status message with empty
/// target and payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireMessage {
    /// Message kind.
    #[serde(deserialize_with = "null_as_empty")]
    pub action: Action,
    /// Recipient peer id. Empty means "not targeted".
    #[serde(deserialize_with = "null_as_empty")]
    pub target: String,
    /// Opaque application data.
    #[serde(deserialize_with = "null_as_empty")]
    pub payload: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl WireMessage {
    /// Build a message from its parts.
    #[must_use]
    pub fn new(action: Action, target: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
            payload: payload.into(),
        }
    }

    /// Untargeted broadcast carrying `payload`.
    #[must_use]
    pub fn broadcast(payload: impl Into<String>) -> Self {
        Self::new(Action::Broadcast, String::new(), payload)
    }

    /// Message addressed to `target`. Callers must not pass an empty target.
    #[must_use]
    pub fn message(target: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(Action::Message, target, payload)
    }

    /// Empty status request.
    #[must_use]
    pub fn status_request() -> Self {
        Self::new(Action::Status, String::new(), String::new())
    }
}

/// Encode a message as compact JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode(message: &WireMessage) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode JSON text into a message.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON, non-object input, or
/// fields of the wrong type.
pub fn decode(text: &str) -> Result<WireMessage, CodecError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
