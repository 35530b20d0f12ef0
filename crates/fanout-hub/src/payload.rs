//! Message bodies and stream frames.

use std::sync::Arc;

use bytes::Bytes;

/// Opaque message body relayed by the hub.
///
/// Both variants clone in O(1), so fanning one payload out to every member
/// never copies the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text message.
    Text(Arc<str>),
    /// Binary message.
    Binary(Bytes),
}

impl Payload {
    /// Build a text payload.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    /// Build a binary payload.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text body, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

/// One unit on a connection's duplex stream.
///
/// Transports map their own message type onto this so the pumps stay
/// independent of the socket library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Application message.
    Message(Payload),
    /// Keep-alive ping.
    Ping(Bytes),
    /// Keep-alive reply.
    Pong(Bytes),
    /// Orderly close.
    Close,
}

impl From<Payload> for Frame {
    fn from(payload: Payload) -> Self {
        Self::Message(payload)
    }
}
