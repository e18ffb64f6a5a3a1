//! Transport-neutral inbound frames.

use thiserror::Error;

/// One frame read from a client transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes; decoded as UTF-8 when possible.
    Binary(Vec<u8>),
    /// Keepalive ping.
    Ping,
    /// Keepalive pong.
    Pong,
    /// Peer-initiated close.
    Close,
}

/// Read error reported by the transport.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    /// Wrap any displayable error.
    pub fn new(err: impl std::fmt::Display) -> Self {
        Self(err.to_string())
    }
}
