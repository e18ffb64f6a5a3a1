//! Dispatch and handler errors.

use std::time::Duration;

use huddle_core::EnvelopeError;
use huddle_store::StoreError;
use thiserror::Error;

/// Failure inside a message handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// `data` did not match the handler's payload type.
    #[error(transparent)]
    InvalidPayload(#[from] EnvelopeError),
    /// The room store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The handler exceeded the dispatch timeout.
    #[error("handler timed out after {0:?}")]
    TimedOut(Duration),
    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Store(StoreError::RoomNotFound(_)) => "room_not_found",
            Self::Store(StoreError::InvalidRoomName(_)) => "invalid_room_name",
            Self::TimedOut(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

/// Failure to register or route a message.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler is already registered for this tag.
    #[error("a handler for message type '{0}' is already registered")]
    DuplicateHandler(String),
    /// No handler is registered for this tag.
    #[error("no handler for message type '{0}'")]
    UnknownMessageType(String),
    /// The handler ran and failed.
    #[error("{tag} handler failed: {source}")]
    Handler {
        /// Tag that was dispatched.
        tag: String,
        /// What went wrong.
        #[source]
        source: HandlerError,
    },
}
