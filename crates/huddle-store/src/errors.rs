//! Room store errors.

use thiserror::Error;

/// Errors returned by a [`RoomStore`](crate::RoomStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The named room does not exist.
    #[error("room '{0}' not found")]
    RoomNotFound(String),
    /// The room name is empty or whitespace.
    #[error("invalid room name '{0}'")]
    InvalidRoomName(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
