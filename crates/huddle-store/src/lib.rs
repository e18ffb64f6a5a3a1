//! # huddle-store
//!
//! The room store: named rooms, each holding an append-only, insertion-ordered
//! message history.
//!
//! [`RoomStore`] is the seam the relay's handlers talk to;
//! [`InMemoryRoomStore`] is the process-local implementation. The store keeps
//! its own lock, independent of the session registry.

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;

pub use errors::{Result, StoreError};
pub use memory::InMemoryRoomStore;

use async_trait::async_trait;
use huddle_core::messages::{ChatMessage, ChatRoom};

/// Storage for rooms and their message history.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Create a room. Returns `false` if a room with that name already exists.
    async fn add_room(&self, name: &str) -> Result<bool>;

    /// Append a message to an existing room.
    ///
    /// The per-room sequence id and the timestamp are both assigned at the
    /// moment of insertion, so id order and time order agree. Returns the
    /// message as stored.
    async fn append_message(&self, room: &str, message: ChatMessage) -> Result<ChatMessage>;

    /// Every room with its full history, in creation order.
    async fn list_rooms(&self) -> Vec<ChatRoom>;

    /// History of one room, oldest first.
    async fn room_history(&self, room: &str) -> Result<Vec<ChatMessage>>;

    /// Room names in creation order.
    async fn room_names(&self) -> Vec<String>;

    /// Number of rooms.
    async fn room_count(&self) -> usize;
}
