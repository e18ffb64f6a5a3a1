//! Process-local room store.

use std::collections::HashMap;

use async_trait::async_trait;
use huddle_core::messages::{ChatMessage, ChatRoom, timestamp_now};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::RoomStore;
use crate::errors::{Result, StoreError};

#[derive(Debug)]
struct RoomEntry {
    room: ChatRoom,
    next_message_id: u64,
}

#[derive(Debug, Default)]
struct Rooms {
    /// Rooms in creation order.
    entries: Vec<RoomEntry>,
    /// Room name to position in `entries`.
    index: HashMap<String, usize>,
}

impl Rooms {
    fn get(&self, name: &str) -> Option<&RoomEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut RoomEntry> {
        self.index.get(name).map(|&i| &mut self.entries[i])
    }
}

/// In-memory [`RoomStore`].
///
/// All mutations go through one `parking_lot::Mutex`, which is never held
/// across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryRoomStore {
    rooms: Mutex<Rooms>,
}

impl InMemoryRoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given (empty) rooms.
    ///
    /// Blank names are skipped with a warning.
    pub fn with_rooms<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        {
            let mut rooms = store.rooms.lock();
            for name in names {
                let name = name.as_ref();
                if let Err(e) = validate_name(name) {
                    warn!(error = %e, "skipping seeded room");
                    continue;
                }
                let _ = insert_room(&mut rooms, name);
            }
        }
        store
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidRoomName(name.to_owned()));
    }
    Ok(())
}

fn insert_room(rooms: &mut Rooms, name: &str) -> bool {
    if rooms.index.contains_key(name) {
        return false;
    }
    let _ = rooms.index.insert(name.to_owned(), rooms.entries.len());
    rooms.entries.push(RoomEntry {
        room: ChatRoom {
            name: name.to_owned(),
            messages: Vec::new(),
        },
        next_message_id: 1,
    });
    true
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn add_room(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let created = insert_room(&mut self.rooms.lock(), name);
        debug!(room = name, created, "add room");
        Ok(created)
    }

    async fn append_message(&self, room: &str, mut message: ChatMessage) -> Result<ChatMessage> {
        let mut rooms = self.rooms.lock();
        let entry = rooms
            .get_mut(room)
            .ok_or_else(|| StoreError::RoomNotFound(room.to_owned()))?;
        message.id = Some(entry.next_message_id);
        message.timestamp = timestamp_now();
        entry.next_message_id += 1;
        entry.room.messages.push(message.clone());
        debug!(room, id = message.id, "appended message");
        Ok(message)
    }

    async fn list_rooms(&self) -> Vec<ChatRoom> {
        self.rooms.lock().entries.iter().map(|e| e.room.clone()).collect()
    }

    async fn room_history(&self, room: &str) -> Result<Vec<ChatMessage>> {
        self.rooms
            .lock()
            .get(room)
            .map(|e| e.room.messages.clone())
            .ok_or_else(|| StoreError::RoomNotFound(room.to_owned()))
    }

    async fn room_names(&self) -> Vec<String> {
        self.rooms.lock().entries.iter().map(|e| e.room.name.clone()).collect()
    }

    async fn room_count(&self) -> usize {
        self.rooms.lock().entries.len()
    }
}
