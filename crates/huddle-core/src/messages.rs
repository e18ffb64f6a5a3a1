//! Wire payloads carried in the `data` field of an [`Envelope`](crate::Envelope).
//!
//! Field names are camelCase on the wire to match the chat client protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type tags a client may send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientMessageType {
    /// Request the full room list with message history.
    InitSession,
    /// Create a room.
    PostNewRoom,
    /// Post a chat message into a room.
    PostMessage,
}

impl ClientMessageType {
    /// All inbound tags.
    pub const ALL: [Self; 3] = [Self::InitSession, Self::PostNewRoom, Self::PostMessage];

    /// Wire name of the tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitSession => "InitSession",
            Self::PostNewRoom => "PostNewRoom",
            Self::PostMessage => "PostMessage",
        }
    }
}

impl fmt::Display for ClientMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tags the server emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServerMessageType {
    /// Reply to `InitSession`.
    InitSessionResponse,
    /// A room was created.
    NewRoom,
    /// A message was appended to a room.
    NewMessage,
}

impl ServerMessageType {
    /// Wire name of the tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitSessionResponse => "InitSessionResponse",
            Self::NewRoom => "NewRoom",
            Self::NewMessage => "NewMessage",
        }
    }
}

impl fmt::Display for ServerMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chat line inside a room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Per-room sequence number, assigned by the room store on append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Display name of the author.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// Wall-clock time of the append, `HH:MM:SS`.
    pub timestamp: String,
}

impl ChatMessage {
    /// Build an unsequenced message stamped with the current local time.
    pub fn now(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            sender: sender.into(),
            content: content.into(),
            timestamp: timestamp_now(),
        }
    }
}

/// A room with its ordered history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Room name, unique within the store.
    pub name: String,
    /// Append-only history, oldest first.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// `PostNewRoom` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRoomRequest {
    /// Name of the room to create.
    pub room: String,
}

/// `PostMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMessageRequest {
    /// Author.
    pub user: String,
    /// Target room.
    pub room: String,
    /// Body.
    pub message: String,
}

/// `InitSessionResponse` payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSessionResponse {
    /// Every room with its full history.
    pub rooms_messages: Vec<ChatRoom>,
}

/// `NewRoom` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    /// Name of the created room.
    pub room: String,
}

/// `NewMessage` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Room the message was appended to.
    pub room: String,
    /// The stored message.
    pub chat_message: ChatMessage,
}

/// Current local time formatted as `HH:MM:SS`.
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_tags_match_variant_names() {
        let names: Vec<_> = ClientMessageType::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, ["InitSession", "PostNewRoom", "PostMessage"]);
    }

    #[test]
    fn server_tag_display() {
        assert_eq!(ServerMessageType::InitSessionResponse.to_string(), "InitSessionResponse");
        assert_eq!(ServerMessageType::NewRoom.to_string(), "NewRoom");
        assert_eq!(ServerMessageType::NewMessage.to_string(), "NewMessage");
    }

    #[test]
    fn new_message_uses_camel_case() {
        let msg = NewMessage {
            room: "general".into(),
            chat_message: ChatMessage {
                id: Some(3),
                sender: "alice".into(),
                content: "hi".into(),
                timestamp: "10:00:00".into(),
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["room"], "general");
        assert_eq!(value["chatMessage"]["sender"], "alice");
        assert_eq!(value["chatMessage"]["id"], 3);
    }

    #[test]
    fn init_response_uses_rooms_messages_key() {
        let resp = InitSessionResponse {
            rooms_messages: vec![ChatRoom {
                name: "general".into(),
                messages: vec![],
            }],
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"roomsMessages": [{"name": "general", "messages": []}]}));
    }

    #[test]
    fn unsequenced_message_omits_id() {
        let msg = ChatMessage::now("bob", "yo");
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["sender"], "bob");
    }

    #[test]
    fn message_without_id_deserializes() {
        let msg: ChatMessage =
            serde_json::from_value(json!({"sender": "a", "content": "b", "timestamp": "01:02:03"}))
                .unwrap();
        assert_eq!(msg.id, None);
    }

    #[test]
    fn post_message_requires_all_fields() {
        let err = serde_json::from_value::<PostMessageRequest>(json!({"user": "a", "room": "b"}));
        assert!(err.is_err());
    }

    #[test]
    fn timestamp_shape() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
        assert_eq!(ts.as_bytes()[5], b':');
    }
}
