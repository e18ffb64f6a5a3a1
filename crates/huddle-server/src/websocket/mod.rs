//! WebSocket transport: upgrade, read adapter and outbound writer.

pub mod upgrade;
pub mod writer;

use axum::extract::ws::Message;

use crate::session::Frame;

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Frame::Text(text.to_string()),
            Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
            Message::Ping(_) => Frame::Ping,
            Message::Pong(_) => Frame::Pong,
            Message::Close(_) => Frame::Close,
        }
    }
}
