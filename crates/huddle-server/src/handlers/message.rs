//! `PostMessage`: store and fan out a chat line.

use async_trait::async_trait;
use huddle_core::envelope::decode_payload;
use huddle_core::messages::{
    ChatMessage, ClientMessageType, NewMessage, NewRoom, PostMessageRequest, ServerMessageType,
};
use huddle_core::{Envelope, SessionId};
use huddle_store::StoreError;
use serde_json::Value;
use tracing::{debug, info};

use crate::dispatch::{HandlerContext, HandlerError, MessageHandler};

/// Appends the message to its room and broadcasts `NewMessage` to every
/// session, the author included.
///
/// Posting to a room that does not exist creates it first and announces it
/// with `NewRoom`, so clients learn about the room before its first line.
pub struct PostMessageHandler;

#[async_trait]
impl MessageHandler for PostMessageHandler {
    async fn handle(
        &self,
        session_id: SessionId,
        data: Value,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let req: PostMessageRequest =
            decode_payload(ClientMessageType::PostMessage.as_str(), data)?;
        let message = ChatMessage::now(req.user, req.message);
        let stored = match ctx.store.append_message(&req.room, message.clone()).await {
            Err(StoreError::RoomNotFound(_)) => {
                if ctx.store.add_room(&req.room).await? {
                    info!(%session_id, room = req.room, "room created by first message");
                    let announce = Envelope::new(
                        ServerMessageType::NewRoom.as_str(),
                        &NewRoom {
                            room: req.room.clone(),
                        },
                    )?;
                    let _ = ctx.delivery.broadcast(&announce).await;
                }
                ctx.store.append_message(&req.room, message).await?
            }
            other => other?,
        };
        debug!(%session_id, room = req.room, id = stored.id, "message stored");

        let event = Envelope::new(
            ServerMessageType::NewMessage.as_str(),
            &NewMessage {
                room: req.room,
                chat_message: stored,
            },
        )?;
        let report = ctx.delivery.broadcast(&event).await;
        debug!(%session_id, delivered = report.delivered, "message broadcast");
        Ok(())
    }
}
