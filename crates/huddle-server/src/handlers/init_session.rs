//! `InitSession`: reply with every room and its history.

use async_trait::async_trait;
use huddle_core::messages::{InitSessionResponse, ServerMessageType};
use huddle_core::{Envelope, SessionId};
use serde_json::Value;
use tracing::debug;

use crate::dispatch::{HandlerContext, HandlerError, MessageHandler};

/// Unicasts `InitSessionResponse` to the requester. Ignores `data`.
pub struct InitSessionHandler;

#[async_trait]
impl MessageHandler for InitSessionHandler {
    async fn handle(
        &self,
        session_id: SessionId,
        _data: Value,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let rooms_messages = ctx.store.list_rooms().await;
        debug!(%session_id, rooms = rooms_messages.len(), "init session");
        let reply = Envelope::new(
            ServerMessageType::InitSessionResponse.as_str(),
            &InitSessionResponse { rooms_messages },
        )?;
        let _ = ctx.delivery.unicast(session_id, &reply).await;
        Ok(())
    }
}
