//! `PostNewRoom`: create a room and announce it.

use async_trait::async_trait;
use huddle_core::envelope::decode_payload;
use huddle_core::messages::{ClientMessageType, NewRoom, PostRoomRequest, ServerMessageType};
use huddle_core::{Envelope, SessionId};
use serde_json::Value;
use tracing::{debug, info};

use crate::dispatch::{HandlerContext, HandlerError, MessageHandler};

/// Adds the room and broadcasts `NewRoom` when it did not exist yet.
pub struct PostNewRoomHandler;

#[async_trait]
impl MessageHandler for PostNewRoomHandler {
    async fn handle(
        &self,
        session_id: SessionId,
        data: Value,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let req: PostRoomRequest = decode_payload(ClientMessageType::PostNewRoom.as_str(), data)?;
        if !ctx.store.add_room(&req.room).await? {
            debug!(%session_id, room = req.room, "room already exists");
            return Ok(());
        }
        info!(%session_id, room = req.room, "room created");

        let announce =
            Envelope::new(ServerMessageType::NewRoom.as_str(), &NewRoom { room: req.room })?;
        let _ = ctx.delivery.broadcast(&announce).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_helpers::{make_test_context, open_session, recv_envelope};
    use assert_matches::assert_matches;
    use huddle_store::StoreError;
    use serde_json::json;

    #[tokio::test]
    async fn creates_room_and_broadcasts_to_all() {
        let (ctx, registry) = make_test_context();
        let (a, mut rx_a) = open_session(&registry, 4).await;
        let (_b, mut rx_b) = open_session(&registry, 4).await;

        PostNewRoomHandler
            .handle(a.id(), json!({"room": "general"}), &ctx)
            .await
            .unwrap();

        assert_eq!(ctx.store.room_names().await, ["general"]);
        for rx in [&mut rx_a, &mut rx_b] {
            let env = recv_envelope(rx);
            assert_eq!(env.message_type(), "NewRoom");
            assert_eq!(env.data, json!({"room": "general"}));
        }
    }

    #[tokio::test]
    async fn existing_room_is_not_announced_again() {
        let (ctx, registry) = make_test_context();
        let (a, mut rx) = open_session(&registry, 4).await;
        for _ in 0..2 {
            PostNewRoomHandler
                .handle(a.id(), json!({"room": "general"}), &ctx)
                .await
                .unwrap();
        }
        let _ = recv_envelope(&mut rx);
        assert!(rx.try_recv().is_err());
        assert_eq!(ctx.store.room_count().await, 1);
    }

    #[tokio::test]
    async fn missing_room_field_is_invalid_payload() {
        let (ctx, registry) = make_test_context();
        let (a, mut rx) = open_session(&registry, 4).await;
        let err = PostNewRoomHandler
            .handle(a.id(), json!({"name": "x"}), &ctx)
            .await
            .unwrap_err();
        assert_matches!(err, HandlerError::InvalidPayload(_));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn blank_room_name_is_rejected() {
        let (ctx, registry) = make_test_context();
        let (a, _rx) = open_session(&registry, 4).await;
        let err = PostNewRoomHandler
            .handle(a.id(), json!({"room": " "}), &ctx)
            .await
            .unwrap_err();
        assert_matches!(err, HandlerError::Store(StoreError::InvalidRoomName(_)));
    }
}
