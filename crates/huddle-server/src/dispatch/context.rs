//! Shared state handed to every handler.

use std::sync::Arc;

use huddle_store::RoomStore;

use crate::delivery::DeliveryEngine;

/// What a handler can reach: the room store and outbound delivery.
#[derive(Clone)]
pub struct HandlerContext {
    /// Room and history storage.
    pub store: Arc<dyn RoomStore>,
    /// Unicast and broadcast to registered sessions.
    pub delivery: Arc<DeliveryEngine>,
}

impl HandlerContext {
    /// Bundle a store and a delivery engine.
    pub fn new(store: Arc<dyn RoomStore>, delivery: Arc<DeliveryEngine>) -> Self {
        Self { store, delivery }
    }
}
