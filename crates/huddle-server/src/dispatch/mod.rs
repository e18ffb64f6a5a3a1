//! Type-tag dispatch table.
//!
//! Maps an envelope's `metadata.type` to exactly one [`MessageHandler`].
//! The table is filled at startup and read-only afterwards.

mod context;
mod errors;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use huddle_core::{Envelope, SessionId};
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, error, warn};

pub use context::HandlerContext;
pub use errors::{DispatchError, HandlerError};

use crate::metrics::{DISPATCH_DURATION_SECONDS, DISPATCH_ERRORS_TOTAL, MESSAGES_RECEIVED_TOTAL};

/// Trait implemented by every message handler.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one inbound envelope's `data` on behalf of `session_id`.
    async fn handle(
        &self,
        session_id: SessionId,
        data: Value,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError>;
}

/// Adapter that lets an async closure act as a [`MessageHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(SessionId, Value, HandlerContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(SessionId, Value, HandlerContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(
        &self,
        session_id: SessionId,
        data: Value,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        (self.f)(session_id, data, ctx.clone()).await
    }
}

/// Table mapping type tags to handlers.
pub struct DispatchTable {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
    timeout: Duration,
}

impl DispatchTable {
    /// Maximum time a single handler is allowed to run.
    pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            timeout: Self::HANDLER_TIMEOUT,
        }
    }

    /// Override the per-handler timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a handler for `tag`.
    ///
    /// Fails if `tag` already has a handler; the existing one is kept.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        handler: impl MessageHandler + 'static,
    ) -> Result<(), DispatchError> {
        match self.handlers.entry(tag.into()) {
            Entry::Occupied(e) => Err(DispatchError::DuplicateHandler(e.key().clone())),
            Entry::Vacant(e) => {
                debug!(tag = e.key().as_str(), "registered handler");
                let _ = e.insert(Arc::new(handler));
                Ok(())
            }
        }
    }

    /// Route an envelope to its handler and wait for it to finish.
    pub async fn dispatch(
        &self,
        session_id: SessionId,
        envelope: Envelope,
        ctx: &HandlerContext,
    ) -> Result<(), DispatchError> {
        let Envelope { metadata, data } = envelope;
        let tag = metadata.message_type;

        let Some(handler) = self.handlers.get(&tag) else {
            counter!(DISPATCH_ERRORS_TOTAL, "type" => "unknown", "error_type" => "unknown_type")
                .increment(1);
            warn!(%session_id, tag = tag.as_str(), "no handler for message type");
            return Err(DispatchError::UnknownMessageType(tag));
        };
        counter!(MESSAGES_RECEIVED_TOTAL, "type" => tag.clone()).increment(1);

        let start = Instant::now();
        let result =
            tokio::time::timeout(self.timeout, handler.handle(session_id, data, ctx)).await;
        histogram!(DISPATCH_DURATION_SECONDS, "type" => tag.clone())
            .record(start.elapsed().as_secs_f64());

        let source = match result {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(_elapsed) => {
                error!(%session_id, tag = tag.as_str(), "handler timed out after {:?}", self.timeout);
                HandlerError::TimedOut(self.timeout)
            }
        };
        counter!(DISPATCH_ERRORS_TOTAL, "type" => tag.clone(), "error_type" => source.kind())
            .increment(1);
        Err(DispatchError::Handler { tag, source })
    }

    /// Registered tags (sorted).
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.handlers.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Whether `tag` has a handler.
    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}
