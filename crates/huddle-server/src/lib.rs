//! # huddle-server
//!
//! Real-time chat relay over WebSocket.
//!
//! - [`registry`]: the set of open sessions, with snapshot iteration for fan-out
//! - [`session`]: per-connection state and the sequential receive loop
//! - [`dispatch`]: type-tag to handler routing
//! - [`delivery`]: unicast and broadcast with per-target failure isolation
//! - [`handlers`]: the chat protocol (`InitSession`, `PostNewRoom`, `PostMessage`)
//! - [`websocket`] and [`server`]: Axum upgrade, writer task, `/health`, `/metrics`
//! - [`shutdown`]: graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::RelayServer;
