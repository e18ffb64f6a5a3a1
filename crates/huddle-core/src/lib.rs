//! # huddle-core
//!
//! Foundation types shared by every Huddle crate.
//!
//! - [`ids`]: process-unique, monotonically assigned session ids
//! - [`envelope`]: the `{ metadata: { type }, data }` wire envelope and its codec
//! - [`messages`]: inbound/outbound type tags and their payloads
//! - [`logging`]: `tracing` subscriber initialisation

#![deny(unsafe_code)]

pub mod envelope;
pub mod ids;
pub mod logging;
pub mod messages;

pub use envelope::{Envelope, EnvelopeError, Metadata};
pub use ids::{SessionId, SessionIdAllocator};
