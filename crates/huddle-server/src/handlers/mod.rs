//! Chat protocol handlers.

pub mod init_session;
pub mod message;
pub mod room;

#[cfg(test)]
pub(crate) mod test_helpers;

use huddle_core::messages::ClientMessageType;

use crate::dispatch::{DispatchError, DispatchTable};

/// Register every chat handler into `table`.
pub fn register_all(table: &mut DispatchTable) -> Result<(), DispatchError> {
    table.register(ClientMessageType::InitSession.as_str(), init_session::InitSessionHandler)?;
    table.register(ClientMessageType::PostNewRoom.as_str(), room::PostNewRoomHandler)?;
    table.register(ClientMessageType::PostMessage.as_str(), message::PostMessageHandler)?;
    Ok(())
}
