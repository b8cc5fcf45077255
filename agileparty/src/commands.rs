//! Command emitter: gates user commands on connection readiness.
//!
//! Commands are never queued or retried and never mutate local state.
//! Authoritative changes arrive as events.

use agileparty_proto::command::Command;

use crate::transport::{TransportClient, TransportError};

/// Errors returned by [`emit`].
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The stream is not connected; the command was dropped.
    #[error("not connected, {0} dropped")]
    NotConnected(&'static str),

    /// The transport failed to take the frame.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Anything commands can be written to.
pub trait CommandSink {
    /// Whether the sink is ready to take commands.
    fn is_connected(&self) -> bool;

    /// Writes a command frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the frame cannot be written.
    fn send(&self, command: &Command) -> Result<(), TransportError>;
}

impl CommandSink for TransportClient {
    fn is_connected(&self) -> bool {
        Self::is_connected(self)
    }

    fn send(&self, command: &Command) -> Result<(), TransportError> {
        Self::send(self, command)
    }
}

/// Forwards `command` if `sink` is connected.
///
/// # Errors
///
/// Returns [`EmitError::NotConnected`] without touching the sink when it is
/// not connected, or [`EmitError::Transport`] if the write fails.
pub fn emit(sink: &impl CommandSink, command: &Command) -> Result<(), EmitError> {
    if !sink.is_connected() {
        return Err(EmitError::NotConnected(command.type_name()));
    }
    sink.send(command)?;
    tracing::debug!(command = command.type_name(), "command sent");
    Ok(())
}
