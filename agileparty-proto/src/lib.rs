//! Shared protocol definitions for the Agile Party realtime wire format.
//!
//! Every frame on the event stream is a JSON object `{type, payload}`.
//! Outbound frames are [`command::Command`]s, inbound frames are
//! [`event::ServerEvent`]s; [`codec`] converts between the two.

pub mod codec;
pub mod command;
pub mod event;
pub mod room;
pub mod task;
