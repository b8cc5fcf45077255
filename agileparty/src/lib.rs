//! Agile Party realtime room client.
//!
//! Keeps a local copy of a planning-poker room (participants, votes,
//! reveal state, task backlog) consistent with the server over a
//! long-lived event stream.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod membership;
pub mod net;
pub mod room;
pub mod tasks;
pub mod transport;
