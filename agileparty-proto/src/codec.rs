//! JSON text-frame codec for the event stream.
//!
//! Decoding is two-phase: the envelope `{type, payload}` is read first so an
//! unknown `type` can be reported as [`Inbound::Unrecognized`] instead of a
//! hard error, then the payload is decoded against the known variant.

use serde_json::{Map, Value};

use crate::command::Command;
use crate::event::ServerEvent;

/// Errors produced while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a JSON object with a string `type`.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The `type` is known but its payload does not match.
    #[error("invalid payload for {kind}: {source}")]
    Payload {
        /// Wire tag of the frame.
        kind: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A command frame carried a `type` the protocol does not define.
    #[error("unknown command type: {0}")]
    UnknownCommand(String),
}

/// Result of decoding one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A known event.
    Event(ServerEvent),
    /// A well-formed frame whose `type` this client does not know.
    Unrecognized(String),
}

#[derive(serde::Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl Envelope {
    fn parse(text: &str) -> Result<Self, CodecError> {
        serde_json::from_str(text).map_err(CodecError::Malformed)
    }

    /// Rebuilds the frame with a missing or `null` payload replaced by `{}`.
    fn normalized(self) -> (String, Value) {
        let payload = if self.payload.is_null() {
            Value::Object(Map::new())
        } else {
            self.payload
        };
        let mut frame = Map::with_capacity(2);
        frame.insert("type".to_string(), Value::String(self.kind.clone()));
        frame.insert("payload".to_string(), payload);
        (self.kind, Value::Object(frame))
    }
}

const COMMAND_TYPES: [&str; 10] = [
    "vote",
    "reveal",
    "clear",
    "update_nickname",
    "set_task",
    "create_task",
    "update_task",
    "delete_task",
    "reorder_tasks",
    "set_active_task",
];

/// Encodes a command as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_command(command: &Command) -> Result<String, CodecError> {
    serde_json::to_string(command).map_err(CodecError::Encode)
}

/// Decodes a command frame. Used by servers and test harnesses.
///
/// # Errors
///
/// Returns [`CodecError`] if the frame is malformed, names an unknown
/// command, or carries a payload of the wrong shape.
pub fn decode_command(text: &str) -> Result<Command, CodecError> {
    let (kind, frame) = Envelope::parse(text)?.normalized();
    if !COMMAND_TYPES.contains(&kind.as_str()) {
        return Err(CodecError::UnknownCommand(kind));
    }
    serde_json::from_value(frame).map_err(|source| CodecError::Payload { kind, source })
}

/// Encodes a server event as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_event(event: &ServerEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(CodecError::Encode)
}

/// Decodes an inbound event frame.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] for non-JSON or envelope-less frames
/// and [`CodecError::Payload`] when a known event has a bad payload.
/// Unknown event types are not an error.
pub fn decode_event(text: &str) -> Result<Inbound, CodecError> {
    let (kind, frame) = Envelope::parse(text)?.normalized();
    if !ServerEvent::is_known_type(&kind) {
        return Ok(Inbound::Unrecognized(kind));
    }
    serde_json::from_value(frame)
        .map(Inbound::Event)
        .map_err(|source| CodecError::Payload { kind, source })
}
