//! Transport client for the room event stream.
//!
//! [`TransportClient`] maintains exactly one logical connection per room
//! session. It frames outbound [`Command`]s, decodes inbound frames, and
//! drives reconnection through the [`machine::ConnectionMachine`]. It holds
//! no business state: decoded events are handed back to the caller.

pub mod backoff;
pub mod machine;
pub mod socket;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use agileparty_proto::codec::{self, Inbound};
use agileparty_proto::command::Command;
use agileparty_proto::room::{RoomId, UserId};

use self::machine::{CloseOutcome, ConnectionMachine, ConnectionState, NORMAL_CLOSURE, Observer};
use self::socket::{SocketEvent, SocketSender, SocketSignal};

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection is not open.
    #[error("not connected")]
    NotConnected,

    /// The connection has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server could not be reached.
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The upgrade request was answered with a non-101 status.
    #[error("handshake rejected with HTTP {0}")]
    Handshake(u16),

    /// The configured server URL cannot be turned into an endpoint.
    #[error("invalid event stream url {url}: {reason}")]
    InvalidEndpoint {
        /// The offending base URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A frame could not be encoded.
    #[error(transparent)]
    Codec(#[from] codec::CodecError),

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds `{base}/ws/rooms/{room}?userId={user}&nickname={nickname}`.
///
/// # Errors
///
/// Returns [`TransportError::InvalidEndpoint`] if `base` is not a
/// `ws://`/`wss://` URL that can carry a path.
pub fn endpoint(
    base: &str,
    room_id: &RoomId,
    user_id: &UserId,
    nickname: &str,
) -> Result<Url, TransportError> {
    let invalid = |reason: &str| TransportError::InvalidEndpoint {
        url: base.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(base).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(invalid("scheme must be ws or wss"));
    }
    url.path_segments_mut()
        .map_err(|()| invalid("url cannot be a base"))?
        .pop_if_empty()
        .extend(["ws", "rooms", room_id.as_str()]);
    url.query_pairs_mut()
        .clear()
        .append_pair("userId", user_id.as_str())
        .append_pair("nickname", nickname);
    Ok(url)
}

/// Something the session loop has to act on after feeding a socket event.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The stream opened.
    Opened,
    /// A frame was decoded.
    Message(Inbound),
    /// An abnormal close armed the reconnect timer.
    ReconnectScheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Maximum number of attempts.
        max_attempts: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Reconnection gave up.
    ReconnectFailed,
}

/// Connection owner for one room session.
#[derive(Debug)]
pub struct TransportClient {
    url: Url,
    connect_timeout: Duration,
    machine: ConnectionMachine,
    socket: Option<SocketSender>,
    task: Option<JoinHandle<()>>,
    reconnect_at: Option<Instant>,
    events: mpsc::UnboundedSender<SocketEvent>,
}

impl TransportClient {
    /// Creates a disconnected client. Socket signals are delivered to
    /// `events` and must be fed back through [`Self::on_socket_event`].
    #[must_use]
    pub const fn new(
        url: Url,
        connect_timeout: Duration,
        machine: ConnectionMachine,
        events: mpsc::UnboundedSender<SocketEvent>,
    ) -> Self {
        Self {
            url,
            connect_timeout,
            machine,
            socket: None,
            task: None,
            reconnect_at: None,
            events,
        }
    }

    /// Registers a connection state observer.
    pub fn observe(&mut self, observer: Observer) {
        self.machine.observe(observer);
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Whether commands can be sent right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.machine.is_connected() && self.socket.is_some()
    }

    /// When the pending reconnect attempt is due, if one is armed.
    #[must_use]
    pub const fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Opens the connection. No-op while open or opening.
    pub fn connect(&mut self) {
        if let Some(generation) = self.machine.begin_connect() {
            self.reconnect_at = None;
            self.open(generation);
        }
    }

    /// Serializes and sends `command`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] when the stream is not open.
    /// The command is dropped, never queued.
    pub fn send(&self, command: &Command) -> Result<(), TransportError> {
        let Some(socket) = self.socket.as_ref().filter(|_| self.machine.is_connected()) else {
            tracing::warn!(command = command.type_name(), "not connected, command dropped");
            return Err(TransportError::NotConnected);
        };
        let text = codec::encode_command(command)?;
        socket.send_text(text)
    }

    /// Closes with the normal code, cancels any pending reconnect and
    /// disables automatic reconnection. Late signals from the abandoned
    /// connection are ignored afterwards.
    pub fn disconnect(&mut self) {
        self.reconnect_at = None;
        self.machine.shutdown();
        if let Some(socket) = self.socket.take() {
            socket.close(NORMAL_CLOSURE, "Client disconnect");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// The reconnect timer fired.
    pub fn on_reconnect_due(&mut self) {
        self.reconnect_at = None;
        if let Some(generation) = self.machine.on_reconnect_due() {
            tracing::info!(attempt = self.machine.attempts(), "reconnecting");
            self.open(generation);
        }
    }

    /// Applies one socket signal.
    pub fn on_socket_event(&mut self, event: SocketEvent) -> Option<TransportEvent> {
        let SocketEvent { generation, signal } = event;
        if !self.machine.is_current(generation) {
            tracing::debug!(generation, "ignoring signal from superseded connection");
            return None;
        }
        match signal {
            SocketSignal::Opened(sender) => {
                if !self.machine.on_open(generation) {
                    return None;
                }
                self.socket = Some(sender);
                Some(TransportEvent::Opened)
            }
            SocketSignal::Frame(text) => match codec::decode_event(&text) {
                Ok(inbound) => Some(TransportEvent::Message(inbound)),
                Err(e) => {
                    tracing::warn!(err = %e, "malformed frame dropped");
                    None
                }
            },
            SocketSignal::Closed { code } => {
                self.socket = None;
                self.task = None;
                match self.machine.on_close(generation, code) {
                    CloseOutcome::Stale | CloseOutcome::Settled => None,
                    CloseOutcome::Retry { attempt, delay } => {
                        tracing::info!(code, attempt, ?delay, "connection lost, retry scheduled");
                        self.reconnect_at = Some(deadline_after(delay));
                        Some(TransportEvent::ReconnectScheduled {
                            attempt,
                            max_attempts: self.machine.max_attempts(),
                            delay,
                        })
                    }
                    CloseOutcome::Exhausted => {
                        tracing::warn!(
                            attempts = self.machine.max_attempts(),
                            "reconnect attempts exhausted"
                        );
                        Some(TransportEvent::ReconnectFailed)
                    }
                }
            }
        }
    }

    fn open(&mut self, generation: u64) {
        if let Some(old) = self.task.take() {
            old.abort();
        }
        self.socket = None;
        self.task = Some(socket::spawn_connection(
            self.url.clone(),
            self.connect_timeout,
            generation,
            self.events.clone(),
        ));
    }
}

/// Longest timer the session arms; larger delays are clamped to it.
const MAX_TIMER: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadline `delay` from now, clamped to [`MAX_TIMER`] so a huge configured
/// delay cannot overflow the clock.
pub(crate) fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay.min(MAX_TIMER)).unwrap_or(now)
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            socket.close(NORMAL_CLOSURE, "Client disconnect");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
