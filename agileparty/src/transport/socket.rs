//! One WebSocket connection attempt.
//!
//! [`spawn_connection`] opens the stream, then runs a writer task fed by a
//! [`SocketSender`] and a reader loop that forwards text frames. Everything
//! it reports is stamped with the generation it was started with so the
//! owner can discard signals from attempts it has abandoned.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::TransportError;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Close code reported when the peer closed without a status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Signal from a connection attempt.
#[derive(Debug)]
pub enum SocketSignal {
    /// The handshake completed; frames can be written through the sender.
    Opened(SocketSender),
    /// A text frame arrived.
    Frame(String),
    /// The connection ended (or never opened) with this close code.
    Closed {
        /// WebSocket close code.
        code: u16,
    },
}

/// A [`SocketSignal`] tagged with the attempt that produced it.
#[derive(Debug)]
pub struct SocketEvent {
    /// Generation the attempt was started with.
    pub generation: u64,
    /// What happened.
    pub signal: SocketSignal,
}

/// Write handle for an open connection. Sends never wait for the network.
#[derive(Debug, Clone)]
pub struct SocketSender {
    tx: mpsc::UnboundedSender<Message>,
}

impl SocketSender {
    /// Wraps a raw channel; lets tests observe written frames.
    #[cfg(test)]
    pub(crate) const fn for_test(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the writer has exited.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        self.tx
            .send(Message::Text(text.into()))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Queues a close frame; the writer exits after sending it.
    pub fn close(&self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        };
        if self.tx.send(Message::Close(Some(frame))).is_err() {
            tracing::debug!("close requested on an already finished connection");
        }
    }
}

/// Opens `url` in a background task and reports on `events`.
///
/// Exactly one [`SocketSignal::Closed`] is sent per attempt, including when
/// the handshake fails or times out.
pub fn spawn_connection(
    url: Url,
    connect_timeout: Duration,
    generation: u64,
    events: mpsc::UnboundedSender<SocketEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let code = run_connection(&url, connect_timeout, generation, &events).await;
        let _ = events.send(SocketEvent {
            generation,
            signal: SocketSignal::Closed { code },
        });
    })
}

async fn run_connection(
    url: &Url,
    connect_timeout: Duration,
    generation: u64,
    events: &mpsc::UnboundedSender<SocketEvent>,
) -> u16 {
    let ws_stream = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await
    {
        Err(_) => {
            tracing::warn!(url = %redacted(url), "event stream connect timed out");
            return ABNORMAL_CLOSURE;
        }
        Ok(Err(e)) => {
            let err = map_ws_connect_error(e);
            tracing::warn!(url = %redacted(url), err = %err, "event stream connect failed");
            return ABNORMAL_CLOSURE;
        }
        Ok(Ok((ws_stream, _response))) => ws_stream,
    };
    tracing::info!(url = %redacted(url), generation, "event stream open");

    let (mut ws_sender, ws_reader) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    if events
        .send(SocketEvent {
            generation,
            signal: SocketSignal::Opened(SocketSender { tx: out_tx }),
        })
        .is_err()
    {
        // Owner is gone.
        return ABNORMAL_CLOSURE;
    }

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if let Err(e) = ws_sender.send(msg).await {
                tracing::warn!(err = %e, "event stream write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let code = reader_loop(ws_reader, generation, events).await;
    writer.abort();
    code
}

/// Forwards text frames until the stream ends; returns the close code.
async fn reader_loop(
    mut ws_reader: WsReader,
    generation: u64,
    events: &mpsc::UnboundedSender<SocketEvent>,
) -> u16 {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let signal = SocketSignal::Frame(text.as_str().to_owned());
                if events.send(SocketEvent { generation, signal }).is_err() {
                    return ABNORMAL_CLOSURE;
                }
            }
            Ok(Message::Close(frame)) => {
                let code = frame.map_or(NO_STATUS_RECEIVED, |f| u16::from(f.code));
                tracing::info!(code, "event stream closed by server");
                return code;
            }
            Ok(Message::Binary(data)) => {
                tracing::warn!(len = data.len(), "unexpected binary frame, skipping");
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(err = %e, "event stream read error");
                return ABNORMAL_CLOSURE;
            }
        }
    }
    ABNORMAL_CLOSURE
}

/// The query string carries the nickname; keep it out of the logs.
pub(crate) fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// Map a `tokio_tungstenite` connection error to a [`TransportError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                TransportError::Unreachable(io_err.to_string())
            } else {
                TransportError::Io(io_err)
            }
        }
        WsError::Http(response) => TransportError::Handshake(response.status().as_u16()),
        other => TransportError::Io(std::io::Error::other(format!(
            "event stream connection error: {other}"
        ))),
    }
}
