//! Session runtime: one room membership driven by a single task.
//!
//! [`spawn_net`] starts a session loop that exclusively owns the
//! [`TransportClient`], both reconcilers, the reconnect timer and the
//! active-task retry timer. Nothing else touches them, so no locking is
//! needed. Callers talk to the loop through a [`NetHandle`] and observe it
//! through a stream of [`NetEvent`]s.
//!
//! # Architecture
//!
//! ```text
//! caller  ─── NetCommand ──▶  session loop  ◀── SocketEvent ── connection task
//!         ◀── NetEvent ────                 ◀── FetchResult ── snapshot request
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use agileparty_proto::codec::Inbound;
use agileparty_proto::command::Command;
use agileparty_proto::room::{RoomId, RoomState, UserId};
use agileparty_proto::task::{Task, TaskId};

use crate::api::{ApiError, RoomApi};
use crate::commands;
use crate::config::{ClientConfig, ReconnectConfig};
use crate::dispatch::{self, Followup};
use crate::room::RoomReconciler;
use crate::tasks::TaskReconciler;
use crate::transport::machine::{ConnectionMachine, ConnectionState};
use crate::transport::socket::SocketEvent;
use crate::transport::{self, TransportClient, TransportError, TransportEvent};

/// Errors returned by [`spawn_net`] and [`NetHandle`].
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The session loop has exited.
    #[error("session has shut down")]
    Closed,

    /// The session could not be set up.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Commands sent from the caller to the session loop.
#[derive(Debug)]
pub enum NetCommand {
    /// Forward a command to the server if connected.
    Command(Command),
    /// Open the connection again after a disconnect or exhausted retries.
    Connect,
    /// Close the connection and cancel timers; the session stays alive.
    Disconnect,
    /// Tear the session down and exit the loop.
    Shutdown,
}

/// Events sent from the session loop to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    /// The connection state changed.
    ConnectionChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
    },
    /// The connection dropped and a retry is armed.
    ReconnectScheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Attempts allowed before giving up.
        max_attempts: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// Retries are exhausted; the session stays disconnected.
    ReconnectFailed,
    /// The room state changed.
    RoomUpdated(RoomState),
    /// The backlog or the active task changed.
    TasksUpdated {
        /// All tasks in display order.
        tasks: Vec<Task>,
        /// The resolved active task, if any.
        active: Option<TaskId>,
    },
    /// The server reported an error.
    ServerError {
        /// Human-readable reason.
        message: String,
        /// Machine-readable code.
        code: Option<String>,
    },
    /// A snapshot fetch failed; the previous room state is kept.
    SnapshotFailed(String),
    /// A command was not sent because the stream was not connected.
    CommandDropped(&'static str),
}

/// Configuration for one room session.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Base URL of the event-stream server.
    pub ws_url: String,
    /// Room to join.
    pub room_id: RoomId,
    /// This participant.
    pub user_id: UserId,
    /// Display name sent on connect.
    pub nickname: String,
    /// Limit for a single connection attempt.
    pub connect_timeout: Duration,
    /// Backoff policy.
    pub reconnect: ReconnectConfig,
    /// Delay before re-looking-up an unknown active task.
    pub active_task_retry: Duration,
    /// Capacity of the command channel.
    pub channel_capacity: usize,
}

impl NetConfig {
    /// Creates a `NetConfig` with default timings.
    #[must_use]
    pub fn new(
        ws_url: impl Into<String>,
        room_id: RoomId,
        user_id: UserId,
        nickname: impl Into<String>,
    ) -> Self {
        let mut config = ClientConfig::default().net_config_for(room_id, user_id, "");
        config.ws_url = ws_url.into();
        config.nickname = nickname.into();
        config
    }
}

/// Caller side of a running session.
///
/// Dropping the handle tears the session down like [`Self::shutdown`],
/// without waiting for it.
#[derive(Debug)]
pub struct NetHandle {
    commands: mpsc::Sender<NetCommand>,
    task: JoinHandle<()>,
    room_id: RoomId,
    user_id: UserId,
}

impl NetHandle {
    /// Room this session is bound to.
    #[must_use]
    pub const fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Participant this session is bound to.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Forwards `command` to the session loop.
    ///
    /// Whether it reaches the server depends on the connection state; a
    /// dropped command is reported as [`NetEvent::CommandDropped`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn send(&self, command: Command) -> Result<(), NetError> {
        self.request(NetCommand::Command(command)).await
    }

    /// Casts or replaces this participant's vote.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn vote(&self, value: impl Into<String>) -> Result<(), NetError> {
        self.send(Command::vote(value)).await
    }

    /// Reveals the round.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn reveal(&self) -> Result<(), NetError> {
        self.send(Command::Reveal {}).await
    }

    /// Clears the round.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn clear(&self) -> Result<(), NetError> {
        self.send(Command::Clear {}).await
    }

    /// Changes this participant's display name.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn rename(&self, nickname: impl Into<String>) -> Result<(), NetError> {
        self.send(Command::UpdateNickname {
            nickname: nickname.into(),
        })
        .await
    }

    /// Sets the room's free-form task description.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn set_task(&self, description: impl Into<String>) -> Result<(), NetError> {
        self.send(Command::SetTask {
            description: description.into(),
        })
        .await
    }

    /// Adds a task to the backlog.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn create_task(&self, headline: impl Into<String>) -> Result<(), NetError> {
        self.send(Command::create_task(headline)).await
    }

    /// Renames a task.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn update_task(
        &self,
        task_id: TaskId,
        headline: impl Into<String>,
    ) -> Result<(), NetError> {
        self.send(Command::update_task(task_id, headline)).await
    }

    /// Removes a task.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<(), NetError> {
        self.send(Command::DeleteTask { task_id }).await
    }

    /// Reorders the backlog.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn reorder(&self, task_ids: Vec<TaskId>) -> Result<(), NetError> {
        self.send(Command::ReorderTasks { task_ids }).await
    }

    /// Opens a task for voting.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn set_active_task(&self, task_id: TaskId) -> Result<(), NetError> {
        self.send(Command::SetActiveTask { task_id }).await
    }

    /// Reopens the connection with a fresh retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn connect(&self) -> Result<(), NetError> {
        self.request(NetCommand::Connect).await
    }

    /// Closes the connection normally and cancels pending timers.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] if the session loop has exited.
    pub async fn disconnect(&self) -> Result<(), NetError> {
        self.request(NetCommand::Disconnect).await
    }

    /// Tears the session down and waits for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(NetCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(err = %e, "session task ended abnormally");
        }
    }

    async fn request(&self, command: NetCommand) -> Result<(), NetError> {
        self.commands.send(command).await.map_err(|_| NetError::Closed)
    }
}

/// Spawn the session loop for `config` and return its handle and events.
///
/// The loop connects immediately. The first [`NetEvent`] is the
/// `Disconnected → Connecting` transition.
///
/// # Errors
///
/// Returns [`NetError::Transport`] if the endpoint URL cannot be built.
pub fn spawn_net<A: RoomApi + 'static>(
    config: NetConfig,
    api: Arc<A>,
) -> Result<(NetHandle, mpsc::UnboundedReceiver<NetEvent>), NetError> {
    let url = transport::endpoint(
        &config.ws_url,
        &config.room_id,
        &config.user_id,
        &config.nickname,
    )?;
    let machine = ConnectionMachine::new(config.reconnect.clone());

    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity.max(1));
    let (evt_tx, evt_rx) = mpsc::unbounded_channel();
    let (socket_tx, socket_rx) = mpsc::unbounded_channel();
    let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();

    tracing::info!(
        room = %config.room_id,
        user = %config.user_id,
        url = %transport::socket::redacted(&url),
        "starting room session"
    );
    let room_id = config.room_id.clone();
    let user_id = config.user_id.clone();
    let session = Session::new(&config, url, machine, api, evt_tx, socket_tx, fetch_tx);
    let task = tokio::spawn(session.run(cmd_rx, socket_rx, fetch_rx));

    Ok((
        NetHandle {
            commands: cmd_tx,
            task,
            room_id,
            user_id,
        },
        evt_rx,
    ))
}

/// Result of a spawned snapshot request, tagged with its issue order.
#[derive(Debug)]
struct FetchResult {
    seq: u64,
    result: Result<RoomState, ApiError>,
}

struct Session<A> {
    room_id: RoomId,
    api: Arc<A>,
    transport: TransportClient,
    room: RoomReconciler,
    tasks: TaskReconciler,
    events: mpsc::UnboundedSender<NetEvent>,
    fetches: mpsc::UnboundedSender<FetchResult>,
    /// Sequence number of the newest issued fetch; only its result applies.
    fetch_seq: u64,
    active_retry_delay: Duration,
    active_retry: Option<(TaskId, Instant)>,
}

impl<A: RoomApi + 'static> Session<A> {
    fn new(
        config: &NetConfig,
        url: Url,
        machine: ConnectionMachine,
        api: Arc<A>,
        events: mpsc::UnboundedSender<NetEvent>,
        socket_events: mpsc::UnboundedSender<SocketEvent>,
        fetches: mpsc::UnboundedSender<FetchResult>,
    ) -> Self {
        let mut transport = TransportClient::new(url, config.connect_timeout, machine, socket_events);
        let observer = events.clone();
        transport.observe(Box::new(move |from, to| {
            let _ = observer.send(NetEvent::ConnectionChanged { from, to });
        }));
        Self {
            room_id: config.room_id.clone(),
            api,
            transport,
            room: RoomReconciler::new(),
            tasks: TaskReconciler::new(),
            events,
            fetches,
            fetch_seq: 0,
            active_retry_delay: config.active_task_retry,
            active_retry: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<NetCommand>,
        mut socket: mpsc::UnboundedReceiver<SocketEvent>,
        mut fetches: mpsc::UnboundedReceiver<FetchResult>,
    ) {
        self.transport.connect();
        loop {
            let reconnect_at = self.transport.reconnect_deadline();
            let retry_at = self.active_retry.as_ref().map(|(_, at)| *at);
            tokio::select! {
                command = commands.recv() => match command {
                    Some(NetCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(event) = socket.recv() => self.on_socket_event(event),
                Some(fetched) = fetches.recv() => self.on_fetch(fetched),
                () = sleep_until_opt(reconnect_at) => self.transport.on_reconnect_due(),
                () = sleep_until_opt(retry_at) => self.on_active_retry_due(),
            }
        }
        self.transport.disconnect();
        tracing::info!(room = %self.room_id, "room session closed");
    }

    fn on_command(&mut self, command: NetCommand) {
        match command {
            NetCommand::Command(command) => {
                if let Err(e) = commands::emit(&self.transport, &command) {
                    tracing::warn!(err = %e, "command not sent");
                    self.emit(NetEvent::CommandDropped(command.type_name()));
                }
            }
            NetCommand::Connect => self.transport.connect(),
            NetCommand::Disconnect => {
                self.transport.disconnect();
                self.active_retry = None;
                // In-flight fetches belong to the abandoned connection.
                self.fetch_seq += 1;
            }
            NetCommand::Shutdown => {}
        }
    }

    fn on_socket_event(&mut self, event: SocketEvent) {
        let Some(event) = self.transport.on_socket_event(event) else {
            return;
        };
        match event {
            TransportEvent::Opened => self.fetch_snapshot(),
            TransportEvent::Message(inbound) => self.on_inbound(inbound),
            TransportEvent::ReconnectScheduled {
                attempt,
                max_attempts,
                delay,
            } => self.emit(NetEvent::ReconnectScheduled {
                attempt,
                max_attempts,
                delay,
            }),
            TransportEvent::ReconnectFailed => self.emit(NetEvent::ReconnectFailed),
        }
    }

    fn on_inbound(&mut self, inbound: Inbound) {
        let outcome = dispatch::dispatch(inbound, &mut self.room, &mut self.tasks);
        if outcome.room_changed {
            self.publish_room();
        }
        if outcome.tasks_changed {
            self.publish_tasks();
        }
        match outcome.followup {
            None => {}
            Some(Followup::RefetchSnapshot) => self.fetch_snapshot(),
            Some(Followup::RetryActiveTask(id)) => {
                let due = transport::deadline_after(self.active_retry_delay);
                self.active_retry = Some((id, due));
            }
            Some(Followup::ServerError { message, code }) => {
                self.emit(NetEvent::ServerError { message, code });
            }
        }
    }

    fn on_active_retry_due(&mut self) {
        let Some((id, _)) = self.active_retry.take() else {
            return;
        };
        if self.tasks.resolve_pending(&id) {
            self.publish_tasks();
        }
    }

    fn fetch_snapshot(&mut self) {
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let api = Arc::clone(&self.api);
        let room_id = self.room_id.clone();
        let results = self.fetches.clone();
        tracing::debug!(seq, room = %room_id, "fetching room snapshot");
        tokio::spawn(async move {
            let result = api.room_state(&room_id).await;
            let _ = results.send(FetchResult { seq, result });
        });
    }

    fn on_fetch(&mut self, fetched: FetchResult) {
        let FetchResult { seq, result } = fetched;
        if seq != self.fetch_seq {
            tracing::debug!(seq, latest = self.fetch_seq, "discarding superseded snapshot");
            return;
        }
        match result {
            Ok(snapshot) => {
                self.room.apply_snapshot(snapshot);
                self.publish_room();
            }
            Err(e) => {
                tracing::warn!(err = %e, room = %self.room_id, "snapshot fetch failed");
                let message = e.to_string();
                self.room.record_fetch_error(message.clone());
                self.emit(NetEvent::SnapshotFailed(message));
            }
        }
    }

    fn publish_room(&self) {
        if let Some(state) = self.room.state() {
            self.emit(NetEvent::RoomUpdated(state.clone()));
        }
    }

    fn publish_tasks(&self) {
        self.emit(NetEvent::TasksUpdated {
            tasks: self.tasks.tasks().to_vec(),
            active: self.tasks.active_task().map(|t| t.id.clone()),
        });
    }

    fn emit(&self, event: NetEvent) {
        // The caller may have stopped listening; the session keeps running.
        let _ = self.events.send(event);
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
