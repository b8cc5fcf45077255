//! Connection state machine for one room session.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──open──▶ Connected
//!       ▲                        ▲                   │
//!       │                        │ timer        abnormal close
//!       │                        │                   ▼
//!       └──── exhausted ──── Reconnecting ◀── Disconnected
//! ```
//!
//! The machine performs no I/O. It decides, the session loop acts. Every
//! connection attempt is stamped with a generation number; callbacks from
//! an attempt that is no longer current are ignored.

use std::fmt;
use std::time::Duration;

use super::backoff::{self, Jitter, RandomJitter};
use crate::config::ReconnectConfig;

/// Close code for a normal, intentional closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Lifecycle of the event-stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection and none pending.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The stream is open.
    Connected,
    /// Waiting for the backoff timer before the next attempt.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Callback invoked synchronously on every transition with `(from, to)`.
pub type Observer = Box<dyn FnMut(ConnectionState, ConnectionState) + Send>;

/// What the session must do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The close came from a superseded attempt.
    Stale,
    /// Normal closure or reconnection disabled; stay disconnected.
    Settled,
    /// Arm the reconnect timer.
    Retry {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Attempts are exhausted; stay disconnected.
    Exhausted,
}

/// Connection state machine.
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    should_reconnect: bool,
    generation: u64,
    policy: ReconnectConfig,
    jitter: Box<dyn Jitter>,
    observers: Vec<Observer>,
}

impl fmt::Debug for ConnectionMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMachine")
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("should_reconnect", &self.should_reconnect)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl ConnectionMachine {
    /// Creates a disconnected machine using random jitter.
    #[must_use]
    pub fn new(policy: ReconnectConfig) -> Self {
        Self::with_jitter(policy, Box::new(RandomJitter))
    }

    /// Creates a disconnected machine with an explicit jitter source.
    #[must_use]
    pub fn with_jitter(policy: ReconnectConfig, jitter: Box<dyn Jitter>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            should_reconnect: true,
            generation: 0,
            policy,
            jitter,
            observers: Vec::new(),
        }
    }

    /// Registers a transition observer.
    pub fn observe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retries scheduled since the last successful open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Generation of the current attempt.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` belongs to the current attempt.
    #[must_use]
    pub const fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Whether commands may be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Maximum number of retries.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Starts a connection attempt and returns its generation.
    ///
    /// Returns `None` when a connection is already open or being opened.
    /// Re-enables automatic reconnection with a fresh attempt budget.
    pub fn begin_connect(&mut self) -> Option<u64> {
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            return None;
        }
        self.should_reconnect = true;
        self.attempts = 0;
        Some(self.start_attempt())
    }

    /// The reconnect timer fired. Returns the generation to open.
    pub fn on_reconnect_due(&mut self) -> Option<u64> {
        if self.state != ConnectionState::Reconnecting || !self.should_reconnect {
            return None;
        }
        Some(self.start_attempt())
    }

    /// The attempt with `generation` opened. Returns `false` if stale.
    pub fn on_open(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) || self.state != ConnectionState::Connecting {
            return false;
        }
        self.attempts = 0;
        self.transition(ConnectionState::Connected);
        true
    }

    /// The attempt with `generation` closed (or failed to open) with `code`.
    pub fn on_close(&mut self, generation: u64, code: u16) -> CloseOutcome {
        if !self.is_current(generation) || self.state == ConnectionState::Disconnected {
            return CloseOutcome::Stale;
        }
        self.transition(ConnectionState::Disconnected);

        if !self.should_reconnect || code == NORMAL_CLOSURE {
            return CloseOutcome::Settled;
        }
        if self.attempts >= self.policy.max_attempts {
            self.should_reconnect = false;
            self.transition(ConnectionState::Disconnected);
            return CloseOutcome::Exhausted;
        }

        self.attempts += 1;
        let delay = backoff::delay_for(&self.policy, self.attempts, self.jitter.as_mut());
        self.transition(ConnectionState::Reconnecting);
        CloseOutcome::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Explicit disconnect: disables reconnection, invalidates the current
    /// attempt and settles in `Disconnected`.
    ///
    /// Returns `true` if there was anything to tear down.
    pub fn shutdown(&mut self) -> bool {
        self.should_reconnect = false;
        self.attempts = 0;
        self.generation += 1;
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        self.transition(ConnectionState::Disconnected);
        true
    }

    fn start_attempt(&mut self) -> u64 {
        self.generation += 1;
        self.transition(ConnectionState::Connecting);
        self.generation
    }

    fn transition(&mut self, to: ConnectionState) {
        let from = self.state;
        self.state = to;
        tracing::debug!(%from, %to, generation = self.generation, "connection state");
        for observer in &mut self.observers {
            observer(from, to);
        }
    }
}
