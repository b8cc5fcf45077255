//! Inbound events (server → client).

use serde::{Deserialize, Serialize};

use crate::room::{RoomState, UserId, Vote};
use crate::task::{Task, TaskId};

/// Payload of the coarse membership events (`user_joined`, `user_left`,
/// `user_updated`).
///
/// It names the participant but not the full roster, which is why these
/// events are answered with a snapshot refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChange {
    /// Affected participant.
    pub user_id: UserId,
    /// Display name, when the server includes it.
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

/// Task carried by `task_created` / `task_updated`.
///
/// Accepts both `{"task": {...}}` and the bare task object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskPayload {
    /// `{"task": {...}}`.
    Wrapped {
        /// The task.
        task: Task,
    },
    /// The task object itself.
    Bare(Task),
}

impl TaskPayload {
    /// Unwraps the carried task.
    #[must_use]
    pub fn into_task(self) -> Task {
        match self {
            Self::Wrapped { task } | Self::Bare(task) => task,
        }
    }
}

impl From<Task> for TaskPayload {
    fn from(task: Task) -> Self {
        Self::Wrapped { task }
    }
}

/// A server event, serialized as `{"type": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Full room snapshot.
    RoomState(RoomState),
    /// Someone joined the room.
    UserJoined(UserChange),
    /// Someone left the room.
    UserLeft(UserChange),
    /// Someone changed their display name.
    UserUpdated(UserChange),
    /// A participant's voted flag changed.
    VoteSubmitted {
        /// Participant whose flag changed.
        user_id: UserId,
        /// New flag value.
        has_voted: bool,
    },
    /// The round was revealed.
    VotesRevealed {
        /// All votes of the round.
        #[serde(default)]
        votes: Vec<Vote>,
        /// Mean of the numeric votes; absent when none were numeric.
        #[serde(default)]
        average: Option<f64>,
    },
    /// The round was cleared.
    VotesCleared {},
    /// Complete task list.
    TaskListSync {
        /// Every task of the room.
        #[serde(default)]
        tasks: Vec<Task>,
    },
    /// A task was added.
    TaskCreated(TaskPayload),
    /// A task was edited (or received its estimate).
    TaskUpdated(TaskPayload),
    /// A task was removed.
    TaskDeleted {
        /// Removed task.
        task_id: TaskId,
    },
    /// The backlog was reordered.
    TasksReordered {
        /// Task ids in their new order.
        task_ids: Vec<TaskId>,
    },
    /// The task open for voting changed. `null` or `""` clears it.
    ActiveTaskSet {
        /// Newly active task.
        #[serde(default)]
        task_id: Option<TaskId>,
    },
    /// The server rejected a command.
    Error {
        /// Human-readable reason.
        message: String,
        /// Machine-readable code, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ServerEvent {
    /// Every wire tag this protocol version understands.
    pub const TYPES: [&'static str; 14] = [
        "room_state",
        "user_joined",
        "user_left",
        "user_updated",
        "vote_submitted",
        "votes_revealed",
        "votes_cleared",
        "task_list_sync",
        "task_created",
        "task_updated",
        "task_deleted",
        "tasks_reordered",
        "active_task_set",
        "error",
    ];

    /// Wire tag of this event.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::RoomState(_) => "room_state",
            Self::UserJoined(_) => "user_joined",
            Self::UserLeft(_) => "user_left",
            Self::UserUpdated(_) => "user_updated",
            Self::VoteSubmitted { .. } => "vote_submitted",
            Self::VotesRevealed { .. } => "votes_revealed",
            Self::VotesCleared {} => "votes_cleared",
            Self::TaskListSync { .. } => "task_list_sync",
            Self::TaskCreated(_) => "task_created",
            Self::TaskUpdated(_) => "task_updated",
            Self::TaskDeleted { .. } => "task_deleted",
            Self::TasksReordered { .. } => "tasks_reordered",
            Self::ActiveTaskSet { .. } => "active_task_set",
            Self::Error { .. } => "error",
        }
    }

    /// Whether `tag` names a known event.
    #[must_use]
    pub fn is_known_type(tag: &str) -> bool {
        Self::TYPES.contains(&tag)
    }
}
