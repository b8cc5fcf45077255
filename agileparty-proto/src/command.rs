//! Outbound commands (client → server).

use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// A user-initiated command, serialized as `{"type": ..., "payload": {...}}`.
///
/// Commands carry intent only. Authoritative state changes come back as
/// [`crate::event::ServerEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    /// Cast or replace this participant's vote for the active task.
    Vote {
        /// Card value (see [`crate::room::VOTE_DECK`]).
        value: String,
    },
    /// Reveal all votes of the current round.
    Reveal {},
    /// Clear the round and start a new one.
    Clear {},
    /// Change this participant's display name.
    UpdateNickname {
        /// New display name.
        nickname: String,
    },
    /// Set the room's free-form task description.
    SetTask {
        /// Description text.
        description: String,
    },
    /// Add a task to the backlog.
    CreateTask {
        /// One-line summary.
        headline: String,
        /// Longer description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Link into an external tracker.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tracker_link: Option<String>,
    },
    /// Edit an existing task.
    UpdateTask {
        /// Task to edit.
        task_id: TaskId,
        /// New summary.
        headline: String,
        /// New description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// New tracker link.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tracker_link: Option<String>,
    },
    /// Remove a task from the backlog.
    DeleteTask {
        /// Task to remove.
        task_id: TaskId,
    },
    /// Reorder the backlog; positions follow the list order.
    ReorderTasks {
        /// Task ids in their new order.
        task_ids: Vec<TaskId>,
    },
    /// Choose the task that is open for voting.
    SetActiveTask {
        /// Task to activate.
        task_id: TaskId,
    },
}

impl Command {
    /// Wire tag of this command.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Vote { .. } => "vote",
            Self::Reveal {} => "reveal",
            Self::Clear {} => "clear",
            Self::UpdateNickname { .. } => "update_nickname",
            Self::SetTask { .. } => "set_task",
            Self::CreateTask { .. } => "create_task",
            Self::UpdateTask { .. } => "update_task",
            Self::DeleteTask { .. } => "delete_task",
            Self::ReorderTasks { .. } => "reorder_tasks",
            Self::SetActiveTask { .. } => "set_active_task",
        }
    }

    /// `vote` with the given card.
    pub fn vote(value: impl Into<String>) -> Self {
        Self::Vote {
            value: value.into(),
        }
    }

    /// `create_task` with only a headline.
    pub fn create_task(headline: impl Into<String>) -> Self {
        Self::CreateTask {
            headline: headline.into(),
            description: None,
            tracker_link: None,
        }
    }

    /// `update_task` changing only the headline.
    pub fn update_task(task_id: impl Into<TaskId>, headline: impl Into<String>) -> Self {
        Self::UpdateTask {
            task_id: task_id.into(),
            headline: headline.into(),
            description: None,
            tracker_link: None,
        }
    }
}
