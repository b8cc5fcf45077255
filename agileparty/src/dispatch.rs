//! Event dispatcher: inbound event → reconciler calls.
//!
//! | event | action |
//! |---|---|
//! | `room_state` | [`RoomReconciler::apply_snapshot`] |
//! | `user_joined` / `user_left` / `user_updated` | snapshot refetch |
//! | `vote_submitted` | [`RoomReconciler::patch_user_vote_status`] |
//! | `votes_revealed` | [`RoomReconciler::replace_votes`] then `set_revealed(true, average)` |
//! | `votes_cleared` | [`RoomReconciler::set_revealed`]`(false)` |
//! | `task_list_sync` | [`TaskReconciler::replace_all`] |
//! | `task_created` | [`TaskReconciler::add`] |
//! | `task_updated` | [`TaskReconciler::update`] |
//! | `task_deleted` | [`TaskReconciler::remove`] |
//! | `tasks_reordered` | [`TaskReconciler::reorder`] |
//! | `active_task_set` | [`TaskReconciler::set_active`], delayed re-lookup if unknown |
//! | `error` | surfaced to the UI |
//! | anything else | logged and ignored |

use agileparty_proto::codec::Inbound;
use agileparty_proto::event::ServerEvent;
use agileparty_proto::task::TaskId;

use crate::room::RoomReconciler;
use crate::tasks::{ActiveResolution, TaskReconciler};

/// Work the session loop has to schedule after a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Followup {
    /// Fetch a fresh room snapshot.
    RefetchSnapshot,
    /// Re-run the active-task lookup for this id once, after a short delay.
    RetryActiveTask(TaskId),
    /// Show a server-reported error.
    ServerError {
        /// Human-readable reason.
        message: String,
        /// Machine-readable code.
        code: Option<String>,
    },
}

/// What a single dispatch changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The room state changed.
    pub room_changed: bool,
    /// The task collection or active pointer changed.
    pub tasks_changed: bool,
    /// Work to schedule.
    pub followup: Option<Followup>,
}

impl Outcome {
    const fn room(changed: bool) -> Self {
        Self {
            room_changed: changed,
            tasks_changed: false,
            followup: None,
        }
    }

    const fn tasks(changed: bool) -> Self {
        Self {
            room_changed: false,
            tasks_changed: changed,
            followup: None,
        }
    }

    const fn followup(followup: Followup) -> Self {
        Self {
            room_changed: false,
            tasks_changed: false,
            followup: Some(followup),
        }
    }
}

/// Applies one decoded frame to the reconcilers.
pub fn dispatch(inbound: Inbound, room: &mut RoomReconciler, tasks: &mut TaskReconciler) -> Outcome {
    match inbound {
        Inbound::Event(event) => apply(event, room, tasks),
        Inbound::Unrecognized(kind) => {
            tracing::warn!(kind = %kind, "unrecognized event type ignored");
            Outcome::default()
        }
    }
}

fn apply(event: ServerEvent, room: &mut RoomReconciler, tasks: &mut TaskReconciler) -> Outcome {
    tracing::debug!(kind = event.type_name(), "dispatching event");
    match event {
        ServerEvent::RoomState(snapshot) => {
            room.apply_snapshot(snapshot);
            Outcome::room(true)
        }
        ServerEvent::UserJoined(_) | ServerEvent::UserLeft(_) | ServerEvent::UserUpdated(_) => {
            Outcome::followup(Followup::RefetchSnapshot)
        }
        ServerEvent::VoteSubmitted { user_id, has_voted } => {
            Outcome::room(room.patch_user_vote_status(&user_id, has_voted))
        }
        ServerEvent::VotesRevealed { votes, average } => {
            let replaced = room.replace_votes(votes);
            let revealed = room.set_revealed(true, average);
            Outcome::room(replaced || revealed)
        }
        ServerEvent::VotesCleared {} => Outcome::room(room.set_revealed(false, None)),
        ServerEvent::TaskListSync { tasks: list } => {
            tasks.replace_all(list);
            Outcome::tasks(true)
        }
        ServerEvent::TaskCreated(payload) => Outcome::tasks(tasks.add(payload.into_task())),
        ServerEvent::TaskUpdated(payload) => Outcome::tasks(tasks.update(payload.into_task())),
        ServerEvent::TaskDeleted { task_id } => Outcome::tasks(tasks.remove(&task_id)),
        ServerEvent::TasksReordered { task_ids } => Outcome::tasks(tasks.reorder(&task_ids)),
        ServerEvent::ActiveTaskSet { task_id } => {
            match tasks.set_active(task_id.as_ref()) {
                ActiveResolution::Cleared | ActiveResolution::Resolved => Outcome::tasks(true),
                ActiveResolution::Pending => match task_id {
                    Some(id) => Outcome {
                        room_changed: false,
                        tasks_changed: true,
                        followup: Some(Followup::RetryActiveTask(id)),
                    },
                    None => Outcome::tasks(true),
                },
            }
        }
        ServerEvent::Error { message, code } => {
            tracing::warn!(message = %message, code = ?code, "server reported an error");
            Outcome::followup(Followup::ServerError { message, code })
        }
    }
}
