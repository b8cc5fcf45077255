//! Canonical client copy of the room's task backlog and active-task pointer.

use std::collections::HashSet;

use agileparty_proto::task::{Task, TaskId};

/// The task open for voting, held by id and resolved by lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveTask {
    /// No task is active.
    #[default]
    None,
    /// The id names a task in the collection.
    Resolved(TaskId),
    /// The server named a task that has not arrived yet.
    Pending(TaskId),
}

/// Result of [`TaskReconciler::set_active`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveResolution {
    /// The pointer was cleared.
    Cleared,
    /// The task was found.
    Resolved,
    /// The task is unknown; a single re-lookup should follow.
    Pending,
}

/// Sole owner and mutator of the task collection.
///
/// Tasks are kept sorted by position, ties broken by id. Ids are unique.
#[derive(Debug, Default)]
pub struct TaskReconciler {
    tasks: Vec<Task>,
    active: ActiveTask,
}

impl TaskReconciler {
    /// Creates an empty backlog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All tasks in display order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks a task up by id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// The active pointer as stored.
    #[must_use]
    pub const fn active(&self) -> &ActiveTask {
        &self.active
    }

    /// The active task with its latest attributes.
    #[must_use]
    pub fn active_task(&self) -> Option<&Task> {
        match &self.active {
            ActiveTask::Resolved(id) => self.get(id),
            ActiveTask::None | ActiveTask::Pending(_) => None,
        }
    }

    /// Replaces the whole collection. Later duplicates of an id win.
    ///
    /// A resolved active id that is no longer present is cleared; a pending
    /// one that now exists is resolved.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut seen = HashSet::with_capacity(tasks.len());
        let mut unique: Vec<Task> = tasks
            .into_iter()
            .rev()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
        unique.sort_by(Task::display_cmp);
        self.tasks = unique;
        self.reresolve();
    }

    /// Adds `task` unless its id is already present.
    pub fn add(&mut self, task: Task) -> bool {
        if self.get(&task.id).is_some() {
            tracing::debug!(task = %task.id, "duplicate task_created ignored");
            return false;
        }
        let at = self
            .tasks
            .partition_point(|t| t.display_cmp(&task).is_lt());
        self.tasks.insert(at, task);
        self.reresolve();
        true
    }

    /// Replaces the task with the same id. Unknown ids are ignored.
    pub fn update(&mut self, task: Task) -> bool {
        let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) else {
            tracing::debug!(task = %task.id, "update for unknown task ignored");
            return false;
        };
        *slot = task;
        self.tasks.sort_by(Task::display_cmp);
        true
    }

    /// Removes a task, clearing the active pointer if it named it.
    pub fn remove(&mut self, id: &TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| &t.id != id);
        if matches!(&self.active, ActiveTask::Resolved(a) | ActiveTask::Pending(a) if a == id) {
            self.active = ActiveTask::None;
        }
        self.tasks.len() != before
    }

    /// Assigns positions `1..` following `ids`.
    ///
    /// Unknown ids are skipped. Tasks not named keep their relative order
    /// after the named ones.
    pub fn reorder(&mut self, ids: &[TaskId]) -> bool {
        let mut remaining = std::mem::take(&mut self.tasks);
        let mut ordered = Vec::with_capacity(remaining.len());
        for id in ids {
            if let Some(i) = remaining.iter().position(|t| &t.id == id) {
                ordered.push(remaining.remove(i));
            }
        }
        let changed = !ordered.is_empty();
        ordered.append(&mut remaining);
        for (task, position) in ordered.iter_mut().zip(1_i64..) {
            task.position = position;
        }
        self.tasks = ordered;
        changed
    }

    /// Points the active task at `id`, or clears it for `None`/empty.
    pub fn set_active(&mut self, id: Option<&TaskId>) -> ActiveResolution {
        match id.filter(|id| !id.is_empty()) {
            None => {
                self.active = ActiveTask::None;
                ActiveResolution::Cleared
            }
            Some(id) if self.get(id).is_some() => {
                self.active = ActiveTask::Resolved(id.clone());
                ActiveResolution::Resolved
            }
            Some(id) => {
                tracing::debug!(task = %id, "active task not known yet");
                self.active = ActiveTask::Pending(id.clone());
                ActiveResolution::Pending
            }
        }
    }

    /// The delayed re-lookup for a pending active id.
    ///
    /// Resolves it if the task has arrived, otherwise leaves the pointer
    /// unset. Does nothing if the pointer has moved on from `id`.
    pub fn resolve_pending(&mut self, id: &TaskId) -> bool {
        if self.active != ActiveTask::Pending(id.clone()) {
            return false;
        }
        if self.get(id).is_some() {
            self.active = ActiveTask::Resolved(id.clone());
        } else {
            tracing::warn!(task = %id, "active task never arrived, leaving unset");
            self.active = ActiveTask::None;
        }
        true
    }

    /// `(estimated, total)`.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        progress(&self.tasks)
    }

    fn reresolve(&mut self) {
        self.active = match std::mem::take(&mut self.active) {
            ActiveTask::Resolved(id) if self.get(&id).is_none() => ActiveTask::None,
            ActiveTask::Pending(id) if self.get(&id).is_some() => ActiveTask::Resolved(id),
            other => other,
        };
    }
}

/// `(estimated, total)` for a published task list.
#[must_use]
pub fn progress(tasks: &[Task]) -> (usize, usize) {
    let estimated = tasks.iter().filter(|t| t.is_estimated()).count();
    (estimated, tasks.len())
}
