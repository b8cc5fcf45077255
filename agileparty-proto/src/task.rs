//! Task types for the room's estimation backlog.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::room::RoomId;

/// Estimation placeholder meaning "no consensus".
pub const UNCERTAIN_ESTIMATE: &str = "?";

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a task identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty identifier, which the server uses to
    /// mean "no task".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A backlog item that the room estimates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Room the task belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// One-line summary.
    pub headline: String,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Link into an external issue tracker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_link: Option<String>,
    /// Estimate saved after a reveal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimation: Option<String>,
    /// Display position (1-based on the server).
    #[serde(default)]
    pub position: i64,
}

impl Task {
    /// Creates an unestimated task with only the required fields.
    pub fn new(id: impl Into<String>, headline: impl Into<String>, position: i64) -> Self {
        Self {
            id: TaskId::new(id),
            room_id: None,
            headline: headline.into(),
            description: None,
            tracker_link: None,
            estimation: None,
            position,
        }
    }

    /// Builder-style helper to set the estimation.
    #[must_use]
    pub fn with_estimation(mut self, estimation: impl Into<String>) -> Self {
        self.estimation = Some(estimation.into());
        self
    }

    /// A task counts as estimated once it holds a concrete estimate.
    #[must_use]
    pub fn is_estimated(&self) -> bool {
        self.estimation
            .as_deref()
            .is_some_and(|e| !e.is_empty() && e != UNCERTAIN_ESTIMATE)
    }

    /// Total display order: ascending position, ties broken by id.
    #[must_use]
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        self.position
            .cmp(&other.position)
            .then_with(|| self.id.cmp(&other.id))
    }
}
