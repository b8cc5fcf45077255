//! Task backlog state owned by the session.

pub mod reconciler;

pub use reconciler::{ActiveResolution, ActiveTask, TaskReconciler, progress};
