//! Room state: the reconciler that owns it and the views derived from it.

pub mod reconciler;
pub mod summary;

pub use reconciler::RoomReconciler;
pub use summary::{NO_AVERAGE, VoteCount, average_display, vote_counts, voted_count};
