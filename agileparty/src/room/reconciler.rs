//! Canonical client copy of a room's live state.

use std::collections::HashSet;

use agileparty_proto::room::{RoomState, User, UserId, Vote};

/// Sole owner and mutator of the local [`RoomState`].
///
/// Every mutation keeps the reveal invariant: while the round is hidden
/// `votes` is empty and `average` is absent.
#[derive(Debug, Default)]
pub struct RoomReconciler {
    state: Option<RoomState>,
    /// Votes handed over while the round is still hidden; promoted by the
    /// following reveal.
    staged_votes: Option<Vec<Vote>>,
    last_error: Option<String>,
}

impl RoomReconciler {
    /// Creates an empty reconciler (no snapshot yet).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, once the first snapshot has arrived.
    #[must_use]
    pub const fn state(&self) -> Option<&RoomState> {
        self.state.as_ref()
    }

    /// Last snapshot fetch error, if the most recent fetch failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Overwrites the local state with `snapshot`.
    ///
    /// Duplicate user ids keep their first occurrence; a hidden snapshot
    /// carries no votes; a revealed one drops votes of absent users.
    pub fn apply_snapshot(&mut self, mut snapshot: RoomState) {
        snapshot.users = dedup_users(snapshot.users);
        if snapshot.is_revealed {
            snapshot.votes = without_orphans(dedup_votes(snapshot.votes), &snapshot.users);
        } else {
            snapshot.votes.clear();
            snapshot.average = None;
        }
        self.staged_votes = None;
        self.last_error = None;
        self.state = Some(snapshot);
    }

    /// Replaces the participant list. Returns `false` before the first
    /// snapshot.
    pub fn replace_users(&mut self, users: Vec<User>) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        state.users = dedup_users(users);
        true
    }

    /// Sets one participant's voted flag.
    ///
    /// Unknown users and a missing snapshot are a no-op (`false`); the next
    /// snapshot carries the flag anyway.
    pub fn patch_user_vote_status(&mut self, user_id: &UserId, voted: bool) -> bool {
        let Some(user) = self
            .state
            .as_mut()
            .and_then(|s| s.users.iter_mut().find(|u| &u.id == user_id))
        else {
            tracing::debug!(user = %user_id, "vote status for unknown user ignored");
            return false;
        };
        user.is_voted = voted;
        true
    }

    /// Replaces the vote list. A later vote by the same user supersedes an
    /// earlier one.
    ///
    /// While the round is hidden the votes are held back until
    /// [`Self::set_revealed`]`(true, ..)`.
    pub fn replace_votes(&mut self, votes: Vec<Vote>) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let votes = dedup_votes(votes);
        if state.is_revealed {
            state.votes = without_orphans(votes, &state.users);
        } else {
            self.staged_votes = Some(votes);
        }
        true
    }

    /// Enters or leaves the revealed sub-state.
    ///
    /// `true` keeps the votes set just before (held-back ones included) and
    /// stores `average`. `false` clears votes and average together and
    /// resets every participant's voted flag for the new round.
    pub fn set_revealed(&mut self, revealed: bool, average: Option<f64>) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        if revealed {
            if let Some(staged) = self.staged_votes.take() {
                state.votes = staged;
            }
            state.votes = without_orphans(std::mem::take(&mut state.votes), &state.users);
            state.is_revealed = true;
            state.average = average;
        } else {
            self.staged_votes = None;
            state.votes.clear();
            state.average = None;
            state.is_revealed = false;
            for user in &mut state.users {
                user.is_voted = false;
            }
        }
        true
    }

    /// Records a failed snapshot fetch. The current state is kept.
    pub fn record_fetch_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }
}

fn dedup_users(users: Vec<User>) -> Vec<User> {
    let mut seen = HashSet::with_capacity(users.len());
    users
        .into_iter()
        .filter(|u| seen.insert(u.id.clone()))
        .collect()
}

/// Keeps the last vote per user, in the position of that user's first vote.
fn dedup_votes(votes: Vec<Vote>) -> Vec<Vote> {
    let mut out: Vec<Vote> = Vec::with_capacity(votes.len());
    for vote in votes {
        if let Some(existing) = out.iter_mut().find(|v| v.user_id == vote.user_id) {
            *existing = vote;
        } else {
            out.push(vote);
        }
    }
    out
}

fn without_orphans(votes: Vec<Vote>, users: &[User]) -> Vec<Vote> {
    votes
        .into_iter()
        .filter(|v| {
            let known = users.iter().any(|u| u.id == v.user_id);
            if !known {
                tracing::warn!(user = %v.user_id, "dropping vote of user not in room");
            }
            known
        })
        .collect()
}
