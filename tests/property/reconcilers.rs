//! Property-based tests for the room and task reconcilers.
//!
//! Uses proptest to verify:
//! 1. Under any interleaving of vote-flag patches, each participant ends
//!    with the last value written for them and the roster is unchanged.
//! 2. After any sequence of snapshot, vote and reveal updates, a hidden
//!    round carries no votes and no average, and a revealed one holds at
//!    most one vote per participant, all from the roster.
//! 3. Adding the same task twice leaves the backlog as adding it once.
//! 4. Removing a task clears the active pointer only when it named that task.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use agileparty::room::RoomReconciler;
use agileparty::tasks::{ActiveTask, TaskReconciler};
use agileparty_proto::room::{RoomState, User, UserId, VOTE_DECK, Vote};
use agileparty_proto::task::{Task, TaskId};
use proptest::prelude::*;

// --- Strategies ---

/// Participant ids `u0..u5`; ids past the roster size are strangers.
fn arb_user_index() -> impl Strategy<Value = usize> {
    0_usize..6
}

fn user_id(i: usize) -> String {
    format!("u{i}")
}

fn roster(size: usize) -> Vec<User> {
    (0..size)
        .map(|i| User::new(user_id(i), format!("Player {i}")))
        .collect()
}

fn arb_vote() -> impl Strategy<Value = Vote> {
    (arb_user_index(), prop::sample::select(VOTE_DECK.to_vec()))
        .prop_map(|(i, value)| Vote::new(user_id(i), format!("Player {i}"), value))
}

#[derive(Debug, Clone)]
enum RoundOp {
    Snapshot {
        size: usize,
        votes: Vec<Vote>,
        revealed: bool,
        average: Option<f64>,
    },
    ReplaceVotes(Vec<Vote>),
    SetRevealed(bool, Option<f64>),
    Patch(usize, bool),
}

fn arb_round_op() -> impl Strategy<Value = RoundOp> {
    let average = prop::option::of(0.0_f64..100.0);
    prop_oneof![
        (
            1_usize..5,
            prop::collection::vec(arb_vote(), 0..6),
            any::<bool>(),
            average.clone()
        )
            .prop_map(|(size, votes, revealed, average)| RoundOp::Snapshot {
                size,
                votes,
                revealed,
                average,
            }),
        prop::collection::vec(arb_vote(), 0..6).prop_map(RoundOp::ReplaceVotes),
        (any::<bool>(), average).prop_map(|(r, a)| RoundOp::SetRevealed(r, a)),
        (arb_user_index(), any::<bool>()).prop_map(|(i, v)| RoundOp::Patch(i, v)),
    ]
}

/// Task ids from a small alphabet so collisions are common.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    (0_u8..6).prop_map(|n| TaskId::new(format!("t{n}")))
}

fn arb_task() -> impl Strategy<Value = Task> {
    (arb_task_id(), "[A-Za-z ]{1,12}", 0_i64..10).prop_map(|(id, headline, position)| {
        Task::new(id.as_str(), headline, position)
    })
}

fn assert_round_invariant(r: &RoomReconciler) -> Result<(), TestCaseError> {
    let Some(state) = r.state() else {
        return Ok(());
    };
    if state.is_revealed {
        let mut voters = HashSet::new();
        for vote in &state.votes {
            prop_assert!(voters.insert(vote.user_id.clone()), "two votes by {}", vote.user_id);
            prop_assert!(state.user(&vote.user_id).is_some(), "orphan vote {:?}", vote);
        }
    } else {
        prop_assert!(state.votes.is_empty(), "hidden round shows votes: {:?}", state.votes);
        prop_assert_eq!(state.average, None);
    }
    Ok(())
}

// --- Properties ---

proptest! {
    #[test]
    fn last_vote_flag_per_user_wins(
        size in 1_usize..5,
        patches in prop::collection::vec((arb_user_index(), any::<bool>()), 0..40),
    ) {
        let mut r = RoomReconciler::new();
        r.apply_snapshot(RoomState::new("r1", "Room").with_users(roster(size)));

        let mut expected = vec![false; size];
        for (i, voted) in &patches {
            r.patch_user_vote_status(&UserId::new(user_id(*i)), *voted);
            if let Some(slot) = expected.get_mut(*i) {
                *slot = *voted;
            }
        }

        let state = r.state().unwrap();
        prop_assert_eq!(state.users.len(), size);
        for (i, user) in state.users.iter().enumerate() {
            prop_assert_eq!(user.id.as_str(), user_id(i));
            prop_assert_eq!(user.is_voted, expected[i], "flag of {}", user.id);
        }
    }

    #[test]
    fn hidden_round_never_shows_votes(ops in prop::collection::vec(arb_round_op(), 1..30)) {
        let mut r = RoomReconciler::new();
        for op in ops {
            match op {
                RoundOp::Snapshot { size, votes, revealed, average } => {
                    let mut snapshot = RoomState::new("r1", "Room").with_users(roster(size));
                    snapshot.votes = votes;
                    snapshot.is_revealed = revealed;
                    snapshot.average = average;
                    r.apply_snapshot(snapshot);
                }
                RoundOp::ReplaceVotes(votes) => {
                    r.replace_votes(votes);
                }
                RoundOp::SetRevealed(revealed, average) => {
                    r.set_revealed(revealed, average);
                    if !revealed {
                        let state = r.state();
                        prop_assert!(state.is_none_or(|s| s.users.iter().all(|u| !u.is_voted)));
                    }
                }
                RoundOp::Patch(i, voted) => {
                    r.patch_user_vote_status(&UserId::new(user_id(i)), voted);
                }
            }
            assert_round_invariant(&r)?;
        }
    }

    #[test]
    fn adding_twice_equals_adding_once(
        backlog in prop::collection::vec(arb_task(), 0..8),
        task in arb_task(),
    ) {
        let mut once = TaskReconciler::new();
        once.replace_all(backlog.clone());
        let mut twice = TaskReconciler::new();
        twice.replace_all(backlog);

        once.add(task.clone());
        twice.add(task.clone());
        prop_assert!(!twice.add(task));
        prop_assert_eq!(once.tasks(), twice.tasks());
        prop_assert_eq!(once.active(), twice.active());
    }

    #[test]
    fn remove_clears_only_the_named_active_task(
        backlog in prop::collection::vec(arb_task(), 0..8),
        active in prop::option::of(arb_task_id()),
        removed in arb_task_id(),
    ) {
        let mut r = TaskReconciler::new();
        r.replace_all(backlog);
        r.set_active(active.as_ref());
        let before = r.active().clone();

        r.remove(&removed);

        prop_assert!(r.get(&removed).is_none());
        match before {
            ActiveTask::Resolved(id) | ActiveTask::Pending(id) if id == removed => {
                prop_assert_eq!(r.active(), &ActiveTask::None);
            }
            other => {
                prop_assert_eq!(r.active(), &other);
            }
        }
    }
}
