//! Render-ready views derived from the room state.

use std::cmp::Ordering;

use agileparty_proto::room::RoomState;

use super::RoomReconciler;

/// Shown when there is no numeric average.
pub const NO_AVERAGE: &str = "N/A";

/// One bar of the results histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCount {
    /// Card value.
    pub value: String,
    /// How many participants played it.
    pub count: usize,
}

impl RoomReconciler {
    /// The average with one decimal (`"6.5"`), or [`NO_AVERAGE`].
    #[must_use]
    pub fn average_display(&self) -> String {
        self.state().map_or_else(|| NO_AVERAGE.to_string(), average_display)
    }

    /// Revealed votes grouped by value: numeric cards ascending, the rest
    /// (`"?"`) last.
    #[must_use]
    pub fn vote_counts(&self) -> Vec<VoteCount> {
        self.state().map(vote_counts).unwrap_or_default()
    }

    /// Participants who have voted this round.
    #[must_use]
    pub fn voted_count(&self) -> usize {
        self.state().map_or(0, voted_count)
    }
}

/// [`RoomReconciler::average_display`] for a published snapshot.
#[must_use]
pub fn average_display(state: &RoomState) -> String {
    match state.average {
        Some(avg) if state.is_revealed && avg.is_finite() => one_decimal(avg),
        _ => NO_AVERAGE.to_string(),
    }
}

/// [`RoomReconciler::voted_count`] for a published snapshot.
#[must_use]
pub fn voted_count(state: &RoomState) -> usize {
    state.users.iter().filter(|u| u.is_voted).count()
}

/// Formats with one decimal, rounding exact halves away from zero.
///
/// `{:.1}` rounds exact ties to even (`0.25` -> `"0.2"`). Only odd
/// multiples of 0.25 are exact ties in binary; everything else already
/// rounds to the nearest decimal.
fn one_decimal(value: f64) -> String {
    let quarters = value * 4.0;
    let exact_tie = quarters.fract() == 0.0 && (quarters - 1.0).rem_euclid(2.0) == 0.0;
    if exact_tie {
        return format!("{:.1}", (value * 10.0).round() / 10.0);
    }
    format!("{value:.1}")
}

/// [`RoomReconciler::vote_counts`] for a published snapshot.
#[must_use]
pub fn vote_counts(state: &RoomState) -> Vec<VoteCount> {
    let mut counts: Vec<VoteCount> = Vec::new();
    for vote in &state.votes {
        match counts.iter_mut().find(|c| c.value == vote.value) {
            Some(c) => c.count += 1,
            None => counts.push(VoteCount {
                value: vote.value.clone(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| card_cmp(&a.value, &b.value));
    counts
}

fn card_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>().ok(), b.parse::<f64>().ok()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
