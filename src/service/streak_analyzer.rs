//! Longest consecutive-win run of a period.
//!
//! The outcome feed arrives ordered by match completion time, so grouping by
//! user while preserving arrival order yields each user's chronological
//! sequence without re-sorting. Users are visited in order of their first
//! appearance in the feed; among equal maxima the first visited user wins.

use crate::models::{MatchOutcome, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub user_id: UserId,
    pub longest: u32,
}

/// Longest run of `true` in a chronological win/loss sequence.
pub fn longest_streak(outcomes: &[bool]) -> u32 {
    let mut current = 0u32;
    let mut longest = 0u32;
    for &won in outcomes {
        if won {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Per-user longest streak, users in first-appearance order.
pub fn analyze(outcomes: &[MatchOutcome]) -> Vec<StreakRecord> {
    let mut order: Vec<UserId> = Vec::new();
    let mut sequences: HashMap<UserId, Vec<bool>> = HashMap::new();

    for outcome in outcomes {
        sequences
            .entry(outcome.user_id)
            .or_insert_with(|| {
                order.push(outcome.user_id);
                Vec::new()
            })
            .push(outcome.is_winner);
    }

    order
        .into_iter()
        .map(|user_id| StreakRecord {
            user_id,
            longest: sequences
                .get(&user_id)
                .map(|seq| longest_streak(seq))
                .unwrap_or(0),
        })
        .collect()
}

/// The user holding the period's longest win streak, or `None` when nobody won.
pub fn longest_win_streak(outcomes: &[MatchOutcome]) -> Option<StreakRecord> {
    let mut best: Option<StreakRecord> = None;
    for record in analyze(outcomes) {
        if record.longest > best.map_or(0, |b| b.longest) {
            best = Some(record);
        }
    }
    best
}
