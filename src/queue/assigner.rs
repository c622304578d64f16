//! Exact subset-sum assignment of queued parties to a match
//!
//! Given queued parties in oldest-first order, find parties whose sizes sum
//! exactly to the target. When several parties could complete the same
//! partial sum the latest-scanned one wins, so selection favours the most
//! recently queued parties.

use crate::types::ParticipantId;

/// One queued party as seen by the assigner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub leader: ParticipantId,
    pub size: usize,
}

impl Candidate {
    pub fn new(leader: ParticipantId, size: usize) -> Self {
        Self { leader, size }
    }
}

/// Exact subset-sum search over a bounded window of candidates
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetAssigner;

impl SubsetAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Leaders whose party sizes sum exactly to `target`, or `None`.
    ///
    /// Leaders come back in backtracking order: the latest contributor to
    /// the full sum first. Each candidate is used at most once and
    /// zero-sized candidates never contribute.
    pub fn assign(&self, candidates: &[Candidate], target: usize) -> Option<Vec<ParticipantId>> {
        if target == 0 {
            return None;
        }

        let reach = Self::reach_table(candidates, target);
        if !reach[candidates.len()][target] {
            return None;
        }

        let mut chosen = Vec::new();
        let mut remaining = target;
        let mut limit = candidates.len();

        while remaining > 0 {
            // Latest candidate within the limit that completes `remaining`
            let index = (1..=limit).rev().find(|&i| {
                let size = candidates[i - 1].size;
                size > 0 && size <= remaining && reach[i - 1][remaining - size]
            })?;

            let candidate = candidates[index - 1];
            chosen.push(candidate.leader);
            remaining -= candidate.size;
            limit = index - 1;
        }

        Some(chosen)
    }

    /// `reach[i][s]`: some subset of the first `i` candidates sums to `s`
    fn reach_table(candidates: &[Candidate], target: usize) -> Vec<Vec<bool>> {
        let mut reach = Vec::with_capacity(candidates.len() + 1);
        let mut row = vec![false; target + 1];
        row[0] = true;
        reach.push(row);

        for candidate in candidates {
            let previous = &reach[reach.len() - 1];
            let mut row = previous.clone();
            if candidate.size > 0 && candidate.size <= target {
                for sum in (candidate.size..=target).rev() {
                    if previous[sum - candidate.size] {
                        row[sum] = true;
                    }
                }
            }
            reach.push(row);
        }

        reach
    }
}
