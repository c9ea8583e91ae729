//! Distinct clip orderings for variations.

use rand::seq::SliceRandom;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Shuffle attempts allowed per requested ordering.
pub const ATTEMPT_MULTIPLIER: usize = 50;

/// Upper bound on orderings produced by a single call.
pub const MAX_ORDERINGS: usize = 1_000;

/// `length!`, saturating at `ceiling + 1` so callers can compare against it.
fn permutation_count(length: usize, ceiling: usize) -> usize {
    let mut count: usize = 1;
    for n in 2..=length {
        count = count.saturating_mul(n);
        if count > ceiling {
            return ceiling.saturating_add(1);
        }
    }
    count
}

/// Every permutation of `0..length` (Heap's algorithm, iterative).
fn all_permutations(length: usize) -> Vec<Vec<usize>> {
    let mut current: Vec<usize> = (0..length).collect();
    let mut counters = vec![0usize; length];
    let mut out = vec![current.clone()];

    let mut i = 1;
    while i < length {
        if counters[i] < i {
            if i % 2 == 0 {
                current.swap(0, i);
            } else {
                current.swap(counters[i], i);
            }
            out.push(current.clone());
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
    out
}

/// Generate up to `limit` distinct permutations of `0..length`.
///
/// The target is `min(limit, length!, MAX_ORDERINGS)`. When the target covers
/// the whole permutation space it is enumerated and shuffled, so the count is
/// exact. Otherwise orderings are drawn by shuffling and de-duplicated, with at
/// most `target * ATTEMPT_MULTIPLIER` draws.
pub fn unique_orderings(length: usize, limit: usize) -> Vec<Vec<usize>> {
    if limit == 0 {
        return Vec::new();
    }
    if length <= 1 {
        return vec![(0..length).collect()];
    }

    let space = permutation_count(length, MAX_ORDERINGS);
    let target = limit.min(space).min(MAX_ORDERINGS);
    if target < limit {
        debug!(requested = limit, target, "Clamped ordering target");
    }

    let mut rng = rand::rng();

    if target == space {
        let mut orderings = all_permutations(length);
        orderings.shuffle(&mut rng);
        return orderings;
    }

    let mut seen: HashSet<Vec<usize>> = HashSet::with_capacity(target);
    let mut orderings = Vec::with_capacity(target);
    let max_attempts = target.saturating_mul(ATTEMPT_MULTIPLIER);
    let mut attempts = 0;

    while orderings.len() < target && attempts < max_attempts {
        attempts += 1;

        let mut candidate: Vec<usize> = (0..length).collect();
        candidate.shuffle(&mut rng);

        if seen.insert(candidate.clone()) {
            orderings.push(candidate);
        }
    }

    if orderings.len() < target {
        warn!(
            requested = target,
            produced = orderings.len(),
            attempts,
            "Could only generate {} unique orderings",
            orderings.len()
        );
    }

    orderings
}
