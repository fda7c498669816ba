//! Candidate constellation generation
//!
//! Enumerates every K-subset of the satellite pool in lexicographic order,
//! scores it and keeps the ones at or above the score threshold. Cost is
//! O(C(N,K)·K), which bounds the problem to tens of satellites.

use crate::scorer::score_satellites;
use crate::{Constellation, CoverageDataset, ScoredConstellation};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Scored candidates that survived the threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSet {
    /// Surviving candidates in enumeration order
    pub candidates: Vec<ScoredConstellation>,
    /// Combinations enumerated before filtering, C(N, K)
    pub raw_combinations: u64,
    pub threshold: f64,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Lexicographic k-combinations of `0..n`
pub fn combinations(n: usize, k: usize) -> impl Iterator<Item = Vec<usize>> {
    (0..n).combinations(k)
}

/// Binomial coefficient C(n, k), saturating at `u64::MAX`
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}

/// Enumerate, score and filter all constellations of `constellation_size`
pub fn generate(
    dataset: &CoverageDataset,
    constellation_size: usize,
    threshold: f64,
) -> CandidateSet {
    info!(
        "Enumerating C({}, {}) = {} combinations (threshold {:.3})",
        dataset.num_satellites(),
        constellation_size,
        binomial(dataset.num_satellites(), constellation_size),
        threshold
    );

    let mut candidates = Vec::new();
    let mut raw_combinations = 0u64;

    for satellites in combinations(dataset.num_satellites(), constellation_size) {
        raw_combinations += 1;
        let score = score_satellites(&satellites, dataset);

        if score < threshold {
            debug!("Discarded {:?} (score={:.3})", satellites, score);
            continue;
        }

        candidates.push(ScoredConstellation {
            constellation: Constellation::from(satellites),
            score,
        });
    }

    info!(
        "Kept {} of {} candidates",
        candidates.len(),
        raw_combinations
    );

    CandidateSet {
        candidates,
        raw_combinations,
        threshold,
    }
}
