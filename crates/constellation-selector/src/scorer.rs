//! Constellation coverage scoring
//!
//! Treats each satellite's line-of-sight as an independent event:
//! Score(C) = 1 - Π_{v∈C} (1 - coverage(v))

use crate::{Constellation, CoverageDataset, ScoredConstellation};

/// Probability that at least one satellite in `constellation` covers the target
pub fn score(constellation: &Constellation, dataset: &CoverageDataset) -> f64 {
    score_satellites(constellation.satellites(), dataset)
}

/// Same as [`score`] over a raw index slice; the empty slice scores 0
pub fn score_satellites(satellites: &[usize], dataset: &CoverageDataset) -> f64 {
    let miss: f64 = satellites
        .iter()
        .map(|&satellite| 1.0 - dataset.coverage(satellite))
        .product();
    1.0 - miss
}

/// Score a constellation and pair it with its score
pub fn score_constellation(
    constellation: Constellation,
    dataset: &CoverageDataset,
) -> ScoredConstellation {
    let score = score(&constellation, dataset);
    ScoredConstellation {
        constellation,
        score,
    }
}
