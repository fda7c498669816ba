//! Sample interpretation
//!
//! Maps the winning bit-assignment back to constellations and rescores them
//! from the dataset. Model energy mixes objective and penalty terms, so it
//! is never reported as coverage.

use crate::encoder::QuboMatrix;
use crate::scorer::score_constellation;
use crate::{CoverageDataset, Sample, ScoredConstellation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpretation {
    /// Selected constellations in matrix index order
    pub chosen: Vec<ScoredConstellation>,
    pub total_score: f64,
    /// `total_score / num_constellations`
    pub normalized_score: f64,
    /// Exactly `num_constellations` chosen and no satellite reused
    pub feasible: bool,
}

pub fn interpret(sample: &Sample, qubo: &QuboMatrix, dataset: &CoverageDataset) -> Interpretation {
    let chosen: Vec<ScoredConstellation> = qubo
        .selected_indices(sample)
        .filter_map(|i| qubo.variable(i))
        .map(|c| score_constellation(c.clone(), dataset))
        .collect();

    let total_score: f64 = chosen.iter().map(|c| c.score).sum();
    let normalized_score = total_score / dataset.num_constellations() as f64;

    let disjoint = chosen.iter().enumerate().all(|(a, c0)| {
        chosen[a + 1..]
            .iter()
            .all(|c1| c0.constellation.is_disjoint(&c1.constellation))
    });
    let feasible = disjoint && chosen.len() == dataset.num_constellations();

    Interpretation {
        chosen,
        total_score,
        normalized_score,
        feasible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;
    use crate::generator::generate;
    use crate::model::build_model;
    use crate::pipeline::SelectorConfig;
    use crate::Constellation;

    fn scenario() -> (CoverageDataset, QuboMatrix) {
        let data = CoverageDataset::new(2, vec![0.9, 0.1, 0.9, 0.1]).unwrap();
        let candidates = generate(&data, 2, 0.4);
        let model = build_model(&candidates, 2, &SelectorConfig::default());
        (data, encode(&model))
    }

    fn select(qubo: &QuboMatrix, picks: &[Constellation]) -> Sample {
        (0..qubo.len())
            .map(|i| {
                let on = qubo.variable(i).map_or(false, |v| picks.contains(v));
                (i, on as u8)
            })
            .collect()
    }

    #[test]
    fn test_rescores_selected_constellations() {
        let (data, qubo) = scenario();
        let picks = [Constellation::new([0, 3]), Constellation::new([1, 2])];
        let result = interpret(&select(&qubo, &picks), &qubo, &data);

        assert_eq!(result.chosen.len(), 2);
        assert!(result.feasible);
        assert!((result.total_score - 1.82).abs() < 1e-9);
        assert!((result.normalized_score - 0.91).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_returns_same_variables() {
        let (data, qubo) = scenario();
        let all: Vec<Constellation> = qubo.variables().to_vec();
        let result = interpret(&select(&qubo, &all), &qubo, &data);

        let chosen: Vec<Constellation> = result
            .chosen
            .iter()
            .map(|c| c.constellation.clone())
            .collect();
        assert_eq!(chosen, all);
        assert!(!result.feasible);
    }

    #[test]
    fn test_overlapping_selection_is_infeasible() {
        let (data, qubo) = scenario();
        let picks = [Constellation::new([0, 1]), Constellation::new([0, 2])];
        let result = interpret(&select(&qubo, &picks), &qubo, &data);
        assert_eq!(result.chosen.len(), 2);
        assert!(!result.feasible);
    }

    #[test]
    fn test_empty_sample() {
        let (data, qubo) = scenario();
        let result = interpret(&Sample::new(), &qubo, &data);
        assert!(result.chosen.is_empty());
        assert_eq!(result.total_score, 0.0);
        assert_eq!(result.normalized_score, 0.0);
        assert!(!result.feasible);
    }
}
