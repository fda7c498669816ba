//! Binary quadratic model construction
//!
//! The model is minimized. Three additive term groups:
//!
//! | Group | Coefficient | Applies to |
//! |-------|-------------|------------|
//! | Objective   | `-score(c)` linear | every candidate |
//! | Overlap     | `+P` quadratic | candidate pairs sharing a satellite |
//! | Cardinality | `S·(Σx - M)²` expanded | every candidate / pair |
//!
//! Expanding the cardinality term with `x² = x` gives `S·(1 - 2M)` per
//! variable, `2S` per pair and a constant `S·M²`.

use crate::generator::CandidateSet;
use crate::pipeline::SelectorConfig;
use crate::Constellation;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use tracing::{debug, info};

/// Quadratic model over binary variables with accumulating coefficients.
///
/// Variables keep their insertion order; that order is the index used by
/// [`crate::encoder`].
#[derive(Debug, Clone)]
pub struct BinaryQuadraticModel<V> {
    variables: Vec<V>,
    index: HashMap<V, usize>,
    linear: Vec<f64>,
    /// Keyed by `(lo, hi)` index pairs with `lo < hi`
    quadratic: BTreeMap<(usize, usize), f64>,
    offset: f64,
}

/// Model whose variables are candidate constellations
pub type ConstellationModel = BinaryQuadraticModel<Constellation>;

impl<V> Default for BinaryQuadraticModel<V> {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            index: HashMap::new(),
            linear: Vec::new(),
            quadratic: BTreeMap::new(),
            offset: 0.0,
        }
    }
}

impl<V: Clone + Eq + Hash> BinaryQuadraticModel<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_interactions(&self) -> usize {
        self.quadratic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in insertion order
    pub fn variables(&self) -> &[V] {
        &self.variables
    }

    pub fn index_of(&self, v: &V) -> Option<usize> {
        self.index.get(v).copied()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Register `v` with a zero bias if unseen, returning its index
    fn ensure_variable(&mut self, v: &V) -> usize {
        if let Some(&i) = self.index.get(v) {
            return i;
        }
        let i = self.variables.len();
        self.variables.push(v.clone());
        self.index.insert(v.clone(), i);
        self.linear.push(0.0);
        i
    }

    /// Add `bias` to the linear coefficient of `v`
    pub fn add_variable(&mut self, v: &V, bias: f64) {
        let i = self.ensure_variable(v);
        self.linear[i] += bias;
    }

    /// Add `bias` to the coupling between `u` and `v`.
    ///
    /// A self-coupling collapses onto the linear term since `x·x = x`.
    pub fn add_interaction(&mut self, u: &V, v: &V, bias: f64) {
        let i = self.ensure_variable(u);
        let j = self.ensure_variable(v);
        if i == j {
            self.linear[i] += bias;
            return;
        }
        *self.quadratic.entry((i.min(j), i.max(j))).or_insert(0.0) += bias;
    }

    pub fn add_offset(&mut self, offset: f64) {
        self.offset += offset;
    }

    /// Add `strength·(Σ x_v - k)²` over `variables`
    pub fn add_cardinality_constraint(&mut self, variables: &[V], k: usize, strength: f64) {
        let k = k as f64;
        for v in variables {
            self.add_variable(v, strength * (1.0 - 2.0 * k));
        }
        for (a, u) in variables.iter().enumerate() {
            for v in &variables[a + 1..] {
                self.add_interaction(u, v, 2.0 * strength);
            }
        }
        self.add_offset(strength * k * k);
    }

    pub fn linear(&self, v: &V) -> Option<f64> {
        self.index_of(v).map(|i| self.linear[i])
    }

    /// Linear coefficients in variable order
    pub fn linear_terms(&self) -> &[f64] {
        &self.linear
    }

    /// Coupling between `u` and `v`; `None` when no term was ever added
    pub fn quadratic(&self, u: &V, v: &V) -> Option<f64> {
        let i = self.index_of(u)?;
        let j = self.index_of(v)?;
        self.quadratic.get(&(i.min(j), i.max(j))).copied()
    }

    /// `((lo, hi), bias)` over all couplings, `lo < hi`
    pub fn interactions(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        self.quadratic.iter().map(|(&pair, &bias)| (pair, bias))
    }

    /// Energy of an assignment given in variable order
    pub fn energy(&self, bits: &[bool]) -> f64 {
        let bit = |i: usize| bits.get(i).copied().unwrap_or(false);

        let linear: f64 = self
            .linear
            .iter()
            .enumerate()
            .filter(|&(i, _)| bit(i))
            .map(|(_, bias)| bias)
            .sum();
        let quadratic: f64 = self
            .quadratic
            .iter()
            .filter(|&(&(i, j), _)| bit(i) && bit(j))
            .map(|(_, bias)| bias)
            .sum();

        self.offset + linear + quadratic
    }
}

/// Build the selection model from scored candidates
pub fn build_model(
    candidates: &CandidateSet,
    num_constellations: usize,
    config: &SelectorConfig,
) -> ConstellationModel {
    let mut model = ConstellationModel::new();

    // Favor high-coverage constellations
    for candidate in &candidates.candidates {
        model.add_variable(&candidate.constellation, -candidate.score);
    }

    // A satellite belongs to at most one constellation
    let variables = model.variables().to_vec();
    let mut overlaps = 0usize;
    for (a, c0) in variables.iter().enumerate() {
        for c1 in &variables[a + 1..] {
            if c0.is_disjoint(c1) {
                continue;
            }
            model.add_interaction(c0, c1, config.overlap_penalty);
            overlaps += 1;
        }
    }
    debug!("Added {} overlap penalties", overlaps);

    model.add_cardinality_constraint(
        &variables,
        num_constellations,
        config.cardinality_strength,
    );

    info!(
        "Built model: {} variables, {} interactions, offset {:.3}",
        model.num_variables(),
        model.num_interactions(),
        model.offset()
    );

    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;
    use crate::CoverageDataset;

    fn scenario_candidates() -> CandidateSet {
        let data = CoverageDataset::new(2, vec![0.9, 0.1, 0.9, 0.1]).unwrap();
        generate(&data, 2, 0.4)
    }

    fn all_assignments(n: usize) -> impl Iterator<Item = Vec<bool>> {
        (0u32..1 << n).map(move |mask| (0..n).map(|i| (mask >> i) & 1 == 1).collect())
    }

    #[test]
    fn test_coefficients_accumulate() {
        let mut bqm: BinaryQuadraticModel<&str> = BinaryQuadraticModel::new();
        bqm.add_variable(&"a", 1.5);
        bqm.add_variable(&"a", -0.5);
        bqm.add_interaction(&"a", &"b", 2.0);
        bqm.add_interaction(&"b", &"a", 1.0);

        assert_eq!(bqm.linear(&"a"), Some(1.0));
        assert_eq!(bqm.linear(&"b"), Some(0.0));
        assert_eq!(bqm.quadratic(&"a", &"b"), Some(3.0));
        assert_eq!(bqm.variables(), &["a", "b"]);
    }

    #[test]
    fn test_self_interaction_is_linear() {
        let mut bqm: BinaryQuadraticModel<u8> = BinaryQuadraticModel::new();
        bqm.add_interaction(&7, &7, 2.0);
        assert_eq!(bqm.linear(&7), Some(2.0));
        assert_eq!(bqm.num_interactions(), 0);
    }

    #[test]
    fn test_overlap_penalty_only_on_shared_satellites() {
        let candidates = scenario_candidates();
        let config = SelectorConfig::default();
        let model = build_model(&candidates, 2, &config);
        let cardinality = 2.0 * config.cardinality_strength;

        let variables = model.variables().to_vec();
        for (a, u) in variables.iter().enumerate() {
            for v in &variables[a + 1..] {
                let overlap = model.quadratic(u, v).unwrap() - cardinality;
                if u.is_disjoint(v) {
                    assert_eq!(overlap, 0.0, "{} / {}", u, v);
                } else {
                    assert_eq!(overlap, 2.0, "{} / {}", u, v);
                }
            }
        }
    }

    #[test]
    fn test_overlap_penalty_is_configurable() {
        let candidates = scenario_candidates();
        let config = SelectorConfig {
            overlap_penalty: 5.0,
            ..SelectorConfig::default()
        };
        let model = build_model(&candidates, 2, &config);

        let c01 = Constellation::new([0, 1]);
        let c02 = Constellation::new([0, 2]);
        assert_eq!(model.quadratic(&c01, &c02), Some(7.0));
    }

    #[test]
    fn test_scenario_coefficients() {
        let candidates = scenario_candidates();
        let model = build_model(&candidates, 2, &SelectorConfig::default());

        assert_eq!(model.num_variables(), 5);
        // Every pair carries the cardinality coupling
        assert_eq!(model.num_interactions(), 10);
        assert_eq!(model.offset(), 4.0);

        let c02 = Constellation::new([0, 2]);
        let c01 = Constellation::new([0, 1]);
        let c23 = Constellation::new([2, 3]);
        let linear = model.linear(&c02).unwrap();
        assert!((linear - (-0.99 - 3.0)).abs() < 1e-12, "linear: {}", linear);
        assert_eq!(model.quadratic(&c01, &c02), Some(4.0));
        assert_eq!(model.quadratic(&c01, &c23), Some(2.0));
    }

    #[test]
    fn test_cardinality_term_alone_selects_exactly_m() {
        let mut bqm: BinaryQuadraticModel<usize> = BinaryQuadraticModel::new();
        let variables = [0, 1, 2, 3];
        bqm.add_cardinality_constraint(&variables, 2, 1.0);

        let energies: Vec<(Vec<bool>, f64)> = all_assignments(4)
            .map(|bits| {
                let e = bqm.energy(&bits);
                (bits, e)
            })
            .collect();
        let min = energies
            .iter()
            .map(|(_, e)| *e)
            .fold(f64::INFINITY, f64::min);

        assert!(min.abs() < 1e-12);
        for (bits, e) in &energies {
            let chosen = bits.iter().filter(|&&b| b).count();
            if (e - min).abs() < 1e-12 {
                assert_eq!(chosen, 2, "optimum {:?} picks {}", bits, chosen);
            } else {
                assert_ne!(chosen, 2);
                // Penalty equals (chosen - 2)²
                let expected = (chosen as f64 - 2.0).powi(2);
                assert!((e - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_empty_candidates_build_empty_model() {
        let candidates = CandidateSet {
            candidates: Vec::new(),
            raw_combinations: 6,
            threshold: 0.999,
        };
        let model = build_model(&candidates, 2, &SelectorConfig::default());
        assert!(model.is_empty());
        assert_eq!(model.num_interactions(), 0);
        assert_eq!(model.offset(), 4.0);
    }
}
