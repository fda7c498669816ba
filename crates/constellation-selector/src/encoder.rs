//! Dense QUBO matrix encoding
//!
//! Convention (upper-triangular):
//! - linear coefficient of variable `i` at `[i][i]`
//! - coupling of `(i, j)`, `i < j`, at `[i][j]`; `[j][i]` stays zero
//!
//! `E(x) = offset + Σ_i Q[i][i]·x_i + Σ_{i<j} Q[i][j]·x_i·x_j`

use crate::model::BinaryQuadraticModel;
use crate::{sample_bit, Constellation, Result, Sample, SelectorError};
use nalgebra::DMatrix;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

/// QUBO matrix plus the variable <-> index bijection used to build it
#[derive(Debug, Clone)]
pub struct QuboMatrix<V = Constellation> {
    matrix: DMatrix<f64>,
    offset: f64,
    variables: Vec<V>,
    index: HashMap<V, usize>,
}

/// Materialize `model` as an upper-triangular matrix.
///
/// Indices follow the model's variable insertion order.
pub fn encode<V: Clone + Eq + Hash>(model: &BinaryQuadraticModel<V>) -> QuboMatrix<V> {
    let n = model.num_variables();
    let mut matrix = DMatrix::<f64>::zeros(n, n);

    for (i, &bias) in model.linear_terms().iter().enumerate() {
        matrix[(i, i)] = bias;
    }
    for ((i, j), bias) in model.interactions() {
        matrix[(i, j)] = bias;
    }

    let variables = model.variables().to_vec();
    let index = variables
        .iter()
        .enumerate()
        .map(|(i, v)| (v.clone(), i))
        .collect();

    debug!("Encoded {}x{} QUBO, offset {:.3}", n, n, model.offset());

    QuboMatrix {
        matrix,
        offset: model.offset(),
        variables,
        index,
    }
}

impl<V: Eq + Hash> QuboMatrix<V> {
    /// Number of variables (matrix dimension)
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Constant term; shifts every energy equally
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn variables(&self) -> &[V] {
        &self.variables
    }

    pub fn variable(&self, index: usize) -> Option<&V> {
        self.variables.get(index)
    }

    pub fn index_of(&self, v: &V) -> Option<usize> {
        self.index.get(v).copied()
    }

    /// Reject samples that reference unknown indices or non-binary values
    pub fn validate_sample(&self, sample: &Sample) -> Result<()> {
        for (&index, &bit) in sample {
            if index >= self.len() {
                return Err(SelectorError::MalformedSample(format!(
                    "index {} outside 0..{}",
                    index,
                    self.len()
                )));
            }
            if bit > 1 {
                return Err(SelectorError::MalformedSample(format!(
                    "index {} has non-binary value {}",
                    index, bit
                )));
            }
        }
        Ok(())
    }

    /// Energy of `sample` including the offset
    pub fn energy(&self, sample: &Sample) -> f64 {
        let selected: Vec<usize> = (0..self.len())
            .filter(|&i| sample_bit(sample, i))
            .collect();

        let mut energy = self.offset;
        for (a, &i) in selected.iter().enumerate() {
            energy += self.matrix[(i, i)];
            for &j in &selected[a + 1..] {
                energy += self.matrix[(i, j)];
            }
        }
        energy
    }

    /// Indices whose bit is set, ascending
    pub fn selected_indices<'a>(&'a self, sample: &'a Sample) -> impl Iterator<Item = usize> + 'a {
        (0..self.len()).filter(move |&i| sample_bit(sample, i))
    }
}
