//! Satellite Constellation Selector
//!
//! Partitions a satellite pool into `M` constellations of `K = N / M`
//! satellites each, maximizing the summed coverage probability of the
//! selected constellations.
//!
//! # Formulation
//!
//! Every `K`-subset of satellites is a binary variable `x_c`. The model
//! minimized by the solver is
//!
//! ```text
//! E(x) = -Σ score(c)·x_c + P·Σ_{c∩d≠∅} x_c·x_d + S·(Σ x_c - M)²
//! ```
//!
//! | Term | Default | Description |
//! |------|---------|-------------|
//! | score(c) | -  | `1 - Π(1 - coverage(v))`, union of independent events |
//! | P        | 2.0 | Overlap penalty for two constellations sharing a satellite |
//! | S        | 1.0 | Cardinality strength (exactly `M` constellations) |
//!
//! Candidates scoring below the threshold (default 0.4) never become
//! variables.
//!
//! # Pipeline
//!
//! 1. [`generator`] enumerates and filters candidate constellations
//! 2. [`model`] builds the binary quadratic model
//! 3. [`encoder`] lays the model out as a dense QUBO matrix
//! 4. [`solver`] samples bit-assignments from the matrix
//! 5. [`interpreter`] maps the best sample back to scored constellations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub mod encoder;
pub mod generator;
pub mod interpreter;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod scorer;
pub mod solver;

pub use encoder::QuboMatrix;
pub use generator::CandidateSet;
pub use interpreter::Interpretation;
pub use model::{BinaryQuadraticModel, ConstellationModel};
pub use pipeline::{select_constellations, select_with_solver, SelectionResult, SelectorConfig};
pub use solver::{build_solver, SolverAdapter, SolverConfig, SolverKind};

/// Minimum candidate score to become a model variable
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.4;

/// Quadratic weight between two constellations sharing a satellite
pub const DEFAULT_OVERLAP_PENALTY: f64 = 2.0;

/// Strength of the exactly-M cardinality penalty
pub const DEFAULT_CARDINALITY_STRENGTH: f64 = 1.0;

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid dataset shape: {0}")]
    InvalidShape(String),
    #[error("Missing coverage for satellite {0}")]
    MissingCoverage(usize),
    #[error("Invalid coverage for satellite {satellite}: {value} (expected 0..=1)")]
    InvalidCoverage { satellite: usize, value: f64 },
    #[error("Unrecognized solver: {0}")]
    UnknownSolver(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Solver {solver} failed: {reason}")]
    SolverFailed { solver: String, reason: String },
    #[error("Malformed sample: {0}")]
    MalformedSample(String),
    #[error("Exact solver limited to {limit} variables, model has {variables}")]
    TooManyVariables { variables: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, SelectorError>;

/// Bit-assignment returned by a solver, keyed by matrix index.
///
/// Indices absent from the map are read as 0.
pub type Sample = BTreeMap<usize, u8>;

/// Read the bit for `index`, defaulting to unselected
pub fn sample_bit(sample: &Sample, index: usize) -> bool {
    sample.get(&index).copied().unwrap_or(0) == 1
}

/// Dataset exactly as it appears on the wire.
///
/// Sizes are signed so that non-positive values surface as shape errors
/// instead of parse errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDataset {
    pub num_satellites: i64,
    pub num_constellations: i64,
    /// Satellite index (as a string) -> coverage probability
    pub coverage: BTreeMap<String, f64>,
}

/// Per-satellite coverage probabilities plus problem sizing.
///
/// Always validated: `0 < M <= N` and every coverage lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset", into = "RawDataset")]
pub struct CoverageDataset {
    num_constellations: usize,
    coverage: Vec<f64>,
}

impl CoverageDataset {
    /// Build from coverage values indexed by satellite
    pub fn new(num_constellations: usize, coverage: Vec<f64>) -> Result<Self> {
        if coverage.is_empty() {
            return Err(SelectorError::InvalidShape(
                "num_satellites must be positive".to_string(),
            ));
        }
        if num_constellations == 0 {
            return Err(SelectorError::InvalidShape(
                "num_constellations must be positive".to_string(),
            ));
        }
        if num_constellations > coverage.len() {
            return Err(SelectorError::InvalidShape(format!(
                "num_constellations ({}) exceeds num_satellites ({})",
                num_constellations,
                coverage.len()
            )));
        }

        for (satellite, &value) in coverage.iter().enumerate() {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(SelectorError::InvalidCoverage { satellite, value });
            }
        }

        if coverage.len() % num_constellations != 0 {
            warn!(
                "{} satellites do not split evenly into {} constellations; {} left uncovered",
                coverage.len(),
                num_constellations,
                coverage.len() % num_constellations
            );
        }

        Ok(Self {
            num_constellations,
            coverage,
        })
    }

    /// Parse the JSON dataset format
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawDataset = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn num_satellites(&self) -> usize {
        self.coverage.len()
    }

    pub fn num_constellations(&self) -> usize {
        self.num_constellations
    }

    /// Satellites per constellation, `N / M` rounded down
    pub fn constellation_size(&self) -> usize {
        self.coverage.len() / self.num_constellations
    }

    /// Coverage probability of one satellite
    ///
    /// # Panics
    ///
    /// Panics if `satellite >= num_satellites()`.
    pub fn coverage(&self, satellite: usize) -> f64 {
        self.coverage[satellite]
    }
}

impl TryFrom<RawDataset> for CoverageDataset {
    type Error = SelectorError;

    fn try_from(raw: RawDataset) -> Result<Self> {
        if raw.num_satellites <= 0 {
            return Err(SelectorError::InvalidShape(format!(
                "num_satellites must be positive, got {}",
                raw.num_satellites
            )));
        }
        if raw.num_constellations <= 0 {
            return Err(SelectorError::InvalidShape(format!(
                "num_constellations must be positive, got {}",
                raw.num_constellations
            )));
        }

        let num_satellites = raw.num_satellites as usize;
        let coverage = (0..num_satellites)
            .map(|satellite| {
                raw.coverage
                    .get(&satellite.to_string())
                    .copied()
                    .ok_or(SelectorError::MissingCoverage(satellite))
            })
            .collect::<Result<Vec<f64>>>()?;

        if raw.coverage.len() > num_satellites {
            warn!(
                "Ignoring {} coverage entries outside 0..{}",
                raw.coverage.len() - num_satellites,
                num_satellites
            );
        }

        Self::new(raw.num_constellations as usize, coverage)
    }
}

impl From<CoverageDataset> for RawDataset {
    fn from(dataset: CoverageDataset) -> Self {
        Self {
            num_satellites: dataset.coverage.len() as i64,
            num_constellations: dataset.num_constellations as i64,
            coverage: dataset
                .coverage
                .iter()
                .enumerate()
                .map(|(i, &c)| (i.to_string(), c))
                .collect(),
        }
    }
}

/// An unordered, duplicate-free set of satellite indices.
///
/// Stored sorted so that equality and hashing depend only on membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct Constellation(Box<[usize]>);

impl Constellation {
    pub fn new(satellites: impl IntoIterator<Item = usize>) -> Self {
        satellites.into_iter().collect::<Vec<_>>().into()
    }

    pub fn satellites(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// True when no satellite belongs to both constellations
    pub fn is_disjoint(&self, other: &Constellation) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].cmp(&other.0[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return false,
            }
        }
        true
    }
}

impl From<Vec<usize>> for Constellation {
    fn from(mut satellites: Vec<usize>) -> Self {
        satellites.sort_unstable();
        satellites.dedup();
        Self(satellites.into_boxed_slice())
    }
}

impl From<Constellation> for Vec<usize> {
    fn from(constellation: Constellation) -> Self {
        constellation.0.into_vec()
    }
}

impl FromIterator<usize> for Constellation {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for Constellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, satellite) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", satellite)?;
        }
        write!(f, "}}")
    }
}

/// A constellation with its coverage score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredConstellation {
    pub constellation: Constellation,
    /// Probability that at least one member covers the target (0-1)
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constellation_identity_ignores_order() {
        let a = Constellation::new([2, 0, 1]);
        let b = Constellation::new([0, 1, 2, 2]);
        assert_eq!(a, b);
        assert_eq!(a.satellites(), &[0, 1, 2]);
        assert_eq!(a.to_string(), "{0, 1, 2}");
    }

    #[test]
    fn test_constellation_disjoint() {
        let a = Constellation::new([0, 3]);
        let b = Constellation::new([1, 2]);
        let c = Constellation::new([2, 3]);
        assert!(a.is_disjoint(&b));
        assert!(!a.is_disjoint(&c));
        assert!(!b.is_disjoint(&c));
        assert!(a.is_disjoint(&Constellation::from(Vec::new())));
    }

    #[test]
    fn test_dataset_from_json() {
        let json = r#"{
            "num_satellites": 4,
            "num_constellations": 2,
            "coverage": {"0": 0.9, "1": 0.1, "2": 0.9, "3": 0.1}
        }"#;

        let dataset = CoverageDataset::from_json_str(json).unwrap();
        assert_eq!(dataset.num_satellites(), 4);
        assert_eq!(dataset.num_constellations(), 2);
        assert_eq!(dataset.constellation_size(), 2);
        assert_eq!(dataset.coverage(2), 0.9);
    }

    #[test]
    fn test_dataset_serde_round_trip_keeps_wire_format() {
        let dataset = CoverageDataset::new(1, vec![0.25, 0.5]).unwrap();
        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json["num_satellites"], 2);
        assert_eq!(json["coverage"]["1"], 0.5);

        let back: CoverageDataset = serde_json::from_value(json).unwrap();
        assert_eq!(back, dataset);
    }

    #[test]
    fn test_dataset_rejects_bad_shapes() {
        let zero = r#"{"num_satellites": 4, "num_constellations": 0, "coverage": {}}"#;
        assert!(matches!(
            CoverageDataset::from_json_str(zero),
            Err(SelectorError::InvalidShape(_))
        ));

        let negative = r#"{"num_satellites": -1, "num_constellations": 1, "coverage": {}}"#;
        assert!(matches!(
            CoverageDataset::from_json_str(negative),
            Err(SelectorError::InvalidShape(_))
        ));

        assert!(matches!(
            CoverageDataset::new(3, vec![0.5, 0.5]),
            Err(SelectorError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_dataset_rejects_missing_and_invalid_coverage() {
        let missing = r#"{"num_satellites": 2, "num_constellations": 1, "coverage": {"0": 0.5}}"#;
        assert!(matches!(
            CoverageDataset::from_json_str(missing),
            Err(SelectorError::MissingCoverage(1))
        ));

        assert!(matches!(
            CoverageDataset::new(1, vec![0.5, 1.5]),
            Err(SelectorError::InvalidCoverage { satellite: 1, .. })
        ));
        assert!(matches!(
            CoverageDataset::new(1, vec![f64::NAN]),
            Err(SelectorError::InvalidCoverage { satellite: 0, .. })
        ));
    }

    #[test]
    fn test_uneven_split_is_accepted() {
        let dataset = CoverageDataset::new(2, vec![0.5; 5]).unwrap();
        assert_eq!(dataset.constellation_size(), 2);
    }

    #[test]
    fn test_sample_bit_defaults_to_zero() {
        let mut sample = Sample::new();
        sample.insert(1, 1);
        assert!(sample_bit(&sample, 1));
        assert!(!sample_bit(&sample, 0));
    }
}
