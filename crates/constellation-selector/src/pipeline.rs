//! End-to-end constellation selection
//!
//! validate -> generate -> build -> encode -> solve (`num_reads` times)
//! -> pick lowest energy -> interpret

use crate::encoder::{encode, QuboMatrix};
use crate::generator::generate;
use crate::interpreter::interpret;
use crate::model::build_model;
use crate::solver::{build_solver, SolverAdapter, SolverConfig};
use crate::{
    CoverageDataset, Result, Sample, ScoredConstellation, SelectorError,
    DEFAULT_CARDINALITY_STRENGTH, DEFAULT_OVERLAP_PENALTY, DEFAULT_SCORE_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Selection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Candidates scoring below this never become variables
    pub score_threshold: f64,
    /// Coupling added between constellations that share a satellite
    pub overlap_penalty: f64,
    /// Weight of the exactly-M constraint
    pub cardinality_strength: f64,
    /// Solver calls per run; the lowest-energy sample wins
    pub num_reads: usize,
    /// Solver discriminator, see [`crate::solver`]
    pub solver: String,
    pub solver_config: SolverConfig,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            overlap_penalty: DEFAULT_OVERLAP_PENALTY,
            cardinality_strength: DEFAULT_CARDINALITY_STRENGTH,
            num_reads: 1,
            solver: "anneal".to_string(),
            solver_config: SolverConfig::default(),
        }
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_reads == 0 {
            return Err(SelectorError::InvalidConfig(
                "num_reads must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("score_threshold", self.score_threshold),
            ("overlap_penalty", self.overlap_penalty),
            ("cardinality_strength", self.cardinality_strength),
        ] {
            if !value.is_finite() {
                return Err(SelectorError::InvalidConfig(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Final selection result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub chosen: Vec<ScoredConstellation>,
    pub total_score: f64,
    pub normalized_score: f64,
    /// Model energy of the winning sample, offset included
    pub best_energy: f64,
    /// Exactly M disjoint constellations were selected
    pub feasible: bool,
    pub metadata: SelectionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionMetadata {
    pub num_satellites: usize,
    pub num_constellations: usize,
    pub constellation_size: usize,
    pub raw_combinations: u64,
    pub candidates: usize,
    pub num_reads: usize,
    pub solver: String,
    pub generated_at: String,
}

impl SelectionResult {
    /// Human-readable report, one line per constellation plus totals
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .chosen
            .iter()
            .map(|c| format!("Constellation: {}, Score: {}", c.constellation, c.score))
            .collect();
        lines.push(format!("Total Score: {}", self.total_score));
        lines.push(format!(
            "Normalized Score (tot / # constellations): {}",
            self.normalized_score
        ));
        lines
    }
}

/// Run the full pipeline with the solver named in `config`.
///
/// An unknown solver is reported before any model is built.
pub fn select_constellations(
    dataset: &CoverageDataset,
    config: &SelectorConfig,
) -> Result<SelectionResult> {
    config.validate()?;
    let mut solver = build_solver(&config.solver, &config.solver_config)?;
    select_with_solver(dataset, config, solver.as_mut())
}

/// Run the full pipeline with a caller-supplied solver
pub fn select_with_solver(
    dataset: &CoverageDataset,
    config: &SelectorConfig,
    solver: &mut dyn SolverAdapter,
) -> Result<SelectionResult> {
    config.validate()?;

    let num_constellations = dataset.num_constellations();
    let constellation_size = dataset.constellation_size();
    info!(
        "Selecting {} constellations of {} from {} satellites",
        num_constellations,
        constellation_size,
        dataset.num_satellites()
    );

    let candidates = generate(dataset, constellation_size, config.score_threshold);
    if candidates.is_empty() {
        warn!(
            "No candidate reached threshold {:.3}; model is empty",
            config.score_threshold
        );
    }

    let model = build_model(&candidates, num_constellations, config);
    let qubo = encode(&model);

    let (best, best_energy) = best_sample(solver, &qubo, config.num_reads)?;
    let interpretation = interpret(&best, &qubo, dataset);

    if !interpretation.feasible && !candidates.is_empty() {
        warn!(
            "Best sample selects {} constellations (wanted {} disjoint)",
            interpretation.chosen.len(),
            num_constellations
        );
    }

    let result = SelectionResult {
        chosen: interpretation.chosen,
        total_score: interpretation.total_score,
        normalized_score: interpretation.normalized_score,
        best_energy,
        feasible: interpretation.feasible,
        metadata: SelectionMetadata {
            num_satellites: dataset.num_satellites(),
            num_constellations,
            constellation_size,
            raw_combinations: candidates.raw_combinations,
            candidates: candidates.len(),
            num_reads: config.num_reads,
            solver: solver.name().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        },
    };

    for line in result.summary_lines() {
        info!("{}", line);
    }

    Ok(result)
}

/// Call the solver `num_reads` times; keep the lowest recomputed energy.
///
/// Ties go to the earliest read. Any solver error or malformed sample
/// aborts the run. An empty model never reaches the solver: its only
/// sample is the empty one.
pub fn best_sample(
    solver: &mut dyn SolverAdapter,
    qubo: &QuboMatrix,
    num_reads: usize,
) -> Result<(Sample, f64)> {
    if qubo.is_empty() {
        debug!("Empty model; skipping {}", solver.name());
        return Ok((Sample::new(), qubo.offset()));
    }

    let mut best: Option<(Sample, f64)> = None;

    for read in 0..num_reads {
        let sample = solver.solve(qubo.matrix())?;
        qubo.validate_sample(&sample)?;
        let energy = qubo.energy(&sample);
        debug!("Read {}: energy {:.6}", read, energy);

        let better = match &best {
            Some((_, best_energy)) => energy < *best_energy,
            None => true,
        };
        if better {
            best = Some((sample, energy));
        }
    }

    best.ok_or_else(|| SelectorError::InvalidConfig("num_reads must be positive".to_string()))
}
