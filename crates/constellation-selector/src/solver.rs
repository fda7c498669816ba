//! Solver adapters
//!
//! A solver is a black box: it receives the dense QUBO matrix and returns one
//! bit-assignment per call. Adapters are picked by a string discriminator:
//!
//! | Discriminator | Adapter | Notes |
//! |---------------|---------|-------|
//! | `exact`, `exhaustive` | [`ExactSolver`] | Enumerates all 2^n states |
//! | `neal`, `anneal`, `sa` | [`AnnealSolver`] | Seeded simulated annealing |
//!
//! Both read couplings as `Q[i][j] + Q[j][i]`, so either triangle works.

use crate::{Result, Sample, SelectorError};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Default upper bound on exhaustive enumeration
pub const DEFAULT_MAX_EXACT_VARIABLES: usize = 20;

/// Default annealing sweeps per read
pub const DEFAULT_SWEEPS: usize = 1000;

/// Default inverse temperature range (hot -> cold)
pub const DEFAULT_BETA_START: f64 = 0.1;
pub const DEFAULT_BETA_END: f64 = 20.0;

/// Energies closer than this count as a tie in the exact solver
pub const ENERGY_TOLERANCE: f64 = 1e-9;

pub const DEFAULT_SEED: u64 = 0x5EED;

/// Accepts a QUBO matrix, returns a bit-assignment
pub trait SolverAdapter {
    /// Name used in logs and selection metadata
    fn name(&self) -> &str;

    /// Produce one assignment. Indices left out are read as 0.
    fn solve(&mut self, matrix: &DMatrix<f64>) -> Result<Sample>;
}

/// Known solver adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    Exact,
    Anneal,
}

impl FromStr for SolverKind {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "exhaustive" => Ok(Self::Exact),
            "neal" | "anneal" | "sa" => Ok(Self::Anneal),
            _ => Err(SelectorError::UnknownSolver(s.to_string())),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Anneal => write!(f, "anneal"),
        }
    }
}

/// Adapter settings handed to [`build_solver`].
///
/// Everything an adapter needs travels through here. A remote adapter
/// would add its auth token as a field and receive it in `build_solver`;
/// no adapter reads process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Largest model the exact solver will enumerate
    pub max_exact_variables: usize,
    /// Annealing sweeps per read
    pub sweeps: usize,
    pub beta_start: f64,
    pub beta_end: f64,
    /// Annealing RNG seed; reads continue the same stream
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_exact_variables: DEFAULT_MAX_EXACT_VARIABLES,
            sweeps: DEFAULT_SWEEPS,
            beta_start: DEFAULT_BETA_START,
            beta_end: DEFAULT_BETA_END,
            seed: DEFAULT_SEED,
        }
    }
}

/// Resolve `discriminator` to an adapter
pub fn build_solver(discriminator: &str, config: &SolverConfig) -> Result<Box<dyn SolverAdapter>> {
    let kind: SolverKind = discriminator.parse()?;
    debug!("Using {} solver", kind);

    match kind {
        SolverKind::Exact => Ok(Box::new(ExactSolver::new(config.max_exact_variables)?)),
        SolverKind::Anneal => Ok(Box::new(AnnealSolver::new(
            config.sweeps,
            config.beta_start,
            config.beta_end,
            config.seed,
        )?)),
    }
}

fn check_square(solver: &str, matrix: &DMatrix<f64>) -> Result<usize> {
    if !matrix.is_square() {
        return Err(SelectorError::SolverFailed {
            solver: solver.to_string(),
            reason: format!("matrix is {}x{}", matrix.nrows(), matrix.ncols()),
        });
    }
    Ok(matrix.nrows())
}

/// Symmetric coupling between `i` and `j`, `i != j`
fn coupling(matrix: &DMatrix<f64>, i: usize, j: usize) -> f64 {
    matrix[(i, j)] + matrix[(j, i)]
}

/// Energy change from flipping bit `i` of `state`
fn flip_delta(matrix: &DMatrix<f64>, state: &[bool], i: usize) -> f64 {
    let mut field = matrix[(i, i)];
    for (j, &on) in state.iter().enumerate() {
        if on && j != i {
            field += coupling(matrix, i, j);
        }
    }
    if state[i] {
        -field
    } else {
        field
    }
}

/// Energy without offset
fn state_energy(matrix: &DMatrix<f64>, state: &[bool]) -> f64 {
    let mut energy = 0.0;
    for i in 0..state.len() {
        if !state[i] {
            continue;
        }
        energy += matrix[(i, i)];
        for j in i + 1..state.len() {
            if state[j] {
                energy += coupling(matrix, i, j);
            }
        }
    }
    energy
}

fn to_sample(state: &[bool]) -> Sample {
    state
        .iter()
        .enumerate()
        .map(|(i, &on)| (i, on as u8))
        .collect()
}

/// Exhaustive minimizer, Gray-code order.
///
/// Deterministic; the first minimum visited wins ties, where energies
/// within [`ENERGY_TOLERANCE`] are tied.
#[derive(Debug, Clone)]
pub struct ExactSolver {
    max_variables: usize,
}

impl ExactSolver {
    pub fn new(max_variables: usize) -> Result<Self> {
        if max_variables >= 64 {
            return Err(SelectorError::InvalidConfig(format!(
                "max_exact_variables must be below 64, got {}",
                max_variables
            )));
        }
        Ok(Self { max_variables })
    }
}

impl SolverAdapter for ExactSolver {
    fn name(&self) -> &str {
        "exact"
    }

    fn solve(&mut self, matrix: &DMatrix<f64>) -> Result<Sample> {
        let n = check_square(self.name(), matrix)?;
        if n > self.max_variables {
            return Err(SelectorError::TooManyVariables {
                variables: n,
                limit: self.max_variables,
            });
        }

        let mut state = vec![false; n];
        let mut energy = 0.0;
        let mut best = state.clone();
        let mut best_energy = energy;

        // Step t flips the lowest set bit of t
        for step in 1u64..1u64 << n {
            let i = step.trailing_zeros() as usize;
            energy += flip_delta(matrix, &state, i);
            state[i] = !state[i];
            if energy < best_energy - ENERGY_TOLERANCE {
                // Resync so rounding from the running sum never decides a tie
                energy = state_energy(matrix, &state);
                best_energy = energy;
                best.clone_from(&state);
            }
        }

        debug!("Exact solver: {} states, best energy {:.6}", 1u64 << n, best_energy);
        Ok(to_sample(&best))
    }
}

/// Single-flip Metropolis annealer with a geometric beta schedule.
///
/// Returns the lowest-energy state visited, not the final one.
#[derive(Debug, Clone)]
pub struct AnnealSolver {
    sweeps: usize,
    beta_start: f64,
    beta_end: f64,
    rng: ChaCha8Rng,
}

impl AnnealSolver {
    pub fn new(sweeps: usize, beta_start: f64, beta_end: f64, seed: u64) -> Result<Self> {
        if sweeps == 0 {
            return Err(SelectorError::InvalidConfig(
                "sweeps must be positive".to_string(),
            ));
        }
        if !(beta_start > 0.0 && beta_end >= beta_start && beta_end.is_finite()) {
            return Err(SelectorError::InvalidConfig(format!(
                "beta range must satisfy 0 < start <= end, got {} -> {}",
                beta_start, beta_end
            )));
        }
        Ok(Self {
            sweeps,
            beta_start,
            beta_end,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    fn beta(&self, sweep: usize) -> f64 {
        if self.sweeps == 1 {
            return self.beta_end;
        }
        let t = sweep as f64 / (self.sweeps - 1) as f64;
        self.beta_start * (self.beta_end / self.beta_start).powf(t)
    }
}

impl SolverAdapter for AnnealSolver {
    fn name(&self) -> &str {
        "anneal"
    }

    fn solve(&mut self, matrix: &DMatrix<f64>) -> Result<Sample> {
        let n = check_square(self.name(), matrix)?;
        if n == 0 {
            return Ok(Sample::new());
        }

        let mut state: Vec<bool> = (0..n).map(|_| self.rng.gen()).collect();
        let mut energy = state_energy(matrix, &state);
        let mut best = state.clone();
        let mut best_energy = energy;

        for sweep in 0..self.sweeps {
            let beta = self.beta(sweep);
            for i in 0..n {
                let delta = flip_delta(matrix, &state, i);
                if delta <= 0.0 || self.rng.gen::<f64>() < (-beta * delta).exp() {
                    state[i] = !state[i];
                    energy += delta;
                    if energy < best_energy {
                        best_energy = energy;
                        best.clone_from(&state);
                    }
                }
            }
        }

        if !best_energy.is_finite() {
            return Err(SelectorError::SolverFailed {
                solver: self.name().to_string(),
                reason: "non-finite energy".to_string(),
            });
        }

        debug!("Anneal solver: best energy {:.6}", best_energy);
        Ok(to_sample(&best))
    }
}
