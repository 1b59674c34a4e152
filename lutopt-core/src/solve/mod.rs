//! Numerical solve of a [`LinearModel`]
//!
//! The formulation never depends on a particular LP/MIP solver. A [`SolveEngine`]
//! receives the finished model and returns a value for every variable.
//! [`MicrolpEngine`] is always available; `HighsEngine` requires the `highs` feature.

#[cfg(feature = "highs")]
mod highs;
mod microlp;

#[cfg(feature = "highs")]
pub use self::highs::HighsEngine;
pub use self::microlp::MicrolpEngine;

use crate::config::SolveEngineConfig;
use crate::errors::LutoptResult;
use crate::model::{LinearModel, VarId};
use slotmap::SecondaryMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// Stopped by the time limit, the values are the best found so far
    TimeLimit,
    /// Stopped by a limit before any feasible solution was found
    NoSolution,
    Other(String),
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }

    /// Whether the engine produced variable values
    pub fn has_values(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::TimeLimit)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::TimeLimit => write!(f, "time limit reached"),
            SolveStatus::NoSolution => write!(f, "no feasible solution"),
            SolveStatus::Other(status) => write!(f, "{status}"),
        }
    }
}

/// Result of a solve
#[derive(Debug, Clone)]
pub struct RawSolution {
    pub status: SolveStatus,
    /// Objective value including its constant, `None` unless values were produced
    pub objective: Option<f64>,
    /// Value of every variable of the model, empty unless values were produced
    pub values: SecondaryMap<VarId, f64>,
}

impl RawSolution {
    pub fn without_values(status: SolveStatus) -> Self {
        Self {
            status,
            objective: None,
            values: SecondaryMap::new(),
        }
    }
}

/// Status of values returned by an engine that stopped at a limit
///
/// Engines may hand back a placeholder vector when no incumbent was found, so the
/// values only count as a solution when they are feasible for `model`.
#[cfg_attr(not(feature = "highs"), allow(dead_code))]
pub(crate) fn limit_status(
    model: &LinearModel,
    values: &SecondaryMap<VarId, f64>,
    tolerance: f64,
) -> SolveStatus {
    if model.is_feasible(values, tolerance) {
        SolveStatus::TimeLimit
    } else {
        SolveStatus::NoSolution
    }
}

pub trait SolveEngine: Send {
    fn name(&self) -> &str;

    /// Solve `model`
    ///
    /// Infeasible and unbounded models are reported through [`RawSolution::status`].
    /// Errors are reserved for failures of the engine itself.
    fn solve(&self, model: &LinearModel) -> LutoptResult<RawSolution>;
}

/// The best engine compiled in, configured from `config`
pub fn default_engine(config: &SolveEngineConfig) -> Box<dyn SolveEngine> {
    #[cfg(feature = "highs")]
    {
        Box::new(HighsEngine::new(config.clone()))
    }
    #[cfg(not(feature = "highs"))]
    {
        Box::new(MicrolpEngine::new(config.clone()))
    }
}
