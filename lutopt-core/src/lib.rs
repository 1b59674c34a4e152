//! Incremental formulation of land-use allocation problems.
//!
//! A [`solver::LandUseSolver`] builds a sparse linear model over
//! cell × land-use × land-management × management-option allocation variables,
//! composes a weighted economic/biodiversity objective with target penalties,
//! and on each subsequent year rebuilds only the cells whose state or
//! eligibility changed.
//! The numerical solve is delegated to a [`solve::SolveEngine`].

pub mod config;
pub mod constraints;
pub mod decode;
pub mod errors;
pub mod input;
pub mod model;
pub mod objective;
pub mod solve;
pub mod solver;
pub mod tools;
pub mod variables;

pub use config::SolverConfig;
pub use errors::{LutoptError, LutoptResult};
pub use input::SolverInputData;
pub use solver::{LandUseSolver, PreviousState, SolverSolution, UpdateReport};
