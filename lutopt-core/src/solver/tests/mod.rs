//! Tests of the solver lifecycle: formulation, incremental updates and solves
//! on small hand-checkable landscapes.

#[cfg(test)]
mod formulate;
#[cfg(test)]
mod targets;

use crate::config::{LimitType, ObjectiveSense, SolverConfig};
use crate::input::SolverInputData;
use crate::solve::MicrolpEngine;
use crate::solver::LandUseSolver;
use ndarray::array;

/// Cells that may each hold dryland `A` (cost 1) or `B` (cost 2),
/// both yielding one unit of `wheat` per cell
pub(super) fn two_use_input(n_cells: usize) -> SolverInputData {
    let mut input = SolverInputData::zeros(
        vec!["A".to_string(), "B".to_string()],
        vec![],
        vec!["wheat".to_string()],
        vec!["wheat".to_string()],
        n_cells,
    );
    for r in 0..n_cells {
        input.ag_x_mrj[[0, r, 0]] = 1.0;
        input.ag_x_mrj[[0, r, 1]] = 1.0;
        input.ag_q_mrp[[0, r, 0]] = 1.0;
        input.ag_obj_mrj[[0, r, 0]] = 1.0;
        input.ag_obj_mrj[[0, r, 1]] = 2.0;
    }
    input.lu2pr_pj = array![[1.0, 1.0]];
    input.pr2cm_cp = array![[1.0]];
    input.economic_base_yr_prices = array![10.0];
    input
        .set_demand(array![n_cells as f64 + 1.0])
        .expect("demand has one entry per commodity");
    input
}

/// Minimise cost with an even split between cost and penalties
pub(super) fn mincost_config() -> SolverConfig {
    SolverConfig {
        objective: ObjectiveSense::MinCost,
        alpha: 1.0,
        beta: 0.5,
        demand_constraint_type: LimitType::Soft,
        water_enabled: false,
        ghg_enabled: false,
        currency_unit: 1.0,
        ..Default::default()
    }
}

pub(super) fn solver(config: SolverConfig) -> LandUseSolver {
    LandUseSolver::new(config, Box::new(MicrolpEngine::default())).unwrap()
}
