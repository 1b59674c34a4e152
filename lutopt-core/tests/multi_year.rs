//! Multi-year runs through the public solver interface.
//!
//! Each year's input is derived from the previous year's solution the way a
//! simulation driver would: the decoded maps become the current land-use state
//! and the allocations become the lower bounds of irreversible uses.

use is_close::is_close;
use lutopt_core::config::{ObjectiveSense, UseSettings};
use lutopt_core::{LandUseSolver, SolverConfig, SolverInputData, SolverSolution};
use ndarray::{array, Axis};

const PLANTINGS: &str = "Environmental Plantings";

/// Two cells of beef country. Plantings pay better than beef in cell 1.
fn first_year() -> SolverInputData {
    let mut input = SolverInputData::zeros(
        vec!["Beef".to_string()],
        vec![PLANTINGS.to_string()],
        vec!["beef".to_string()],
        vec!["beef".to_string()],
        2,
    );
    input.ag_x_mrj.index_axis_mut(Axis(0), 0).fill(1.0);
    input.non_ag_x_rk.fill(1.0);
    input.ag_obj_mrj[[0, 0, 0]] = 5.0;
    input.ag_obj_mrj[[0, 1, 0]] = 1.0;
    input.non_ag_obj_rk = array![[2.0], [3.0]];
    input.ag_q_mrp.fill(1.0);
    input.lu2pr_pj = array![[1.0]];
    input.pr2cm_cp = array![[1.0]];
    input.economic_base_yr_prices = array![1.0];
    input
}

/// The following year, after plantings lost most of their value
fn next_year(previous: &SolverInputData, solution: &SolverSolution) -> SolverInputData {
    let mut input = previous.clone();
    input.lumap = solution.lumap.clone();
    input.lmmap = solution.lmmap.clone();
    input.non_ag_lb_rk = solution.non_ag_x_rk.clone();
    input.non_ag_obj_rk = array![[0.5], [0.5]];
    input
}

fn config(reversible: bool) -> SolverConfig {
    let mut config = SolverConfig {
        objective: ObjectiveSense::MaxProfit,
        beta: 0.0,
        water_enabled: false,
        ghg_enabled: false,
        currency_unit: 1.0,
        ..Default::default()
    };
    config.non_ag_landuses.insert(
        PLANTINGS.to_string(),
        UseSettings {
            enabled: true,
            reversible,
        },
    );
    config
}

fn run_two_years(reversible: bool) -> (SolverSolution, SolverSolution, usize) {
    let mut solver = LandUseSolver::with_default_engine(config(reversible)).unwrap();

    let year_one = first_year();
    solver.formulate(year_one.clone()).unwrap();
    let first = solver.solve().unwrap();

    let year_two = next_year(&year_one, &first);
    let report = solver.update_from_last(year_two, array![0.0]).unwrap();
    let second = solver.solve().unwrap();
    (first, second, report.changed)
}

#[test]
fn irreversible_plantings_persist() {
    let (first, second, changed) = run_two_years(false);
    assert_eq!(first.lumap, array![0, 100]);
    assert!(is_close!(first.obj_val.objective.unwrap(), 8.0));

    // Only cell 1 changed land use and lower bound
    assert_eq!(changed, 1);
    assert_eq!(second.lumap, array![0, 100]);
    assert!(is_close!(second.non_ag_x_rk[[1, 0]], 1.0));
    assert!(is_close!(second.obj_val.objective.unwrap(), 5.5));
}

#[test]
fn reversible_plantings_are_cleared() {
    let (_, second, _) = run_two_years(true);
    assert_eq!(second.lumap, array![0, 0]);
    assert!(is_close!(second.obj_val.objective.unwrap(), 6.0));
    assert!(is_close!(second.obj_val.economy_non_ag, 0.0, abs_tol = 1e-9));
}

#[test]
fn configuration_from_toml() {
    let config = SolverConfig::from_toml_str(
        r#"
objective = "maxprofit"
beta = 0.0
water_enabled = false
ghg_enabled = false
currency_unit = 1.0

[non_ag_landuses."Environmental Plantings"]
enabled = false
"#,
    )
    .unwrap();
    let mut solver = LandUseSolver::with_default_engine(config).unwrap();
    solver.formulate(first_year()).unwrap();

    // Without plantings both cells stay in beef
    let solution = solver.solve().unwrap();
    assert_eq!(solution.lumap, array![0, 0]);
    assert!(is_close!(solution.obj_val.objective.unwrap(), 6.0));
    assert!(solution.non_ag_x_rk.iter().all(|&x| x == 0.0));
}
