//! Water yield limits and regional adoption caps

use super::{mincost_config, solver, two_use_input};
use crate::config::{LimitType, SolverConfig};
use crate::constraints::FamilyKind;
use crate::input::{Limit, RegionalAdoptionLimit, SolverInputData, WaterRegion};
use crate::model::Relation;
use crate::solver::LandUseSolver;
use is_close::is_close;
use ndarray::{array, Array1, Array2};

/// Land use B yields water, 2 ML in cell 0, 1 ML in cell 1 and 0.5 ML in cell 2
fn water_input(regions: Vec<WaterRegion>, limits: Array1<f64>) -> SolverInputData {
    let mut input = two_use_input(3);
    input.ag_w_mrj[[0, 0, 1]] = 2.0;
    input.ag_w_mrj[[0, 1, 1]] = 1.0;
    input.ag_w_mrj[[0, 2, 1]] = 0.5;
    input.water_regions = regions;
    input.limits.water = Limit {
        raw: limits.clone(),
        rescale: limits,
    };
    input
}

fn region(id: usize, name: &str, cells: Vec<usize>) -> WaterRegion {
    WaterRegion {
        id,
        name: name.to_string(),
        cells,
    }
}

fn one_region(limit: f64) -> SolverInputData {
    water_input(vec![region(1, "North", vec![0, 1, 2])], array![limit])
}

fn water_config(limit_type: LimitType) -> SolverConfig {
    SolverConfig {
        water_enabled: true,
        water_constraint_type: limit_type,
        ..mincost_config()
    }
}

fn row<'a>(solver: &'a LandUseSolver, name: &str) -> &'a crate::model::Constraint {
    solver
        .model()
        .unwrap()
        .constraints()
        .map(|(_, c)| c)
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no constraint named {name}"))
}

/// Assert that an update to `second` produces the same model as formulating it
fn assert_update_matches_fresh(
    config: SolverConfig,
    first: SolverInputData,
    second: SolverInputData,
    expected_changed: usize,
) {
    let demand = array![4.0];
    let mut incremental = solver(config.clone());
    incremental.formulate(first).unwrap();
    let report = incremental
        .update_from_last(second.clone(), demand.clone())
        .unwrap();
    assert_eq!(report.changed, expected_changed);

    let mut fresh_input = second;
    fresh_input.set_demand(demand).unwrap();
    let mut fresh = solver(config);
    fresh.formulate(fresh_input).unwrap();

    assert_eq!(
        incremental.model().unwrap().canonical_form(),
        fresh.model().unwrap().canonical_form()
    );
    assert!(incremental.model().unwrap().check_references().is_ok());
}

#[test]
fn hard_water_rows_per_region() {
    let input = water_input(
        vec![region(1, "North", vec![0, 1]), region(2, "South", vec![2])],
        array![1.5, 0.5],
    );
    let mut solver = solver(water_config(LimitType::Hard));
    solver.formulate(input).unwrap();

    let registry = solver.registry().unwrap();
    assert_eq!(registry.constraint_count(FamilyKind::Water), 2);
    assert_eq!(
        registry.water().rows().exprs().keys().collect::<Vec<_>>(),
        vec!["North", "South"]
    );
    assert!(solver.variables().unwrap().water_deviation().is_empty());

    let vars = solver.variables().unwrap();
    let north = row(&solver, "water_limit_1");
    assert_eq!(north.relation, Relation::Ge);
    assert_eq!(north.rhs, 1.5);
    assert_eq!(north.expr.coefficient(vars.ag(0, 0, 1).unwrap()), 2.0);
    assert_eq!(north.expr.coefficient(vars.ag(0, 1, 1).unwrap()), 1.0);
    // Cell 2 belongs to the southern region
    assert_eq!(north.expr.coefficient(vars.ag(0, 2, 1).unwrap()), 0.0);

    let south = row(&solver, "water_limit_2");
    assert_eq!(south.rhs, 0.5);
    assert_eq!(south.expr.coefficient(vars.ag(0, 2, 1).unwrap()), 0.5);
}

#[test]
fn soft_water_penalty_is_normalised_per_region() {
    let mut input = water_input(
        vec![region(1, "North", vec![0, 1]), region(2, "South", vec![2])],
        array![1.5, 0.5],
    );
    input.base_yr_water = 10.0;
    let mut solver = solver(water_config(LimitType::Soft));
    solver.formulate(input).unwrap();

    let registry = solver.registry().unwrap();
    assert_eq!(registry.constraint_count(FamilyKind::Water), 4);

    let vars = solver.variables().unwrap();
    assert_eq!(vars.water_deviation().len(), 2);
    let w_north = vars.water_deviation()[0];
    let upper = row(&solver, "water_limit_1_upper");
    assert_eq!(upper.relation, Relation::Le);
    assert_eq!(upper.expr.coefficient(w_north), -1.0);
    let lower = row(&solver, "water_limit_1_lower");
    assert_eq!(lower.relation, Relation::Ge);
    assert_eq!(lower.expr.coefficient(w_north), 1.0);
    assert_eq!(lower.rhs, 1.5);

    let terms = solver.objective().unwrap();
    for &w in vars.water_deviation() {
        // Weight 1 over a baseline of 10, shared by 2 regions
        assert!(is_close!(terms.penalty_water.coefficient(w), 0.05));
        // Demand and water weights sum to 2
        assert!(is_close!(terms.penalty.coefficient(w), 0.025));
    }
}

#[test]
fn hard_water_limit_moves_the_cheapest_yield_into_b() {
    let mut solver = solver(water_config(LimitType::Hard));
    solver.formulate(one_region(2.0)).unwrap();
    let solution = solver.solve().unwrap();

    // Cell 0 delivers the 2 ML at the lowest extra cost
    assert_eq!(solution.lumap, array![1, 0, 0]);
    assert!(is_close!(solution.prod_data.water["North"], 2.0));
    assert!(is_close!(solution.obj_val.economy_ag, 4.0));
    // Cost 4 × (1 - beta) plus the wheat shortfall 1 × price 10 × beta
    assert!(is_close!(solution.obj_val.objective.unwrap(), 7.0));
}

#[test]
fn soft_water_trades_yield_against_cost() {
    // A cheap penalty leaves every cell in A and the shortfall unmet
    let mut input = one_region(2.0);
    input.base_yr_water = 10.0;
    let mut solver = solver(water_config(LimitType::Soft));
    solver.formulate(input.clone()).unwrap();
    let solution = solver.solve().unwrap();
    assert_eq!(solution.lumap, array![0, 0, 0]);
    assert!(is_close!(solution.obj_val.water_deviation["North"], -2.0));
    assert!(is_close!(solution.obj_val.objective.unwrap(), 4.05));

    // An expensive one meets the limit exactly
    input.base_yr_water = 0.1;
    solver.update_from_last(input, array![4.0]).unwrap();
    let solution = solver.solve().unwrap();
    assert_eq!(solution.lumap, array![1, 0, 0]);
    assert!(is_close!(
        solution.obj_val.water_deviation["North"],
        0.0,
        abs_tol = 1e-6
    ));
    assert!(is_close!(solution.obj_val.objective.unwrap(), 4.5));
}

#[test]
fn water_update_matches_a_fresh_formulation() {
    let mut first = one_region(2.0);
    first.base_yr_water = 10.0;
    let mut second = first.clone();
    second.ag_x_mrj[[0, 2, 1]] = 0.0;
    second.limits.water = Limit {
        raw: array![1.5],
        rescale: array![1.5],
    };

    assert_update_matches_fresh(
        water_config(LimitType::Hard),
        first.clone(),
        second.clone(),
        1,
    );
    assert_update_matches_fresh(water_config(LimitType::Soft), first, second, 1);
}

fn cap(
    landuse: usize,
    landuse_name: &str,
    cells: Vec<usize>,
    area_limit: f64,
) -> RegionalAdoptionLimit {
    RegionalAdoptionLimit {
        region_id: 7,
        landuse,
        landuse_name: landuse_name.to_string(),
        cells,
        area_limit,
    }
}

fn regional_config() -> SolverConfig {
    SolverConfig {
        regional_adoption: true,
        ..mincost_config()
    }
}

/// Land use A is cheapest in cell 1 and capped at 1 ha over all cells
fn capped_ag_input() -> SolverInputData {
    let mut input = two_use_input(3);
    input.ag_obj_mrj[[0, 1, 0]] = 0.5;
    input.limits.ag_regional_adoption = vec![cap(0, "A", vec![0, 1, 2], 1.0)];
    input
}

/// Plantings pay 1 in cells 0 and 1 and 3 in cell 2, capped at 1 ha
fn capped_non_ag_input() -> SolverInputData {
    let mut input = SolverInputData::zeros(
        vec!["A".to_string(), "B".to_string()],
        vec!["Environmental Plantings".to_string()],
        vec!["wheat".to_string()],
        vec!["wheat".to_string()],
        3,
    );
    let base = two_use_input(3);
    input.ag_x_mrj = base.ag_x_mrj;
    input.ag_q_mrp = base.ag_q_mrp;
    input.ag_obj_mrj = base.ag_obj_mrj;
    input.lu2pr_pj = base.lu2pr_pj;
    input.pr2cm_cp = base.pr2cm_cp;
    input.economic_base_yr_prices = base.economic_base_yr_prices;
    input.limits.demand = base.limits.demand;
    input.non_ag_x_rk = Array2::ones((3, 1));
    input.non_ag_obj_rk = array![[-1.0], [-1.0], [-3.0]];
    input.limits.non_ag_regional_adoption =
        vec![cap(0, "Environmental Plantings", vec![0, 1, 2], 1.0)];
    input
}

#[test]
fn regional_cap_rows_weight_cells_by_area() {
    let mut input = two_use_input(3);
    input.real_area = array![1.0, 2.0, 1.0];
    input.limits.ag_regional_adoption = vec![cap(0, "A", vec![0, 1], 1.5)];

    let mut solver = solver(regional_config());
    solver.formulate(input.clone()).unwrap();
    let registry = solver.registry().unwrap();
    assert_eq!(registry.constraint_count(FamilyKind::AgRegionalAdoption), 1);
    assert_eq!(registry.constraint_count(FamilyKind::NonAgRegionalAdoption), 0);

    let vars = solver.variables().unwrap();
    let limit = row(&solver, "reg_adopt_limit_ag_A_7");
    assert_eq!(limit.relation, Relation::Le);
    assert_eq!(limit.rhs, 1.5);
    assert_eq!(limit.expr.coefficient(vars.ag(0, 0, 0).unwrap()), 1.0);
    assert_eq!(limit.expr.coefficient(vars.ag(0, 1, 0).unwrap()), 2.0);
    assert_eq!(limit.expr.coefficient(vars.ag(0, 2, 0).unwrap()), 0.0);
    assert_eq!(limit.expr.coefficient(vars.ag(0, 0, 1).unwrap()), 0.0);

    // Caps are ignored unless enabled
    let mut solver = super::solver(mincost_config());
    solver.formulate(input).unwrap();
    assert_eq!(
        solver
            .registry()
            .unwrap()
            .constraint_count(FamilyKind::AgRegionalAdoption),
        0
    );
}

#[test]
fn non_ag_cap_row() {
    let mut solver = solver(regional_config());
    solver.formulate(capped_non_ag_input()).unwrap();

    let registry = solver.registry().unwrap();
    assert_eq!(registry.constraint_count(FamilyKind::NonAgRegionalAdoption), 1);
    let vars = solver.variables().unwrap();
    let limit = row(&solver, "reg_adopt_limit_non_ag_Environmental_Plantings_7");
    assert_eq!(limit.rhs, 1.0);
    for r in 0..3 {
        assert_eq!(limit.expr.coefficient(vars.non_ag(r, 0).unwrap()), 1.0);
    }
}

#[test]
fn ag_cap_limits_the_cheaper_use() {
    let mut uncapped = solver(mincost_config());
    uncapped.formulate(capped_ag_input()).unwrap();
    assert_eq!(uncapped.solve().unwrap().lumap, array![0, 0, 0]);

    let mut solver = solver(regional_config());
    solver.formulate(capped_ag_input()).unwrap();
    let solution = solver.solve().unwrap();

    // The single hectare of A goes where it saves the most
    assert_eq!(solution.lumap, array![1, 0, 1]);
    assert!(is_close!(solution.obj_val.economy_ag, 4.5));
    assert!(is_close!(solution.obj_val.objective.unwrap(), 7.25));
}

#[test]
fn non_ag_cap_limits_plantings() {
    let config = SolverConfig {
        beta: 0.0,
        ..regional_config()
    };
    let mut solver = solver(config.clone());
    solver.formulate(capped_non_ag_input()).unwrap();
    let solution = solver.solve().unwrap();

    assert_eq!(solution.lumap, array![0, 0, 100]);
    assert!(is_close!(solution.non_ag_x_rk[[2, 0]], 1.0));
    assert!(is_close!(solution.obj_val.objective.unwrap(), -1.0));

    let mut uncapped = super::solver(SolverConfig {
        regional_adoption: false,
        ..config
    });
    uncapped.formulate(capped_non_ag_input()).unwrap();
    assert_eq!(uncapped.solve().unwrap().lumap, array![100, 100, 100]);
}

#[test]
fn regional_update_matches_a_fresh_formulation() {
    let first = capped_ag_input();
    let mut second = first.clone();
    second.ag_x_mrj[[0, 0, 0]] = 0.0;
    second.limits.ag_regional_adoption = vec![cap(0, "A", vec![0, 1, 2], 2.0)];
    assert_update_matches_fresh(regional_config(), first, second, 1);

    let first = capped_non_ag_input();
    let mut second = first.clone();
    second.non_ag_x_rk[[1, 0]] = 0.0;
    second.limits.non_ag_regional_adoption =
        vec![cap(0, "Environmental Plantings", vec![0, 2], 1.0)];
    assert_update_matches_fresh(regional_config(), first, second, 1);
}

