use super::{mincost_config, solver, two_use_input};
use crate::config::{LimitType, SolverConfig};
use crate::constraints::FamilyKind;
use crate::errors::LutoptError;
use crate::input::{BiodiversityLayer, Limit, ManagementOptionData};
use crate::solver::LandUseSolver;
use ndarray::array;

#[test]
fn lifecycle_requires_formulation() {
    let mut solver = solver(mincost_config());
    assert!(!solver.is_formulated());
    assert!(matches!(solver.solve(), Err(LutoptError::InvalidState(_))));
    assert!(matches!(solver.model(), Err(LutoptError::InvalidState(_))));

    let input = two_use_input(3);
    assert!(matches!(
        solver.update_from_last(input.clone(), array![4.0]),
        Err(LutoptError::InvalidState(_))
    ));

    solver.formulate(input).unwrap();
    assert!(solver.is_formulated());
}

#[test]
fn invalid_configuration_is_rejected() {
    let config = SolverConfig {
        beta: 1.5,
        ..mincost_config()
    };
    assert!(matches!(
        LandUseSolver::with_default_engine(config),
        Err(LutoptError::Configuration(_))
    ));
}

#[test]
fn formulation_counts() {
    let mut solver = solver(mincost_config());
    solver.formulate(two_use_input(3)).unwrap();

    let model = solver.model().unwrap();
    // 3 cells × 2 land uses, plus one demand deviation
    assert_eq!(model.n_variables(), 7);
    // 3 cell usage rows and 1 demand row
    assert_eq!(model.n_constraints(), 4);

    let registry = solver.registry().unwrap();
    assert_eq!(
        registry.active_families(),
        vec![FamilyKind::CellUsage, FamilyKind::Demand]
    );
    assert_eq!(registry.constraint_count(FamilyKind::CellUsage), 3);
}

#[test]
fn shape_errors_leave_the_solver_unbuilt() {
    let mut solver = solver(mincost_config());
    let mut input = two_use_input(3);
    input.ag_obj_mrj = ndarray::Array3::zeros((2, 3, 3));

    assert!(matches!(
        solver.formulate(input),
        Err(LutoptError::DataShape { .. })
    ));
    assert!(!solver.is_formulated());
}

#[test]
fn cells_without_eligible_uses_have_no_usage_row() {
    let mut input = two_use_input(3);
    input.ag_x_mrj[[0, 1, 0]] = 0.0;
    input.ag_x_mrj[[0, 1, 1]] = 0.0;

    let mut solver = solver(mincost_config());
    solver.formulate(input).unwrap();
    let registry = solver.registry().unwrap();
    assert_eq!(registry.constraint_count(FamilyKind::CellUsage), 2);
    assert!(registry.cell_usage().cell(1).is_empty());
}

#[test]
fn management_options_are_coupled_to_their_land_use() {
    let mut input = two_use_input(2);
    let option = ManagementOptionData::zeros(vec![0], 2, 2, 1);
    input.ag_managements.insert("AgTech EI".to_string(), option);

    let mut solver = solver(mincost_config());
    solver.formulate(input).unwrap();

    let registry = solver.registry().unwrap();
    // Dryland A only, in each of the 2 cells
    assert_eq!(registry.constraint_count(FamilyKind::ManagementCoupling), 2);
    assert_eq!(registry.constraint_count(FamilyKind::AdoptionCeiling), 1);
    assert!(registry
        .adoption()
        .rows()
        .exprs()
        .contains_key("AgTech EI|A"));

    let model = solver.model().unwrap();
    let names: Vec<&str> = model.constraints().map(|(_, c)| c.name.as_str()).collect();
    assert!(names.contains(&"ag_man_coupling_dry_agtech_ei_0_1"));
}

#[test]
fn empty_biodiversity_members_are_skipped() {
    let mut input = two_use_input(3);
    input.biodiv_contr_ag_j = array![1.0, 0.5];
    input.biodiversity_layers.gbf3 = BiodiversityLayer {
        names: vec!["Brigalow".to_string(), "Mallee".to_string(), "Mulga".to_string()],
        area_xr: array![[1.0, 1.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 2.0]],
    };
    input.limits.gbf3 = Limit {
        raw: array![1.0, 1.0, 0.0],
        rescale: array![1.0, 1.0, 0.0],
    };

    let mut config = mincost_config();
    config.biodiversity.gbf3 = true;
    let mut solver = solver(config);
    solver.formulate(input).unwrap();

    // Mallee has no contributing cells and Mulga a zero target
    let registry = solver.registry().unwrap();
    assert_eq!(registry.constraint_count(FamilyKind::Gbf3), 1);

    let solution = solver.solve().unwrap();
    assert_eq!(
        solution.prod_data.gbf3.keys().collect::<Vec<_>>(),
        vec!["Brigalow"]
    );
    assert!(solution.prod_data.gbf3["Brigalow"] >= 1.0 - 1e-6);
}

#[test]
fn disabled_targets_have_no_constraints() {
    let mut input = two_use_input(3);
    input.ag_g_mrj.fill(1.0);
    input.limits.ghg = Limit {
        raw: 0.0,
        rescale: 0.0,
    };
    input.biodiversity_layers.gbf2 = BiodiversityLayer {
        names: vec!["Priority areas".to_string()],
        area_xr: array![[1.0, 1.0, 1.0]],
    };
    input.limits.gbf2 = Limit {
        raw: array![10.0],
        rescale: array![10.0],
    };

    let mut solver = solver(mincost_config());
    solver.formulate(input).unwrap();
    let registry = solver.registry().unwrap();
    assert_eq!(registry.constraint_count(FamilyKind::Ghg), 0);
    assert_eq!(registry.constraint_count(FamilyKind::Gbf2), 0);
    // Both would be infeasible if they were modelled
    assert!(solver.solve().is_ok());
}

#[test]
fn hard_demand_fixes_deviation() {
    let config = SolverConfig {
        demand_constraint_type: LimitType::Hard,
        ..mincost_config()
    };
    let mut solver = solver(config);
    let mut input = two_use_input(3);
    input.set_demand(array![2.0]).unwrap();
    solver.formulate(input).unwrap();

    let vars = solver.variables().unwrap();
    let v = solver
        .model()
        .unwrap()
        .variable(vars.demand_deviation()[0])
        .unwrap();
    assert_eq!(v.ub, 0.0);
    assert!(solver.objective().unwrap().penalty.is_empty());
}
