//! Allocation and deviation variables
//!
//! The [`VariableStore`] is the only owner of allocation variable handles.
//! Variables exist only for eligible (cell, use) pairs, so a missing handle means the
//! allocation is forced to zero. All variables of a cell can be removed and
//! recreated without touching the handles of any other cell.

use crate::config::{AllocationDomain, SolverConfig};
use crate::errors::{LutoptError, LutoptResult};
use crate::input::{SolverInputData, N_LAND_MANAGEMENTS};
use crate::model::{LinExpr, LinearModel, VarId, VarKind};
use crate::tools::{am_name_snake_case, LAND_MANAGEMENT_NAMES};
use indexmap::IndexMap;
use log::debug;
use ndarray::{Array2, Array3};
use slotmap::SecondaryMap;

type HandleGrid = Array2<Option<VarId>>;

#[derive(Debug, Clone)]
pub struct VariableStore {
    n_cells: usize,
    /// Per land management, shape (r, j)
    ag: [HandleGrid; N_LAND_MANAGEMENTS],
    /// Shape (r, k)
    non_ag: HandleGrid,
    /// Per option and land management, shape (r, j_idx)
    ag_man: IndexMap<String, [HandleGrid; N_LAND_MANAGEMENTS]>,
    demand_deviation: Vec<VarId>,
    ghg_deviation: Option<VarId>,
    water_deviation: Vec<VarId>,
}

impl VariableStore {
    /// Create every allocation and deviation variable for `input`
    pub fn build(
        model: &mut LinearModel,
        input: &SolverInputData,
        config: &SolverConfig,
    ) -> LutoptResult<Self> {
        let n_cells = input.n_cells();
        let empty = |n: usize| Array2::from_elem((n_cells, n), None);
        let mut store = Self {
            n_cells,
            ag: [empty(input.n_ag()), empty(input.n_ag())],
            non_ag: empty(input.n_non_ag()),
            ag_man: input
                .ag_managements
                .iter()
                .map(|(am, data)| {
                    let n = data.landuses.len();
                    (am.clone(), [empty(n), empty(n)])
                })
                .collect(),
            demand_deviation: vec![],
            ghg_deviation: None,
            water_deviation: vec![],
        };

        for r in 0..n_cells {
            store.create_cell(model, input, config, r)?;
        }
        store.sync_deviations(model, input, config)?;

        debug!(
            "Created {} allocation variables over {} cells",
            model.n_variables(),
            n_cells
        );
        Ok(store)
    }

    /// Remove and recreate every allocation variable of the given cells
    ///
    /// Removal is done in a single batch before any variable is recreated.
    pub fn rebuild_cells(
        &mut self,
        model: &mut LinearModel,
        input: &SolverInputData,
        config: &SolverConfig,
        cells: &[usize],
    ) -> LutoptResult<()> {
        let removed: Vec<VarId> = cells
            .iter()
            .flat_map(|&r| self.take_cell(r))
            .collect();
        model.remove_variables(removed);

        for &r in cells {
            self.create_cell(model, input, config, r)?;
        }
        Ok(())
    }

    fn create_cell(
        &mut self,
        model: &mut LinearModel,
        input: &SolverInputData,
        config: &SolverConfig,
        r: usize,
    ) -> LutoptResult<()> {
        if r >= self.n_cells {
            return Err(LutoptError::ContractViolation(format!(
                "cell {r} is outside the {} cells of the model",
                self.n_cells
            )));
        }
        let kind = match config.allocation_domain {
            AllocationDomain::Continuous => VarKind::Continuous,
            AllocationDomain::Binary => VarKind::Binary,
        };

        for (m, lm) in LAND_MANAGEMENT_NAMES.iter().enumerate() {
            for j in 0..input.n_ag() {
                if input.ag_x_mrj[[m, r, j]] > 0.0 {
                    let id = model.add_variable(format!("x_ag_{lm}_{j}_{r}"), 0.0, 1.0, kind);
                    self.ag[m][[r, j]] = Some(id);
                }
            }
        }

        for (k, name) in input.non_ag_landuses.iter().enumerate() {
            let settings = config.non_ag_landuse(name);
            let ub = input.non_ag_x_rk[[r, k]];
            if !settings.enabled || ub <= 0.0 {
                continue;
            }
            let lb = if settings.reversible {
                0.0
            } else {
                input.non_ag_lb_rk[[r, k]].clamp(0.0, ub)
            };
            // Upper bounds may be fractional, so these stay continuous
            let id = model.add_variable(format!("x_non_ag_{k}_{r}"), lb, ub, VarKind::Continuous);
            self.non_ag[[r, k]] = Some(id);
        }

        for (am, data) in &input.ag_managements {
            let settings = config.ag_management(am);
            if !settings.enabled || !data.allows_cell(r) {
                continue;
            }
            let grids = self.ag_man.get_mut(am).ok_or_else(|| {
                LutoptError::ContractViolation(format!(
                    "management option `{am}` was not present when the model was built"
                ))
            })?;
            let am_name = am_name_snake_case(am);
            for (m, lm) in LAND_MANAGEMENT_NAMES.iter().enumerate() {
                for (j_idx, &j) in data.landuses.iter().enumerate() {
                    if input.ag_x_mrj[[m, r, j]] <= 0.0 {
                        continue;
                    }
                    let lb = if settings.reversible {
                        0.0
                    } else {
                        data.lb_mrj[[m, r, j]].clamp(0.0, 1.0)
                    };
                    let id = model.add_variable(
                        format!("x_ag_man_{lm}_{am_name}_{j}_{r}"),
                        lb,
                        1.0,
                        kind,
                    );
                    grids[m][[r, j_idx]] = Some(id);
                }
            }
        }
        Ok(())
    }

    /// Clear the handles of cell `r` and return them
    fn take_cell(&mut self, r: usize) -> Vec<VarId> {
        let mut removed = vec![];
        let grids = self
            .ag
            .iter_mut()
            .chain(std::iter::once(&mut self.non_ag))
            .chain(self.ag_man.values_mut().flat_map(|g| g.iter_mut()));
        for grid in grids {
            if r < grid.nrows() {
                removed.extend(grid.row_mut(r).iter_mut().filter_map(Option::take));
            }
        }
        removed
    }

    /// Make the deviation variables match the configured soft targets
    ///
    /// Deviation variables persist across years. Their count is fixed by the
    /// first formulation.
    pub fn sync_deviations(
        &mut self,
        model: &mut LinearModel,
        input: &SolverInputData,
        config: &SolverConfig,
    ) -> LutoptResult<()> {
        let n_commodities = input.n_commodities();
        if self.demand_deviation.is_empty() {
            self.demand_deviation = (0..n_commodities)
                .map(|c| {
                    model.add_variable(
                        format!("v_demand_{c}"),
                        0.0,
                        f64::INFINITY,
                        VarKind::Continuous,
                    )
                })
                .collect();
        } else if self.demand_deviation.len() != n_commodities {
            return Err(LutoptError::shape(
                "commodities",
                &[self.demand_deviation.len()],
                &[n_commodities],
            ));
        }
        // Hard demand keeps the variables but pins them to zero
        let ub = if config.demand_is_soft() {
            f64::INFINITY
        } else {
            0.0
        };
        for &v in &self.demand_deviation {
            model.set_bounds(v, 0.0, ub)?;
        }

        if config.ghg_is_soft() {
            if self.ghg_deviation.is_none() {
                self.ghg_deviation = Some(model.add_variable(
                    "e_ghg".to_string(),
                    0.0,
                    f64::INFINITY,
                    VarKind::Continuous,
                ));
            }
        } else if let Some(e) = self.ghg_deviation.take() {
            model.remove_variables([e]);
        }

        let n_regions = input.water_regions.len();
        if config.water_is_soft() {
            if self.water_deviation.is_empty() {
                self.water_deviation = input
                    .water_regions
                    .iter()
                    .map(|region| {
                        model.add_variable(
                            format!("w_water_{}", region.id),
                            0.0,
                            f64::INFINITY,
                            VarKind::Continuous,
                        )
                    })
                    .collect();
            } else if self.water_deviation.len() != n_regions {
                return Err(LutoptError::shape(
                    "water_regions",
                    &[self.water_deviation.len()],
                    &[n_regions],
                ));
            }
        } else if !self.water_deviation.is_empty() {
            model.remove_variables(std::mem::take(&mut self.water_deviation));
        }
        Ok(())
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn ag(&self, m: usize, r: usize, j: usize) -> Option<VarId> {
        self.ag[m][[r, j]]
    }

    pub fn non_ag(&self, r: usize, k: usize) -> Option<VarId> {
        self.non_ag[[r, k]]
    }

    pub fn ag_man(&self, am: &str, m: usize, r: usize, j_idx: usize) -> Option<VarId> {
        self.ag_man.get(am).and_then(|grids| grids[m][[r, j_idx]])
    }

    pub fn ag_man_options(&self) -> impl Iterator<Item = &String> {
        self.ag_man.keys()
    }

    pub fn demand_deviation(&self) -> &[VarId] {
        &self.demand_deviation
    }

    pub fn ghg_deviation(&self) -> Option<VarId> {
        self.ghg_deviation
    }

    pub fn water_deviation(&self) -> &[VarId] {
        &self.water_deviation
    }

    /// Every allocation handle of cell `r`, in a fixed order
    pub fn cell_handles(&self, r: usize) -> Vec<Option<VarId>> {
        let mut handles: Vec<Option<VarId>> = vec![];
        for grid in self.ag.iter().chain(std::iter::once(&self.non_ag)) {
            handles.extend(grid.row(r).iter().copied());
        }
        for grids in self.ag_man.values() {
            for grid in grids {
                handles.extend(grid.row(r).iter().copied());
            }
        }
        handles
    }

    /// `Σ coeff(m, r, j)·x_ag[m, r, j]` over existing variables in `cells`
    pub fn ag_expr(
        &self,
        cells: impl IntoIterator<Item = usize>,
        mut coeff: impl FnMut(usize, usize, usize) -> f64,
    ) -> LinExpr {
        let mut expr = LinExpr::new();
        for r in cells {
            for (m, grid) in self.ag.iter().enumerate() {
                for (j, var) in grid.row(r).iter().enumerate() {
                    if let Some(var) = var {
                        expr.add_term(*var, coeff(m, r, j));
                    }
                }
            }
        }
        expr
    }

    /// `Σ coeff(r, k)·x_non_ag[r, k]` over existing variables in `cells`
    pub fn non_ag_expr(
        &self,
        cells: impl IntoIterator<Item = usize>,
        mut coeff: impl FnMut(usize, usize) -> f64,
    ) -> LinExpr {
        let mut expr = LinExpr::new();
        for r in cells {
            for (k, var) in self.non_ag.row(r).iter().enumerate() {
                if let Some(var) = var {
                    expr.add_term(*var, coeff(r, k));
                }
            }
        }
        expr
    }

    /// `Σ coeff(m, r, j_idx)·x_ag_man[am][m, r, j_idx]` over existing variables in `cells`
    pub fn ag_man_expr(
        &self,
        am: &str,
        cells: impl IntoIterator<Item = usize>,
        mut coeff: impl FnMut(usize, usize, usize) -> f64,
    ) -> LinExpr {
        let mut expr = LinExpr::new();
        let Some(grids) = self.ag_man.get(am) else {
            return expr;
        };
        for r in cells {
            for (m, grid) in grids.iter().enumerate() {
                for (j_idx, var) in grid.row(r).iter().enumerate() {
                    if let Some(var) = var {
                        expr.add_term(*var, coeff(m, r, j_idx));
                    }
                }
            }
        }
        expr
    }

    /// Dense agricultural allocation `(m, r, j)`
    pub fn ag_values(&self, values: &SecondaryMap<VarId, f64>) -> Array3<f64> {
        let (n_cells, n_ag) = self.ag[0].dim();
        Array3::from_shape_fn((N_LAND_MANAGEMENTS, n_cells, n_ag), |(m, r, j)| {
            lookup(values, self.ag[m][[r, j]])
        })
    }

    /// Dense non-agricultural allocation `(r, k)`
    pub fn non_ag_values(&self, values: &SecondaryMap<VarId, f64>) -> Array2<f64> {
        self.non_ag.mapv(|var| lookup(values, var))
    }

    /// Dense allocation of option `am` over all agricultural land uses `(m, r, j)`
    pub fn ag_man_values(
        &self,
        am: &str,
        landuses: &[usize],
        n_ag: usize,
        values: &SecondaryMap<VarId, f64>,
    ) -> Array3<f64> {
        let mut out = Array3::zeros((N_LAND_MANAGEMENTS, self.n_cells, n_ag));
        if let Some(grids) = self.ag_man.get(am) {
            for (m, grid) in grids.iter().enumerate() {
                for ((r, j_idx), var) in grid.indexed_iter() {
                    out[[m, r, landuses[j_idx]]] = lookup(values, *var);
                }
            }
        }
        out
    }
}

fn lookup(values: &SecondaryMap<VarId, f64>, var: Option<VarId>) -> f64 {
    var.and_then(|v| values.get(v).copied()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UseSettings;
    use crate::input::ManagementOptionData;

    fn input() -> SolverInputData {
        let mut input = SolverInputData::zeros(
            vec!["Beef".to_string(), "Wheat".to_string()],
            vec!["Environmental Plantings".to_string()],
            vec![],
            vec!["beef".to_string()],
            3,
        );
        // Cell 0: dry beef, cell 1: dry and irrigated wheat, cell 2: nothing agricultural
        input.ag_x_mrj[[0, 0, 0]] = 1.0;
        input.ag_x_mrj[[0, 1, 1]] = 1.0;
        input.ag_x_mrj[[1, 1, 1]] = 1.0;
        input.non_ag_x_rk[[2, 0]] = 0.5;
        input.non_ag_lb_rk[[2, 0]] = 0.3;

        let mut option = ManagementOptionData::zeros(vec![1], 3, 2, 0);
        option.lb_mrj[[1, 1, 1]] = 0.25;
        input
            .ag_managements
            .insert("Precision Agriculture".to_string(), option);
        input
    }

    #[test]
    fn variables_only_for_eligible_pairs() {
        let input = input();
        let config = SolverConfig::default();
        let mut model = LinearModel::new();
        let store = VariableStore::build(&mut model, &input, &config).unwrap();

        assert!(store.ag(0, 0, 0).is_some());
        assert!(store.ag(1, 0, 0).is_none());
        assert!(store.ag(0, 1, 1).is_some());
        assert!(store.ag(1, 1, 1).is_some());
        assert!(store.non_ag(2, 0).is_some());
        assert!(store.non_ag(0, 0).is_none());
        assert!(store.ag_man("Precision Agriculture", 0, 1, 0).is_some());
        assert!(store.ag_man("Precision Agriculture", 0, 0, 0).is_none());

        // 3 ag, 1 non-ag, 2 management, 1 demand deviation
        assert_eq!(model.n_variables(), 7);

        let non_ag = model.variable(store.non_ag(2, 0).unwrap()).unwrap();
        assert_eq!((non_ag.lb, non_ag.ub), (0.0, 0.5));
        assert_eq!(non_ag.name, "x_non_ag_0_2");
        let am = model
            .variable(store.ag_man("Precision Agriculture", 1, 1, 0).unwrap())
            .unwrap();
        assert_eq!(am.name, "x_ag_man_irr_precision_agriculture_1_1");
        assert_eq!(am.lb, 0.0);
    }

    #[test]
    fn irreversible_uses_keep_lower_bounds() {
        let input = input();
        let mut config = SolverConfig::default();
        let irreversible = UseSettings {
            enabled: true,
            reversible: false,
        };
        config
            .non_ag_landuses
            .insert("Environmental Plantings".to_string(), irreversible);
        config
            .ag_managements
            .insert("Precision Agriculture".to_string(), irreversible);

        let mut model = LinearModel::new();
        let store = VariableStore::build(&mut model, &input, &config).unwrap();
        let non_ag = model.variable(store.non_ag(2, 0).unwrap()).unwrap();
        assert_eq!(non_ag.lb, 0.3);
        let am = model
            .variable(store.ag_man("Precision Agriculture", 1, 1, 0).unwrap())
            .unwrap();
        assert_eq!(am.lb, 0.25);
    }

    #[test]
    fn disabled_uses_have_no_variables() {
        let input = input();
        let mut config = SolverConfig::default();
        let disabled = UseSettings {
            enabled: false,
            reversible: true,
        };
        config
            .non_ag_landuses
            .insert("Environmental Plantings".to_string(), disabled);
        config
            .ag_managements
            .insert("Precision Agriculture".to_string(), disabled);

        let mut model = LinearModel::new();
        let store = VariableStore::build(&mut model, &input, &config).unwrap();
        assert!(store.non_ag(2, 0).is_none());
        assert!(store.ag_man("Precision Agriculture", 0, 1, 0).is_none());
    }

    #[test]
    fn rebuilding_a_cell_leaves_other_cells_alone() {
        let mut input = input();
        let config = SolverConfig::default();
        let mut model = LinearModel::new();
        let mut store = VariableStore::build(&mut model, &input, &config).unwrap();
        let before_0 = store.cell_handles(0);
        let before_1 = store.cell_handles(1);

        input.ag_x_mrj[[1, 1, 1]] = 0.0;
        store
            .rebuild_cells(&mut model, &input, &config, &[1])
            .unwrap();

        assert_eq!(store.cell_handles(0), before_0);
        assert_ne!(store.cell_handles(1), before_1);
        assert!(store.ag(1, 1, 1).is_none());
        assert!(store.ag_man("Precision Agriculture", 1, 1, 0).is_none());
        for handle in before_1.into_iter().flatten() {
            assert!(!model.contains_variable(handle));
        }
        assert_eq!(model.n_variables(), 5);
    }

    #[test]
    fn hard_demand_pins_deviation_to_zero() {
        let input = input();
        let mut config = SolverConfig::default();
        config.demand_constraint_type = crate::config::LimitType::Hard;
        config.ghg_constraint_type = crate::config::LimitType::Soft;

        let mut model = LinearModel::new();
        let store = VariableStore::build(&mut model, &input, &config).unwrap();
        let v = model.variable(store.demand_deviation()[0]).unwrap();
        assert_eq!(v.ub, 0.0);
        assert!(store.ghg_deviation().is_some());
        assert!(store.water_deviation().is_empty());
    }

    #[test]
    fn expressions_skip_missing_variables() {
        let input = input();
        let config = SolverConfig::default();
        let mut model = LinearModel::new();
        let store = VariableStore::build(&mut model, &input, &config).unwrap();

        let expr = store.ag_expr(0..3, |_, _, _| 1.0);
        assert_eq!(expr.len(), 3);
        let expr = store.ag_expr([1], |m, _, _| m as f64 + 1.0);
        assert_eq!(expr.coefficient(store.ag(1, 1, 1).unwrap()), 2.0);
        let expr = store.non_ag_expr(0..3, |r, _| input.real_area[r]);
        assert_eq!(expr.len(), 1);
    }
}
