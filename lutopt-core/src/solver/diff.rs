use crate::config::SolverConfig;
use crate::errors::{LutoptError, LutoptResult};
use crate::input::SolverInputData;
use indexmap::IndexMap;
use ndarray::{Array1, Array2, Array3, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Per-cell state of the year a model was last built for
///
/// Only the quantities that determine which variables exist, and their bounds,
/// are kept. A cell whose snapshot matches the new year's input keeps its variables
/// and cell-scoped constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousState {
    pub lumap: Array1<usize>,
    pub lmmap: Array1<usize>,
    pub ag_x_mrj: Array3<f64>,
    pub non_ag_x_rk: Array2<f64>,
    pub non_ag_lb_rk: Array2<f64>,
    pub ag_man_lb_mrj: IndexMap<String, Array3<f64>>,
    pub ag_man_cell_masks: IndexMap<String, Option<Array1<bool>>>,
}

impl PreviousState {
    pub fn from_input(input: &SolverInputData) -> Self {
        Self {
            lumap: input.lumap.clone(),
            lmmap: input.lmmap.clone(),
            ag_x_mrj: input.ag_x_mrj.clone(),
            non_ag_x_rk: input.non_ag_x_rk.clone(),
            non_ag_lb_rk: input.non_ag_lb_rk.clone(),
            ag_man_lb_mrj: input
                .ag_managements
                .iter()
                .map(|(am, data)| (am.clone(), data.lb_mrj.clone()))
                .collect(),
            ag_man_cell_masks: input
                .ag_managements
                .iter()
                .map(|(am, data)| (am.clone(), data.cell_mask.clone()))
                .collect(),
        }
    }

    pub fn n_cells(&self) -> usize {
        self.lumap.len()
    }

    /// Check that every array lines up with `current` before comparing cells
    fn check_compatible(&self, current: &SolverInputData) -> LutoptResult<()> {
        let n_cells = self.n_cells();
        for (field, len) in [
            ("cells", current.n_cells()),
            ("lmmap", self.lmmap.len()),
            ("current lmmap", current.lmmap.len()),
        ] {
            if len != n_cells {
                return Err(LutoptError::shape(field, &[n_cells], &[len]));
            }
        }
        for (field, previous, now) in [
            ("ag_x_mrj", self.ag_x_mrj.shape(), current.ag_x_mrj.shape()),
            ("non_ag_x_rk", self.non_ag_x_rk.shape(), current.non_ag_x_rk.shape()),
            ("non_ag_lb_rk", self.non_ag_lb_rk.shape(), current.non_ag_lb_rk.shape()),
        ] {
            if previous != now {
                return Err(LutoptError::shape(field, previous, now));
            }
        }

        if !self.ag_man_lb_mrj.keys().eq(current.ag_managements.keys())
            || !self.ag_man_cell_masks.keys().eq(current.ag_managements.keys())
        {
            return Err(LutoptError::ContractViolation(
                "management options differ from the previous year".to_string(),
            ));
        }
        for ((am, data), (prev_lb, prev_mask)) in current
            .ag_managements
            .iter()
            .zip(self.ag_man_lb_mrj.values().zip(self.ag_man_cell_masks.values()))
        {
            if prev_lb.shape() != data.lb_mrj.shape() {
                return Err(LutoptError::shape(
                    format!("ag_man_lb_mrj[{am}]"),
                    prev_lb.shape(),
                    data.lb_mrj.shape(),
                ));
            }
            for mask in [prev_mask, &data.cell_mask].into_iter().flatten() {
                if mask.len() != n_cells {
                    return Err(LutoptError::shape(
                        format!("cell_mask[{am}]"),
                        &[n_cells],
                        &[mask.len()],
                    ));
                }
            }
        }
        Ok(())
    }

    /// Mask of the cells whose state differs in `current`
    ///
    /// Lower bounds only matter for irreversible uses and options, so changes to
    /// the lower bounds of reversible ones are ignored.
    pub fn changed_mask(
        &self,
        current: &SolverInputData,
        config: &SolverConfig,
    ) -> LutoptResult<Array1<bool>> {
        self.check_compatible(current)?;

        let mut changed = Zip::from(&self.lumap)
            .and(&current.lumap)
            .and(&self.lmmap)
            .and(&current.lmmap)
            .map_collect(|lu_prev, lu, lm_prev, lm| lu_prev != lu || lm_prev != lm);

        merge(&mut changed, rows_differ(&self.ag_x_mrj, &current.ag_x_mrj, 1));
        merge(&mut changed, rows_differ(&self.non_ag_x_rk, &current.non_ag_x_rk, 0));

        for (k, name) in current.non_ag_landuses.iter().enumerate() {
            if is_irreversible(config.non_ag_landuse(name)) {
                merge(
                    &mut changed,
                    rows_differ(
                        &self.non_ag_lb_rk.column(k),
                        &current.non_ag_lb_rk.column(k),
                        0,
                    ),
                );
            }
        }

        for ((am, data), (prev_lb, prev_mask)) in current
            .ag_managements
            .iter()
            .zip(self.ag_man_lb_mrj.values().zip(self.ag_man_cell_masks.values()))
        {
            if is_irreversible(config.ag_management(am)) {
                merge(&mut changed, rows_differ(prev_lb, &data.lb_mrj, 1));
            }
            match (prev_mask, &data.cell_mask) {
                (None, None) => {}
                (Some(prev), Some(mask)) => {
                    merge(&mut changed, Zip::from(prev).and(mask).map_collect(|a, b| a != b))
                }
                // The mask was added or dropped, so any cell may have changed
                _ => changed.fill(true),
            }
        }
        Ok(changed)
    }

    /// Cells whose state differs in `current`, in ascending order
    pub fn changed_cells(
        &self,
        current: &SolverInputData,
        config: &SolverConfig,
    ) -> LutoptResult<Vec<usize>> {
        let mask = self.changed_mask(current, config)?;
        Ok(mask
            .iter()
            .enumerate()
            .filter_map(|(r, &changed)| changed.then_some(r))
            .collect())
    }
}

fn is_irreversible(settings: crate::config::UseSettings) -> bool {
    settings.enabled && !settings.reversible
}

/// For each index along `cell_axis`, whether the two arrays differ
///
/// Both arrays must have the same shape.
fn rows_differ<S, D>(
    previous: &ndarray::ArrayBase<S, D>,
    current: &ndarray::ArrayBase<S, D>,
    cell_axis: usize,
) -> Array1<bool>
where
    S: ndarray::Data<Elem = f64>,
    D: ndarray::RemoveAxis,
{
    previous
        .axis_iter(Axis(cell_axis))
        .zip(current.axis_iter(Axis(cell_axis)))
        .map(|(a, b)| a != b)
        .collect()
}

fn merge(changed: &mut Array1<bool>, other: Array1<bool>) {
    Zip::from(changed).and(&other).for_each(|c, &o| *c |= o);
}
