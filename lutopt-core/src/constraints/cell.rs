use super::{BuildContext, CellRows, ConstraintFamily, FamilyKind};
use crate::errors::{LutoptError, LutoptResult};
use crate::input::N_LAND_MANAGEMENTS;
use crate::model::{ConstrId, LinExpr, LinearModel, Relation};
use crate::tools::{am_name_snake_case, LAND_MANAGEMENT_NAMES};
use log::warn;

/// Each cell is fully allocated: `Σ x_ag[m, r, j] + Σ x_non_ag[r, k] == 1`
#[derive(Debug, Clone, Default)]
pub struct CellUsage {
    rows: CellRows,
}

impl CellUsage {
    pub fn new(n_cells: usize) -> Self {
        Self {
            rows: CellRows::new(n_cells),
        }
    }

    /// Constraints referencing cell `r`
    pub fn cell(&self, r: usize) -> &[ConstrId] {
        self.rows.cell(r)
    }

    fn build_cell(&mut self, ctx: &mut BuildContext<'_>, r: usize) -> LutoptResult<()> {
        let mut expr = ctx.vars.ag_expr([r], |_, _, _| 1.0);
        expr.add_expr(&ctx.vars.non_ag_expr([r], |_, _| 1.0));
        if expr.is_empty() {
            warn!("Cell {r} has no eligible land use, skipping its usage constraint");
            return Ok(());
        }
        let id = ctx
            .model
            .add_constraint(format!("cell_usage_{r}"), expr, Relation::Eq, 1.0)?;
        self.rows.push(r, id);
        Ok(())
    }
}

impl ConstraintFamily for CellUsage {
    fn kind(&self) -> FamilyKind {
        FamilyKind::CellUsage
    }

    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        self.remove_all(ctx.model);
        for r in 0..ctx.input.n_cells() {
            self.build_cell(ctx, r)?;
        }
        Ok(())
    }

    fn rebuild(&mut self, ctx: &mut BuildContext<'_>, cells: &[usize]) -> LutoptResult<()> {
        self.rows.clear_cells(ctx.model, cells);
        for &r in cells {
            self.build_cell(ctx, r)?;
        }
        Ok(())
    }

    fn remove_all(&mut self, model: &mut LinearModel) {
        self.rows.clear(model);
    }

    fn constraint_count(&self) -> usize {
        self.rows.len()
    }
}

/// A management option can only be applied where its land use is:
/// `x_ag_man[am, m, r, j] ≤ x_ag[m, r, j]`
#[derive(Debug, Clone, Default)]
pub struct ManagementCoupling {
    rows: CellRows,
}

impl ManagementCoupling {
    pub fn new(n_cells: usize) -> Self {
        Self {
            rows: CellRows::new(n_cells),
        }
    }

    /// Constraints referencing cell `r`
    pub fn cell(&self, r: usize) -> &[ConstrId] {
        self.rows.cell(r)
    }

    fn build_cell(&mut self, ctx: &mut BuildContext<'_>, r: usize) -> LutoptResult<()> {
        for (am, data) in &ctx.input.ag_managements {
            let am_name = am_name_snake_case(am);
            for m in 0..N_LAND_MANAGEMENTS {
                for (j_idx, &j) in data.landuses.iter().enumerate() {
                    let Some(am_var) = ctx.vars.ag_man(am, m, r, j_idx) else {
                        continue;
                    };
                    let ag_var = ctx.vars.ag(m, r, j).ok_or_else(|| {
                        LutoptError::ContractViolation(format!(
                            "management option `{am}` has a variable in cell {r} for land use {j} \
                             but the land use itself has none"
                        ))
                    })?;
                    let expr: LinExpr = [(am_var, 1.0), (ag_var, -1.0)].into_iter().collect();
                    let id = ctx.model.add_constraint(
                        format!(
                            "ag_man_coupling_{}_{am_name}_{j}_{r}",
                            LAND_MANAGEMENT_NAMES[m]
                        ),
                        expr,
                        Relation::Le,
                        0.0,
                    )?;
                    self.rows.push(r, id);
                }
            }
        }
        Ok(())
    }
}

impl ConstraintFamily for ManagementCoupling {
    fn kind(&self) -> FamilyKind {
        FamilyKind::ManagementCoupling
    }

    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        self.remove_all(ctx.model);
        for r in 0..ctx.input.n_cells() {
            self.build_cell(ctx, r)?;
        }
        Ok(())
    }

    fn rebuild(&mut self, ctx: &mut BuildContext<'_>, cells: &[usize]) -> LutoptResult<()> {
        self.rows.clear_cells(ctx.model, cells);
        for &r in cells {
            self.build_cell(ctx, r)?;
        }
        Ok(())
    }

    fn remove_all(&mut self, model: &mut LinearModel) {
        self.rows.clear(model);
    }

    fn constraint_count(&self) -> usize {
        self.rows.len()
    }
}
