use super::{AggregateRows, BuildContext, ConstraintFamily, FamilyKind};
use crate::errors::{LutoptError, LutoptResult};
use crate::model::{LinExpr, LinearModel, Relation, VarId};

/// Net water yield of each region stays above its limit.
///
/// Hard: `yield ≥ limit`. Soft: `yield − limit ≤ W` and `limit − yield ≤ W`.
#[derive(Debug, Clone, Default)]
pub struct Water {
    rows: AggregateRows,
}

impl Water {
    pub fn rows(&self) -> &AggregateRows {
        &self.rows
    }
}

impl ConstraintFamily for Water {
    fn kind(&self) -> FamilyKind {
        FamilyKind::Water
    }

    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        self.remove_all(ctx.model);
        if !ctx.config.water_enabled {
            return Ok(());
        }
        let input = ctx.input;
        let soft = ctx.config.water_is_soft();

        for (i, region) in input.water_regions.iter().enumerate() {
            let cells = || region.cells.iter().copied();
            let mut expr = ctx
                .vars
                .ag_expr(cells(), |m, r, j| input.ag_w_mrj[[m, r, j]]);
            for (am, data) in &input.ag_managements {
                expr.add_expr(&ctx.vars.ag_man_expr(am, cells(), |m, r, j_idx| {
                    data.w_mrj[[m, r, j_idx]]
                }));
            }
            expr.add_expr(
                &ctx.vars
                    .non_ag_expr(cells(), |r, k| input.non_ag_w_rk[[r, k]]),
            );

            let limit = input.limits.water.rescale[i];
            let name = format!("water_limit_{}", region.id);
            if soft {
                let w = *ctx.vars.water_deviation().get(i).ok_or_else(|| {
                    LutoptError::ContractViolation(format!(
                        "no deviation variable for water region `{}`",
                        region.name
                    ))
                })?;
                add_two_sided(&mut self.rows, ctx.model, &name, &expr, w, limit)?;
            } else {
                self.rows
                    .add(ctx.model, name, expr.clone(), Relation::Ge, limit)?;
            }
            self.rows.record(region.name.clone(), expr);
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

/// Total emissions, including transition and off-land emissions, stay below the limit.
///
/// Hard: `emissions ≤ limit`. Soft: `emissions − limit ≤ E` and `limit − emissions ≤ E`.
#[derive(Debug, Clone, Default)]
pub struct Ghg {
    rows: AggregateRows,
}

impl Ghg {
    pub fn rows(&self) -> &AggregateRows {
        &self.rows
    }
}

impl ConstraintFamily for Ghg {
    fn kind(&self) -> FamilyKind {
        FamilyKind::Ghg
    }

    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        self.remove_all(ctx.model);
        if !ctx.config.ghg_enabled {
            return Ok(());
        }
        let input = ctx.input;
        let all_cells = 0..input.n_cells();

        let mut expr = ctx.vars.ag_expr(all_cells.clone(), |m, r, j| {
            input.ag_g_mrj[[m, r, j]] + input.ag_ghg_t_mrj[[m, r, j]]
        });
        for (am, data) in &input.ag_managements {
            expr.add_expr(&ctx.vars.ag_man_expr(am, all_cells.clone(), |m, r, j_idx| {
                data.g_mrj[[m, r, j_idx]]
            }));
        }
        expr.add_expr(
            &ctx.vars
                .non_ag_expr(all_cells, |r, k| input.non_ag_g_rk[[r, k]]),
        );
        expr.add_constant(input.offland_ghg);

        let limit = input.limits.ghg.rescale;
        if ctx.config.ghg_is_soft() {
            let e = ctx.vars.ghg_deviation().ok_or_else(|| {
                LutoptError::ContractViolation("no deviation variable for GHG".to_string())
            })?;
            add_two_sided(&mut self.rows, ctx.model, "ghg_limit", &expr, e, limit)?;
        } else {
            self.rows.add(
                ctx.model,
                "ghg_limit".to_string(),
                expr.clone(),
                Relation::Le,
                limit,
            )?;
        }
        self.rows.record("GHG", expr);
        Ok(())
    }

    fn remove_all(&mut self, model: &mut LinearModel) {
        self.rows.clear(model);
    }

    fn constraint_count(&self) -> usize {
        self.rows.len()
    }
}

/// `expr − limit ≤ penalty` and `limit − expr ≤ penalty`
fn add_two_sided(
    rows: &mut AggregateRows,
    model: &mut LinearModel,
    name: &str,
    expr: &LinExpr,
    penalty: VarId,
    limit: f64,
) -> LutoptResult<()> {
    let mut upper = expr.clone();
    upper.add_term(penalty, -1.0);
    rows.add(model, format!("{name}_upper"), upper, Relation::Le, limit)?;

    let mut lower = expr.clone();
    lower.add_term(penalty, 1.0);
    rows.add(model, format!("{name}_lower"), lower, Relation::Ge, limit)
}
