use super::{AggregateRows, BuildContext, ConstraintFamily, FamilyKind};
use crate::errors::{LutoptError, LutoptResult};
use crate::input::SolverInputData;
use crate::model::{LinExpr, LinearModel, Relation};
use crate::variables::VariableStore;

/// Production of each commodity as a function of the allocation
///
/// Agricultural and management-option yields are mapped from land uses to products
/// through `lu2pr_pj` and from products to commodities through `pr2cm_cp`.
/// Non-agricultural uses yield commodities directly.
pub fn commodity_production(vars: &VariableStore, input: &SolverInputData) -> Vec<LinExpr> {
    let all_cells = 0..input.n_cells();

    let products: Vec<LinExpr> = (0..input.n_products())
        .map(|p| {
            let mut expr = vars.ag_expr(all_cells.clone(), |m, r, j| {
                input.lu2pr_pj[[p, j]] * input.ag_q_mrp[[m, r, p]]
            });
            for (am, data) in &input.ag_managements {
                expr.add_expr(&vars.ag_man_expr(am, all_cells.clone(), |m, r, j_idx| {
                    input.lu2pr_pj[[p, data.landuses[j_idx]]] * data.q_mrp[[m, r, p]]
                }));
            }
            expr
        })
        .collect();

    (0..input.n_commodities())
        .map(|c| {
            let mut expr = LinExpr::new();
            for (p, product) in products.iter().enumerate() {
                expr.add_scaled(product, input.pr2cm_cp[[c, p]]);
            }
            expr.add_expr(&vars.non_ag_expr(all_cells.clone(), |r, k| {
                input.non_ag_q_crk[[c, r, k]]
            }));
            expr
        })
        .collect()
}

/// Production of each commodity meets its target, up to the shortfall `V[c]`:
/// `production[c] + V[c] ≥ demand[c]`
///
/// Over-production is never penalised. When demand is hard `V[c]` is fixed at zero.
#[derive(Debug, Clone, Default)]
pub struct Demand {
    rows: AggregateRows,
}

impl Demand {
    pub fn rows(&self) -> &AggregateRows {
        &self.rows
    }
}

impl ConstraintFamily for Demand {
    fn kind(&self) -> FamilyKind {
        FamilyKind::Demand
    }

    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        self.remove_all(ctx.model);
        let input = ctx.input;
        let deviations = ctx.vars.demand_deviation();
        if deviations.len() != input.n_commodities() {
            return Err(LutoptError::ContractViolation(format!(
                "{} demand deviation variables for {} commodities",
                deviations.len(),
                input.n_commodities()
            )));
        }

        for (c, production) in commodity_production(ctx.vars, input)
            .into_iter()
            .enumerate()
        {
            let mut lhs = production.clone();
            lhs.add_term(deviations[c], 1.0);
            self.rows.add(
                ctx.model,
                format!("demand_{c}"),
                lhs,
                Relation::Ge,
                input.limits.demand.rescale[c],
            )?;
            self.rows.record(input.commodities[c].clone(), production);
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
