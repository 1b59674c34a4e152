use super::{limit_status, RawSolution, SolveEngine, SolveStatus};
use crate::config::{SolveEngineConfig, SolveMethod};
use crate::errors::{LutoptError, LutoptResult};
use crate::model::{LinearModel, ModelSense, Relation, VarId, VarKind};
use ::highs::{HighsModelStatus, RowProblem, Sense};
use log::debug;
use slotmap::SecondaryMap;

/// HiGHS, for large models
#[derive(Debug, Clone, Default)]
pub struct HighsEngine {
    config: SolveEngineConfig,
}

impl HighsEngine {
    pub fn new(config: SolveEngineConfig) -> Self {
        Self { config }
    }
}

impl SolveEngine for HighsEngine {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(&self, model: &LinearModel) -> LutoptResult<RawSolution> {
        let mut problem = RowProblem::default();
        let objective = model.objective();

        let mut columns = SecondaryMap::new();
        let mut order: Vec<VarId> = Vec::with_capacity(model.n_variables());
        for (id, var) in model.variables() {
            let coeff = objective.coefficient(id);
            let column = match var.kind {
                VarKind::Continuous => problem.add_column(coeff, var.lb..=var.ub),
                VarKind::Binary => problem.add_integer_column(coeff, var.lb..=var.ub),
            };
            columns.insert(id, column);
            order.push(id);
        }

        for (_, constraint) in model.constraints() {
            let mut terms = Vec::with_capacity(constraint.expr.len());
            for (var, coeff) in constraint.expr.terms() {
                let column = columns.get(var).ok_or_else(|| {
                    LutoptError::ContractViolation(format!(
                        "constraint `{}` references removed variable {var:?}",
                        constraint.name
                    ))
                })?;
                terms.push((*column, coeff));
            }
            let rhs = constraint.rhs;
            match constraint.relation {
                Relation::Le => problem.add_row(..=rhs, terms),
                Relation::Ge => problem.add_row(rhs.., terms),
                Relation::Eq => problem.add_row(rhs..=rhs, terms),
            }
        }

        let sense = match model.sense() {
            ModelSense::Minimise => Sense::Minimise,
            ModelSense::Maximise => Sense::Maximise,
        };
        let mut highs = problem.optimise(sense);
        if !self.config.verbose {
            highs.make_quiet();
        }
        if let Some(threads) = self.config.threads {
            highs.set_option("threads", threads as i32);
        }
        if let Some(time_limit) = self.config.time_limit {
            highs.set_option("time_limit", time_limit);
        }
        highs.set_option(
            "primal_feasibility_tolerance",
            self.config.primal_feasibility_tolerance,
        );
        highs.set_option(
            "dual_feasibility_tolerance",
            self.config.dual_feasibility_tolerance,
        );
        highs.set_option("mip_rel_gap", self.config.mip_rel_gap);
        highs.set_option("presolve", if self.config.presolve { "on" } else { "off" });
        let method = match self.config.method {
            SolveMethod::Auto => "choose",
            SolveMethod::Simplex => "simplex",
            SolveMethod::Ipm => "ipm",
        };
        highs.set_option("solver", method);

        let solved = highs
            .try_solve()
            .map_err(|status| LutoptError::Solver(format!("HiGHS failed with {status:?}")))?;
        let status = match solved.status() {
            HighsModelStatus::Optimal => SolveStatus::Optimal,
            HighsModelStatus::Infeasible => SolveStatus::Infeasible,
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                SolveStatus::Unbounded
            }
            HighsModelStatus::ReachedTimeLimit => SolveStatus::TimeLimit,
            other => SolveStatus::Other(format!("{other:?}")),
        };
        debug!("HiGHS finished with status {status}");
        if !status.has_values() {
            return Ok(RawSolution::without_values(status));
        }

        let solution = solved.get_solution();
        let values: SecondaryMap<VarId, f64> = order
            .iter()
            .zip(solution.columns())
            .map(|(&id, &value)| (id, value))
            .collect();
        // A time-limited run without an incumbent still returns a column vector
        if status == SolveStatus::TimeLimit {
            let status =
                limit_status(model, &values, self.config.primal_feasibility_tolerance);
            if !status.has_values() {
                debug!("HiGHS stopped at the time limit without a feasible solution");
                return Ok(RawSolution::without_values(status));
            }
        }
        let value = objective.evaluate(&values);
        Ok(RawSolution {
            status,
            objective: Some(value),
            values,
        })
    }
}
