use super::{RawSolution, SolveEngine, SolveStatus};
use crate::config::SolveEngineConfig;
use crate::errors::{LutoptError, LutoptResult};
use crate::model::{LinearModel, ModelSense, Relation, VarId, VarKind};
use ::microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};
use log::{debug, warn};
use slotmap::SecondaryMap;

/// Pure-Rust simplex and branch-and-bound engine
///
/// Suited to small and medium models. Thread count, time limit and tolerances
/// are not supported and are ignored.
#[derive(Debug, Clone, Default)]
pub struct MicrolpEngine {
    config: SolveEngineConfig,
}

impl MicrolpEngine {
    pub fn new(config: SolveEngineConfig) -> Self {
        if config.threads.is_some() || config.time_limit.is_some() {
            warn!("microlp ignores the thread count and time limit options");
        }
        Self { config }
    }
}

impl SolveEngine for MicrolpEngine {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(&self, model: &LinearModel) -> LutoptResult<RawSolution> {
        let direction = match model.sense() {
            ModelSense::Minimise => OptimizationDirection::Minimize,
            ModelSense::Maximise => OptimizationDirection::Maximize,
        };
        let mut problem = Problem::new(direction);
        let objective = model.objective();

        let mut columns = SecondaryMap::new();
        for (id, var) in model.variables() {
            let coeff = objective.coefficient(id);
            let column = match var.kind {
                VarKind::Continuous => problem.add_var(coeff, (var.lb, var.ub)),
                VarKind::Binary => {
                    let lb = var.lb.max(0.0).ceil() as i32;
                    let ub = var.ub.min(1.0).floor() as i32;
                    problem.add_integer_var(coeff, (lb, ub))
                }
            };
            columns.insert(id, column);
        }

        for (_, constraint) in model.constraints() {
            if constraint.expr.is_empty() {
                // Rows without terms constrain nothing but may still be violated
                if !constraint.is_satisfied(&SecondaryMap::new(), self.config.primal_feasibility_tolerance) {
                    debug!("Constraint `{}` has no terms and cannot be met", constraint.name);
                    return Ok(RawSolution::without_values(SolveStatus::Infeasible));
                }
                continue;
            }
            let mut lhs = LinearExpr::empty();
            for (var, coeff) in constraint.expr.terms() {
                let column = columns.get(var).ok_or_else(|| {
                    LutoptError::ContractViolation(format!(
                        "constraint `{}` references removed variable {var:?}",
                        constraint.name
                    ))
                })?;
                lhs.add(*column, coeff);
            }
            let op = match constraint.relation {
                Relation::Le => ComparisonOp::Le,
                Relation::Ge => ComparisonOp::Ge,
                Relation::Eq => ComparisonOp::Eq,
            };
            problem.add_constraint(lhs, op, constraint.rhs);
        }

        match problem.solve() {
            Ok(solution) => {
                let values: SecondaryMap<VarId, f64> = columns
                    .iter()
                    .map(|(id, column)| (id, *solution.var_value(*column)))
                    .collect();
                Ok(RawSolution {
                    status: SolveStatus::Optimal,
                    objective: Some(solution.objective() + objective.constant()),
                    values,
                })
            }
            Err(::microlp::Error::Infeasible) => {
                Ok(RawSolution::without_values(SolveStatus::Infeasible))
            }
            Err(::microlp::Error::Unbounded) => {
                Ok(RawSolution::without_values(SolveStatus::Unbounded))
            }
            Err(err) => Err(LutoptError::Solver(err.to_string())),
        }
    }
}
