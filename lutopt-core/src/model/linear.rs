use super::LinExpr;
use crate::errors::{LutoptError, LutoptResult};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use std::fmt;

new_key_type! {
    /// Handle to a variable of a [`LinearModel`]
    pub struct VarId;
    /// Handle to a constraint of a [`LinearModel`]
    pub struct ConstrId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub name: String,
    pub lb: f64,
    pub ub: f64,
    pub kind: VarKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
            Relation::Eq => write!(f, "=="),
        }
    }
}

/// `expr (relation) rhs` where `expr` has no constant term
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    /// Whether the constraint holds for the given values, within `tolerance`
    pub fn is_satisfied(&self, values: &slotmap::SecondaryMap<VarId, f64>, tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.relation {
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSense {
    #[default]
    Minimise,
    Maximise,
}

/// Variables, constraints and objective of an optimisation problem
#[derive(Debug, Clone)]
pub struct LinearModel {
    variables: SlotMap<VarId, VariableDef>,
    constraints: SlotMap<ConstrId, Constraint>,
    objective: LinExpr,
    sense: ModelSense,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self {
            variables: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            objective: LinExpr::new(),
            sense: ModelSense::Minimise,
        }
    }
}

impl LinearModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: String, lb: f64, ub: f64, kind: VarKind) -> VarId {
        self.variables.insert(VariableDef { name, lb, ub, kind })
    }

    /// Remove variables in one batch. Unknown handles are ignored.
    ///
    /// Constraints referencing removed variables must be removed or rebuilt
    /// before the model is solved, see [`LinearModel::check_references`].
    pub fn remove_variables(&mut self, ids: impl IntoIterator<Item = VarId>) -> usize {
        ids.into_iter()
            .filter(|&id| self.variables.remove(id).is_some())
            .count()
    }

    pub fn set_bounds(&mut self, id: VarId, lb: f64, ub: f64) -> LutoptResult<()> {
        let var = self.variables.get_mut(id).ok_or_else(|| {
            LutoptError::ContractViolation("bounds set on a removed variable".to_string())
        })?;
        var.lb = lb;
        var.ub = ub;
        Ok(())
    }

    /// Add `lhs (relation) rhs`.
    ///
    /// The constant part of `lhs` is moved to the right-hand side.
    /// Every variable in `lhs` must exist in the model.
    pub fn add_constraint(
        &mut self,
        name: String,
        lhs: LinExpr,
        relation: Relation,
        rhs: f64,
    ) -> LutoptResult<ConstrId> {
        if let Some((var, _)) = lhs.terms().find(|(var, _)| !self.variables.contains_key(*var)) {
            return Err(LutoptError::ContractViolation(format!(
                "constraint `{name}` references unknown variable {var:?}"
            )));
        }
        let rhs = rhs - lhs.constant();
        let expr: LinExpr = lhs.terms().collect();
        Ok(self.constraints.insert(Constraint {
            name,
            expr,
            relation,
            rhs,
        }))
    }

    /// Remove constraints in one batch. Unknown handles are ignored.
    pub fn remove_constraints(&mut self, ids: impl IntoIterator<Item = ConstrId>) -> usize {
        ids.into_iter()
            .filter(|&id| self.constraints.remove(id).is_some())
            .count()
    }

    pub fn set_objective(&mut self, objective: LinExpr, sense: ModelSense) {
        self.objective = objective;
        self.sense = sense;
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn sense(&self) -> ModelSense {
        self.sense
    }

    pub fn variable(&self, id: VarId) -> Option<&VariableDef> {
        self.variables.get(id)
    }

    pub fn constraint(&self, id: ConstrId) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    pub fn contains_variable(&self, id: VarId) -> bool {
        self.variables.contains_key(id)
    }

    pub fn variables(&self) -> impl Iterator<Item = (VarId, &VariableDef)> {
        self.variables.iter()
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstrId, &Constraint)> {
        self.constraints.iter()
    }

    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Fail if the objective or any constraint refers to a removed variable
    pub fn check_references(&self) -> LutoptResult<()> {
        if let Some((var, _)) = self
            .objective
            .terms()
            .find(|(var, _)| !self.variables.contains_key(*var))
        {
            return Err(LutoptError::ContractViolation(format!(
                "objective references removed variable {var:?}"
            )));
        }
        for (_, constraint) in &self.constraints {
            if let Some((var, _)) = constraint
                .expr
                .terms()
                .find(|(var, _)| !self.variables.contains_key(*var))
            {
                return Err(LutoptError::ContractViolation(format!(
                    "constraint `{}` references removed variable {var:?}",
                    constraint.name
                )));
            }
        }
        Ok(())
    }

    /// Whether `values` give every variable a finite value within its bounds and
    /// satisfy every constraint, within `tolerance`
    pub fn is_feasible(&self, values: &slotmap::SecondaryMap<VarId, f64>, tolerance: f64) -> bool {
        let in_bounds = self.variables.iter().all(|(id, var)| {
            values.get(id).map_or(false, |&v| {
                v.is_finite() && v >= var.lb - tolerance && v <= var.ub + tolerance
            })
        });
        in_bounds
            && self
                .constraints
                .values()
                .all(|c| c.is_satisfied(values, tolerance))
    }

    /// Handle-independent description of the model.
    ///
    /// Two models built through different sequences of additions and removals
    /// compare equal here if they describe the same problem.
    pub fn canonical_form(&self) -> CanonicalModel {
        let name_of = |var: VarId| {
            self.variables
                .get(var)
                .map(|v| v.name.clone())
                .unwrap_or_else(|| format!("<removed {var:?}>"))
        };
        let canonical_terms = |expr: &LinExpr| {
            let mut terms: Vec<(String, f64)> = expr
                .terms()
                .map(|(var, coeff)| (name_of(var), round(coeff)))
                .collect();
            terms.sort_by(|a, b| a.0.cmp(&b.0));
            terms
        };

        let mut variables: Vec<(String, f64, f64, VarKind)> = self
            .variables
            .values()
            .map(|v| (v.name.clone(), round(v.lb), round(v.ub), v.kind))
            .collect();
        variables.sort_by(|a, b| a.0.cmp(&b.0));

        let mut constraints: Vec<CanonicalConstraint> = self
            .constraints
            .values()
            .map(|c| CanonicalConstraint {
                name: c.name.clone(),
                terms: canonical_terms(&c.expr),
                relation: c.relation,
                rhs: round(c.rhs),
            })
            .collect();
        constraints.sort_by(|a, b| a.name.cmp(&b.name));

        CanonicalModel {
            variables,
            constraints,
            objective: canonical_terms(&self.objective),
            objective_constant: round(self.objective.constant()),
            sense: self.sense,
        }
    }
}

fn round(value: f64) -> f64 {
    if value.is_finite() {
        (value * 1e9).round() / 1e9
    } else {
        value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalConstraint {
    pub name: String,
    pub terms: Vec<(String, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// Variables and constraints sorted by name, with terms keyed by variable name
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalModel {
    pub variables: Vec<(String, f64, f64, VarKind)>,
    pub constraints: Vec<CanonicalConstraint>,
    pub objective: Vec<(String, f64)>,
    pub objective_constant: f64,
    pub sense: ModelSense,
}
