//! An in-memory sparse linear model.
//!
//! The model owns every variable and constraint of a formulation. Variables and
//! constraints are addressed through generational handles ([`VarId`], [`ConstrId`])
//! which stay valid while other entries are removed and re-added, so a cell can be
//! torn down and rebuilt without disturbing handles held for the rest of the model.
//!
//! The model is solver agnostic. A [`crate::solve::SolveEngine`] translates it into
//! a concrete solver problem when a solution is requested.

mod expr;
mod linear;

pub use expr::LinExpr;
pub use linear::{
    CanonicalConstraint, CanonicalModel, ConstrId, Constraint, LinearModel, ModelSense,
    Relation, VarId, VarKind, VariableDef,
};
