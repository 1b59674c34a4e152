//! Constraint families
//!
//! Every constraint of the formulation belongs to exactly one family, identified
//! by a [`FamilyKind`]. Families come in two flavours:
//!
//! * cell-scoped families (cell usage and management coupling) whose constraints
//!   each reference a single cell. They are tracked per cell so that an update only
//!   rebuilds the constraints of cells that changed.
//! * aggregate families (adoption ceilings, demand, water, GHG, biodiversity
//!   targets and regional caps) whose constraints sum over many cells. These are
//!   always rebuilt in full.
//!
//! Aggregate families keep the expression of each member so that the achieved
//! values can be reported after a solve.

mod adoption;
mod biodiversity;
mod cell;
mod demand;
mod targets;

pub use adoption::{AdoptionCeiling, RegionalAdoption};
pub use biodiversity::BiodiversityTarget;
pub use cell::{CellUsage, ManagementCoupling};
pub use demand::{commodity_production, Demand};
pub use targets::{Ghg, Water};

use crate::config::SolverConfig;
use crate::errors::LutoptResult;
use crate::input::SolverInputData;
use crate::model::{ConstrId, LinExpr, LinearModel, Relation};
use crate::variables::VariableStore;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FamilyKind {
    CellUsage,
    ManagementCoupling,
    AdoptionCeiling,
    Demand,
    Water,
    Ghg,
    Gbf2,
    Gbf3,
    Gbf4Snes,
    Gbf4Ecnes,
    Gbf8,
    AgRegionalAdoption,
    NonAgRegionalAdoption,
}

impl FamilyKind {
    pub fn is_cell_scoped(&self) -> bool {
        matches!(self, FamilyKind::CellUsage | FamilyKind::ManagementCoupling)
    }
}

impl fmt::Display for FamilyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FamilyKind::CellUsage => "cell_usage",
            FamilyKind::ManagementCoupling => "ag_management_coupling",
            FamilyKind::AdoptionCeiling => "ag_management_adoption",
            FamilyKind::Demand => "demand",
            FamilyKind::Water => "water",
            FamilyKind::Ghg => "ghg",
            FamilyKind::Gbf2 => "GBF2",
            FamilyKind::Gbf3 => "GBF3",
            FamilyKind::Gbf4Snes => "GBF4_SNES",
            FamilyKind::Gbf4Ecnes => "GBF4_ECNES",
            FamilyKind::Gbf8 => "GBF8",
            FamilyKind::AgRegionalAdoption => "ag_regional_adoption",
            FamilyKind::NonAgRegionalAdoption => "non_ag_regional_adoption",
        };
        write!(f, "{name}")
    }
}

/// Everything a family needs to (re)build its constraints
pub struct BuildContext<'a> {
    pub model: &'a mut LinearModel,
    pub vars: &'a VariableStore,
    pub input: &'a SolverInputData,
    pub config: &'a SolverConfig,
}

/// Uniform interface over the constraint families
pub trait ConstraintFamily {
    fn kind(&self) -> FamilyKind;

    /// Remove every constraint of the family and build it from the current variables
    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()>;

    /// Rebuild the constraints touching `cells`.
    ///
    /// Aggregate families reference every cell, so they rebuild in full.
    fn rebuild(&mut self, ctx: &mut BuildContext<'_>, cells: &[usize]) -> LutoptResult<()> {
        let _ = cells;
        self.rebuild_all(ctx)
    }

    fn remove_all(&mut self, model: &mut LinearModel);

    fn constraint_count(&self) -> usize;
}

/// Constraints of an aggregate family plus the expression of each member
#[derive(Debug, Clone, Default)]
pub struct AggregateRows {
    ids: Vec<ConstrId>,
    exprs: IndexMap<String, LinExpr>,
}

impl AggregateRows {
    fn clear(&mut self, model: &mut LinearModel) {
        model.remove_constraints(self.ids.drain(..));
        self.exprs.clear();
    }

    fn add(
        &mut self,
        model: &mut LinearModel,
        name: String,
        lhs: LinExpr,
        relation: Relation,
        rhs: f64,
    ) -> LutoptResult<()> {
        let id = model.add_constraint(name, lhs, relation, rhs)?;
        self.ids.push(id);
        Ok(())
    }

    fn record(&mut self, member: impl Into<String>, expr: LinExpr) {
        self.exprs.insert(member.into(), expr);
    }

    /// Expression of each modelled member, keyed by member name
    pub fn exprs(&self) -> &IndexMap<String, LinExpr> {
        &self.exprs
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Constraints of a cell-scoped family, indexed by the cell they reference
#[derive(Debug, Clone, Default)]
pub struct CellRows {
    by_cell: Vec<Vec<ConstrId>>,
}

impl CellRows {
    fn new(n_cells: usize) -> Self {
        Self {
            by_cell: vec![vec![]; n_cells],
        }
    }

    fn clear_cells(&mut self, model: &mut LinearModel, cells: &[usize]) {
        let mut removed = vec![];
        for &r in cells {
            if let Some(ids) = self.by_cell.get_mut(r) {
                removed.append(ids);
            }
        }
        model.remove_constraints(removed);
    }

    fn clear(&mut self, model: &mut LinearModel) {
        model.remove_constraints(self.by_cell.iter_mut().flat_map(|ids| ids.drain(..)));
    }

    fn push(&mut self, r: usize, id: ConstrId) {
        if r >= self.by_cell.len() {
            self.by_cell.resize(r + 1, vec![]);
        }
        self.by_cell[r].push(id);
    }

    /// Constraints referencing cell `r`
    pub fn cell(&self, r: usize) -> &[ConstrId] {
        self.by_cell.get(r).map_or(&[], Vec::as_slice)
    }

    fn len(&self) -> usize {
        self.by_cell.iter().map(Vec::len).sum()
    }
}

/// Owner of every constraint family of a formulation
#[derive(Debug, Clone)]
pub struct ConstraintRegistry {
    cell_usage: CellUsage,
    coupling: ManagementCoupling,
    adoption: AdoptionCeiling,
    demand: Demand,
    water: Water,
    ghg: Ghg,
    biodiversity: [BiodiversityTarget; 5],
    ag_regional: RegionalAdoption,
    non_ag_regional: RegionalAdoption,
}

impl ConstraintRegistry {
    pub fn new(n_cells: usize) -> Self {
        Self {
            cell_usage: CellUsage::new(n_cells),
            coupling: ManagementCoupling::new(n_cells),
            adoption: AdoptionCeiling::default(),
            demand: Demand::default(),
            water: Water::default(),
            ghg: Ghg::default(),
            biodiversity: [
                BiodiversityTarget::new(FamilyKind::Gbf2),
                BiodiversityTarget::new(FamilyKind::Gbf3),
                BiodiversityTarget::new(FamilyKind::Gbf4Snes),
                BiodiversityTarget::new(FamilyKind::Gbf4Ecnes),
                BiodiversityTarget::new(FamilyKind::Gbf8),
            ],
            ag_regional: RegionalAdoption::new(FamilyKind::AgRegionalAdoption),
            non_ag_regional: RegionalAdoption::new(FamilyKind::NonAgRegionalAdoption),
        }
    }

    fn families(&self) -> Vec<&dyn ConstraintFamily> {
        let mut families: Vec<&dyn ConstraintFamily> = vec![
            &self.cell_usage,
            &self.coupling,
            &self.adoption,
            &self.demand,
            &self.water,
            &self.ghg,
        ];
        families.extend(self.biodiversity.iter().map(|f| f as &dyn ConstraintFamily));
        families.push(&self.ag_regional);
        families.push(&self.non_ag_regional);
        families
    }

    fn families_mut(&mut self) -> Vec<&mut dyn ConstraintFamily> {
        let mut families: Vec<&mut dyn ConstraintFamily> = vec![
            &mut self.cell_usage,
            &mut self.coupling,
            &mut self.adoption,
            &mut self.demand,
            &mut self.water,
            &mut self.ghg,
        ];
        families.extend(
            self.biodiversity
                .iter_mut()
                .map(|f| f as &mut dyn ConstraintFamily),
        );
        families.push(&mut self.ag_regional);
        families.push(&mut self.non_ag_regional);
        families
    }

    /// Build every family from scratch
    pub fn build_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        for family in self.families_mut() {
            family.rebuild_all(ctx)?;
            debug!(
                "Built {} constraints for {}",
                family.constraint_count(),
                family.kind()
            );
        }
        Ok(())
    }

    /// Rebuild the cell-scoped constraints of `cells`
    pub fn rebuild_cells(
        &mut self,
        ctx: &mut BuildContext<'_>,
        cells: &[usize],
    ) -> LutoptResult<()> {
        for family in self
            .families_mut()
            .into_iter()
            .filter(|f| f.kind().is_cell_scoped())
        {
            family.rebuild(ctx, cells)?;
        }
        Ok(())
    }

    /// Rebuild every aggregate family in full
    pub fn rebuild_aggregates(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        for family in self
            .families_mut()
            .into_iter()
            .filter(|f| !f.kind().is_cell_scoped())
        {
            family.rebuild_all(ctx)?;
            debug!(
                "Rebuilt {} constraints for {}",
                family.constraint_count(),
                family.kind()
            );
        }
        Ok(())
    }

    /// Families with at least one constraint in the model
    pub fn active_families(&self) -> Vec<FamilyKind> {
        self.families()
            .into_iter()
            .filter(|f| f.constraint_count() > 0)
            .map(|f| f.kind())
            .collect()
    }

    pub fn constraint_count(&self, kind: FamilyKind) -> usize {
        self.families()
            .into_iter()
            .find(|f| f.kind() == kind)
            .map_or(0, |f| f.constraint_count())
    }

    pub fn cell_usage(&self) -> &CellUsage {
        &self.cell_usage
    }

    pub fn coupling(&self) -> &ManagementCoupling {
        &self.coupling
    }

    pub fn adoption(&self) -> &AdoptionCeiling {
        &self.adoption
    }

    pub fn demand(&self) -> &Demand {
        &self.demand
    }

    pub fn water(&self) -> &Water {
        &self.water
    }

    pub fn ghg(&self) -> &Ghg {
        &self.ghg
    }

    pub fn biodiversity(&self) -> &[BiodiversityTarget] {
        &self.biodiversity
    }
}
