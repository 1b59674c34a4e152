//! Lifecycle of a land-use optimisation model across simulated years
//!
//! A [`LandUseSolver`] starts unbuilt. [`LandUseSolver::formulate`] builds the
//! complete model for the first year. Each later year is applied with
//! [`LandUseSolver::update`], which rebuilds only the variables and cell-scoped
//! constraints of cells whose state changed, then rebuilds every aggregate
//! constraint family and the objective.
//!
//! ```text
//! Unbuilt --formulate--> Formulated --update--> Formulated
//!                              \--solve--> SolverSolution
//! ```

mod diff;
mod solution;

pub use diff::PreviousState;
pub use solution::{ImpactSummary, ObjectiveBreakdown, SolverSolution};

use crate::config::SolverConfig;
use crate::constraints::{BuildContext, ConstraintRegistry};
use crate::errors::{LutoptError, LutoptResult};
use crate::input::SolverInputData;
use crate::model::LinearModel;
use crate::objective::{check_baselines, compose, ObjectiveTerms};
use crate::solve::{default_engine, SolveEngine};
use crate::variables::VariableStore;
use log::info;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome of an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Cells whose variables and cell-scoped constraints were rebuilt
    pub changed: usize,
    /// Cells left untouched
    pub skipped: usize,
}

/// Everything built for the current year
#[derive(Clone)]
struct Formulation {
    input: SolverInputData,
    model: LinearModel,
    vars: VariableStore,
    registry: ConstraintRegistry,
    objective: ObjectiveTerms,
}

impl Formulation {
    /// Rebuild the variables and constraints of `changed` cells for `input`
    fn apply(
        &mut self,
        input: SolverInputData,
        changed: &[usize],
        config: &SolverConfig,
    ) -> LutoptResult<()> {
        self.input = input;
        self.vars
            .rebuild_cells(&mut self.model, &self.input, config, changed)?;
        self.vars
            .sync_deviations(&mut self.model, &self.input, config)?;

        let mut ctx = BuildContext {
            model: &mut self.model,
            vars: &self.vars,
            input: &self.input,
            config,
        };
        self.registry.rebuild_cells(&mut ctx, changed)?;
        self.registry.rebuild_aggregates(&mut ctx)?;

        self.objective = compose(&self.vars, &self.input, config)?;
        self.model
            .set_objective(self.objective.objective.clone(), self.objective.sense);
        Ok(())
    }
}

enum SolverState {
    Unbuilt,
    Formulated(Box<Formulation>),
}

pub struct LandUseSolver {
    config: SolverConfig,
    engine: Box<dyn SolveEngine>,
    state: SolverState,
}

impl LandUseSolver {
    pub fn new(config: SolverConfig, engine: Box<dyn SolveEngine>) -> LutoptResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            engine,
            state: SolverState::Unbuilt,
        })
    }

    /// Use the best engine available, configured from `config.engine`
    pub fn with_default_engine(config: SolverConfig) -> LutoptResult<Self> {
        let engine = default_engine(&config.engine);
        Self::new(config, engine)
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn is_formulated(&self) -> bool {
        matches!(self.state, SolverState::Formulated(_))
    }

    fn formulation(&self) -> LutoptResult<&Formulation> {
        match &self.state {
            SolverState::Formulated(formulation) => Ok(&**formulation),
            SolverState::Unbuilt => Err(LutoptError::InvalidState(
                "the model has not been formulated".to_string(),
            )),
        }
    }

    /// Build the complete model for `input`, replacing any existing model
    pub fn formulate(&mut self, input: SolverInputData) -> LutoptResult<()> {
        let start = Instant::now();
        input.validate()?;
        check_baselines(&input, &self.config)?;

        let mut model = LinearModel::new();
        let vars = VariableStore::build(&mut model, &input, &self.config)?;
        let mut registry = ConstraintRegistry::new(input.n_cells());
        registry.build_all(&mut BuildContext {
            model: &mut model,
            vars: &vars,
            input: &input,
            config: &self.config,
        })?;
        let objective = compose(&vars, &input, &self.config)?;
        model.set_objective(objective.objective.clone(), objective.sense);

        info!(
            "Formulated {} variables and {} constraints over {} cells in {:.2?}",
            model.n_variables(),
            model.n_constraints(),
            input.n_cells(),
            start.elapsed()
        );
        self.state = SolverState::Formulated(Box::new(Formulation {
            input,
            model,
            vars,
            registry,
            objective,
        }));
        Ok(())
    }

    /// Apply the next year's input to the existing model
    ///
    /// `previous` describes the state the model was built for. Only cells whose
    /// state differs between `previous` and `input` are rebuilt. Aggregate families
    /// and the objective are always rebuilt.
    ///
    /// The rebuild runs on a copy of the formulation. On error the model built for
    /// the previous year is kept and can still be solved.
    pub fn update(
        &mut self,
        mut input: SolverInputData,
        demand: Array1<f64>,
        previous: &PreviousState,
    ) -> LutoptResult<UpdateReport> {
        let start = Instant::now();
        let config = &self.config;
        let formulation = match &mut self.state {
            SolverState::Formulated(formulation) => formulation,
            SolverState::Unbuilt => {
                return Err(LutoptError::InvalidState(
                    "update called before formulate".to_string(),
                ))
            }
        };

        input.validate()?;
        check_dimensions(&formulation.input, &input)?;
        input.set_demand(demand)?;
        check_baselines(&input, config)?;
        let changed = previous.changed_cells(&input, config)?;

        let mut next = formulation.as_ref().clone();
        next.apply(input, &changed, config)?;
        **formulation = next;

        let report = UpdateReport {
            changed: changed.len(),
            skipped: formulation.input.n_cells() - changed.len(),
        };
        info!(
            "Updated model: {} cells rebuilt, {} skipped, {} variables and {} constraints in {:.2?}",
            report.changed,
            report.skipped,
            formulation.model.n_variables(),
            formulation.model.n_constraints(),
            start.elapsed()
        );
        Ok(report)
    }

    /// [`Self::update`] against the input the model was last built from
    pub fn update_from_last(
        &mut self,
        input: SolverInputData,
        demand: Array1<f64>,
    ) -> LutoptResult<UpdateReport> {
        let previous = PreviousState::from_input(&self.formulation()?.input);
        self.update(input, demand, &previous)
    }

    /// Solve the current model and decode the allocation
    ///
    /// A model without a solution is reported as [`LutoptError::Infeasible`]
    /// together with the constraint families present. The model is left unchanged
    /// and can be updated and solved again.
    pub fn solve(&self) -> LutoptResult<SolverSolution> {
        let formulation = self.formulation()?;
        formulation.model.check_references()?;

        info!(
            "Solving {} variables and {} constraints with {}",
            formulation.model.n_variables(),
            formulation.model.n_constraints(),
            self.engine.name()
        );
        let start = Instant::now();
        let raw = self.engine.solve(&formulation.model)?;
        info!("Solve finished with status {} in {:.2?}", raw.status, start.elapsed());

        if !raw.status.has_values() {
            return Err(LutoptError::Infeasible {
                status: raw.status.to_string(),
                active_families: formulation
                    .registry
                    .active_families()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }

        Ok(SolverSolution::from_raw(
            &raw,
            &formulation.input,
            &formulation.vars,
            &formulation.registry,
            &formulation.objective,
            &self.config,
        ))
    }

    pub fn model(&self) -> LutoptResult<&LinearModel> {
        Ok(&self.formulation()?.model)
    }

    pub fn variables(&self) -> LutoptResult<&VariableStore> {
        Ok(&self.formulation()?.vars)
    }

    pub fn registry(&self) -> LutoptResult<&ConstraintRegistry> {
        Ok(&self.formulation()?.registry)
    }

    pub fn objective(&self) -> LutoptResult<&ObjectiveTerms> {
        Ok(&self.formulation()?.objective)
    }

    /// The input the model was last built from
    pub fn input(&self) -> LutoptResult<&SolverInputData> {
        Ok(&self.formulation()?.input)
    }
}

/// The named axes of a formulation cannot change between years
fn check_dimensions(built: &SolverInputData, input: &SolverInputData) -> LutoptResult<()> {
    for (field, expected, actual) in [
        ("cells", built.n_cells(), input.n_cells()),
        ("ag_landuses", built.n_ag(), input.n_ag()),
        ("non_ag_landuses", built.n_non_ag(), input.n_non_ag()),
        ("products", built.n_products(), input.n_products()),
        ("commodities", built.n_commodities(), input.n_commodities()),
        (
            "water_regions",
            built.water_regions.len(),
            input.water_regions.len(),
        ),
    ] {
        if expected != actual {
            return Err(LutoptError::shape(field, &[expected], &[actual]));
        }
    }
    if !built
        .ag_managements
        .iter()
        .zip(input.ag_managements.iter())
        .all(|((am_a, a), (am_b, b))| am_a == am_b && a.landuses == b.landuses)
        || built.ag_managements.len() != input.ag_managements.len()
    {
        return Err(LutoptError::ContractViolation(
            "management options and their land uses cannot change between years".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
