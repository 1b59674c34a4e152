//! Objective composition
//!
//! The objective combines three terms:
//!
//! * economy: economic contribution of every allocation variable, scaled by the
//!   economy scale factor and divided by the currency unit,
//! * biodiversity: biodiversity contribution of every allocation variable,
//! * penalty: weighted cost of the deviation variables of soft targets,
//!   normalised by the sum of the weights in use.
//!
//! `alpha` trades economy against biodiversity and `beta` trades both against the
//! penalty. For [`ObjectiveSense::MinCost`] the economic coefficients are costs:
//!
//! $$ \min\ (\alpha E - (1-\alpha) B)(1-\beta) + \beta P $$
//!
//! and for [`ObjectiveSense::MaxProfit`] they are profits:
//!
//! $$ \max\ (\alpha E + (1-\alpha) B)(1-\beta) - \beta P $$

use crate::config::{ObjectiveSense, SolverConfig};
use crate::errors::{LutoptError, LutoptResult};
use crate::input::SolverInputData;
use crate::model::{LinExpr, ModelSense};
use crate::variables::VariableStore;

/// The composed objective and each of its parts
#[derive(Debug, Clone, Default)]
pub struct ObjectiveTerms {
    pub economy_ag: LinExpr,
    pub economy_ag_man: LinExpr,
    pub economy_non_ag: LinExpr,
    pub biodiversity_ag: LinExpr,
    pub biodiversity_ag_man: LinExpr,
    pub biodiversity_non_ag: LinExpr,
    pub economy: LinExpr,
    pub biodiversity: LinExpr,
    /// Weighted demand penalty, before normalisation
    pub penalty_demand: LinExpr,
    pub penalty_ghg: LinExpr,
    pub penalty_water: LinExpr,
    /// Normalised sum of the penalties in use
    pub penalty: LinExpr,
    pub objective: LinExpr,
    pub sense: ModelSense,
}

/// Build the objective from the current variables and coefficients
pub fn compose(
    vars: &VariableStore,
    input: &SolverInputData,
    config: &SolverConfig,
) -> LutoptResult<ObjectiveTerms> {
    let all_cells = 0..input.n_cells();
    let scale = &input.scale_factors;
    let economy_scale = scale.economy / config.currency_unit;

    let economy_ag = vars
        .ag_expr(all_cells.clone(), |m, r, j| input.ag_obj_mrj[[m, r, j]])
        .scaled(economy_scale);
    let biodiversity_ag = vars
        .ag_expr(all_cells.clone(), |m, r, j| input.ag_b_mrj[[m, r, j]])
        .scaled(scale.biodiversity);

    let mut economy_ag_man = LinExpr::new();
    let mut biodiversity_ag_man = LinExpr::new();
    for (am, data) in &input.ag_managements {
        economy_ag_man.add_scaled(
            &vars.ag_man_expr(am, all_cells.clone(), |m, r, j_idx| {
                data.obj_mrj[[m, r, j_idx]]
            }),
            economy_scale,
        );
        biodiversity_ag_man.add_scaled(
            &vars.ag_man_expr(am, all_cells.clone(), |m, r, j_idx| {
                data.b_mrj[[m, r, j_idx]]
            }),
            scale.biodiversity,
        );
    }

    let economy_non_ag = vars
        .non_ag_expr(all_cells.clone(), |r, k| input.non_ag_obj_rk[[r, k]])
        .scaled(economy_scale);
    let biodiversity_non_ag = vars
        .non_ag_expr(all_cells, |r, k| input.non_ag_b_rk[[r, k]])
        .scaled(scale.biodiversity);

    let mut economy = economy_ag.clone();
    economy.add_expr(&economy_ag_man);
    economy.add_expr(&economy_non_ag);
    let mut biodiversity = biodiversity_ag.clone();
    biodiversity.add_expr(&biodiversity_ag_man);
    biodiversity.add_expr(&biodiversity_non_ag);

    let (penalty_demand, penalty_ghg, penalty_water, penalty) = penalties(vars, input, config)?;

    let alpha = config.alpha;
    let beta = config.beta;
    let mut objective = LinExpr::new();
    let sense = match config.objective {
        ObjectiveSense::MinCost => {
            objective.add_scaled(&economy, alpha * (1.0 - beta));
            objective.add_scaled(&biodiversity, -(1.0 - alpha) * (1.0 - beta));
            objective.add_scaled(&penalty, beta);
            ModelSense::Minimise
        }
        ObjectiveSense::MaxProfit => {
            objective.add_scaled(&economy, alpha * (1.0 - beta));
            objective.add_scaled(&biodiversity, (1.0 - alpha) * (1.0 - beta));
            objective.add_scaled(&penalty, -beta);
            ModelSense::Maximise
        }
    };

    Ok(ObjectiveTerms {
        economy_ag,
        economy_ag_man,
        economy_non_ag,
        biodiversity_ag,
        biodiversity_ag_man,
        biodiversity_non_ag,
        economy,
        biodiversity,
        penalty_demand,
        penalty_ghg,
        penalty_water,
        penalty,
        objective,
        sense,
    })
}

fn penalties(
    vars: &VariableStore,
    input: &SolverInputData,
    config: &SolverConfig,
) -> LutoptResult<(LinExpr, LinExpr, LinExpr, LinExpr)> {
    let scale = &input.scale_factors;
    let weights = &config.penalty_weights;
    let mut total_weight = 0.0;

    let mut demand = LinExpr::new();
    if config.demand_is_soft() {
        for (c, &v) in vars.demand_deviation().iter().enumerate() {
            demand.add_term(
                v,
                scale.demand * input.economic_base_yr_prices[c] * weights.demand
                    / config.currency_unit,
            );
        }
        total_weight += weights.demand;
    }

    let mut ghg = LinExpr::new();
    if config.ghg_is_soft() {
        let e = vars.ghg_deviation().ok_or_else(|| {
            LutoptError::ContractViolation("no deviation variable for GHG".to_string())
        })?;
        let baseline = nonzero_baseline("base_yr_ghg", input.base_yr_ghg)?;
        ghg.add_term(e, scale.ghg * weights.ghg / baseline);
        total_weight += weights.ghg;
    }

    let mut water = LinExpr::new();
    if config.water_is_soft() && !vars.water_deviation().is_empty() {
        let baseline = nonzero_baseline("base_yr_water", input.base_yr_water)?;
        let n_regions = vars.water_deviation().len() as f64;
        for &w in vars.water_deviation() {
            water.add_term(w, scale.water * weights.water / baseline / n_regions);
        }
        total_weight += weights.water;
    }

    let mut penalty = LinExpr::new();
    if total_weight > 0.0 {
        for part in [&demand, &ghg, &water] {
            penalty.add_scaled(part, 1.0 / total_weight);
        }
    }
    Ok((demand, ghg, water, penalty))
}

/// Reject soft targets whose penalty cannot be normalised
///
/// Run before the model is touched so that a bad year leaves it unchanged.
pub fn check_baselines(input: &SolverInputData, config: &SolverConfig) -> LutoptResult<()> {
    if config.ghg_is_soft() {
        nonzero_baseline("base_yr_ghg", input.base_yr_ghg)?;
    }
    if config.water_is_soft() && !input.water_regions.is_empty() {
        nonzero_baseline("base_yr_water", input.base_yr_water)?;
    }
    Ok(())
}

fn nonzero_baseline(name: &str, value: f64) -> LutoptResult<f64> {
    if value == 0.0 || !value.is_finite() {
        Err(LutoptError::Configuration(format!(
            "`{name}` must be finite and non-zero to normalise its soft target penalty"
        )))
    } else {
        Ok(value.abs())
    }
}
