use crate::config::SolverConfig;
use crate::constraints::{AggregateRows, ConstraintFamily, ConstraintRegistry, FamilyKind};
use crate::decode::{decode, DecodeOptions};
use crate::input::{Limit, SolverInputData};
use crate::model::{LinExpr, VarId};
use crate::objective::ObjectiveTerms;
use crate::solve::{RawSolution, SolveStatus};
use crate::variables::VariableStore;
use indexmap::IndexMap;
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

/// Achieved values of each target, in the units of the raw targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactSummary {
    /// Production per commodity
    pub production: IndexMap<String, f64>,
    /// Total emissions, when the GHG target is modelled
    pub ghg: Option<f64>,
    /// Net water yield per region
    pub water: IndexMap<String, f64>,
    pub gbf2: IndexMap<String, f64>,
    pub gbf3: IndexMap<String, f64>,
    pub gbf4_snes: IndexMap<String, f64>,
    pub gbf4_ecnes: IndexMap<String, f64>,
    pub gbf8: IndexMap<String, f64>,
}

/// Values of the objective and its parts at the solution
///
/// The weighted terms include `alpha` and `beta`. Sector contributions are
/// unweighted, economic ones converted back from currency units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBreakdown {
    /// Objective value, only set when the solve was optimal
    pub objective: Option<f64>,
    pub economy: f64,
    pub biodiversity: f64,
    pub penalties: f64,

    pub economy_ag: f64,
    pub economy_ag_man: f64,
    pub economy_non_ag: f64,
    pub biodiversity_ag: f64,
    pub biodiversity_ag_man: f64,
    pub biodiversity_non_ag: f64,

    /// Achieved minus target, per commodity
    pub demand_deviation: IndexMap<String, f64>,
    pub water_deviation: IndexMap<String, f64>,
    pub ghg_deviation: Option<f64>,
    /// Achieved minus target, per biodiversity target family and member
    pub biodiversity_deviation: IndexMap<String, IndexMap<String, f64>>,
}

/// Decoded allocation and reporting values of a solve
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSolution {
    pub status: SolveStatus,
    pub lumap: Array1<usize>,
    pub lmmap: Array1<usize>,
    pub ammaps: IndexMap<String, Array1<u8>>,
    pub ag_x_mrj: Array3<f64>,
    pub non_ag_x_rk: Array2<f64>,
    pub ag_man_x_mrj: IndexMap<String, Array3<f64>>,
    pub prod_data: ImpactSummary,
    pub obj_val: ObjectiveBreakdown,
}

impl SolverSolution {
    pub(crate) fn from_raw(
        raw: &RawSolution,
        input: &SolverInputData,
        vars: &VariableStore,
        registry: &ConstraintRegistry,
        objective: &ObjectiveTerms,
        config: &SolverConfig,
    ) -> Self {
        let values = &raw.values;
        let ag_man_x_mrj: IndexMap<String, Array3<f64>> = input
            .ag_managements
            .iter()
            .map(|(am, data)| {
                (
                    am.clone(),
                    vars.ag_man_values(am, &data.landuses, input.n_ag(), values),
                )
            })
            .collect();
        let decoded = decode(
            &vars.ag_values(values),
            &vars.non_ag_values(values),
            &ag_man_x_mrj,
            &DecodeOptions {
                non_ag_base_code: config.non_ag_base_code,
                activation_threshold: config.activation_threshold,
                tie_tolerance: config.decode_tie_tolerance,
            },
        );

        let prod_data = impacts(values, input, registry);
        let obj_val = breakdown(raw, &prod_data, input, objective, config);

        Self {
            status: raw.status.clone(),
            lumap: decoded.lumap,
            lmmap: decoded.lmmap,
            ammaps: decoded.ammaps,
            ag_x_mrj: decoded.ag_x_mrj,
            non_ag_x_rk: decoded.non_ag_x_rk,
            ag_man_x_mrj: decoded.ag_man_x_mrj,
            prod_data,
            obj_val,
        }
    }
}

fn evaluate_rows(
    rows: &AggregateRows,
    values: &SecondaryMap<VarId, f64>,
    scale: f64,
) -> IndexMap<String, f64> {
    rows.exprs()
        .iter()
        .map(|(member, expr)| (member.clone(), expr.evaluate(values) * scale))
        .collect()
}

fn impacts(
    values: &SecondaryMap<VarId, f64>,
    input: &SolverInputData,
    registry: &ConstraintRegistry,
) -> ImpactSummary {
    let scale = &input.scale_factors;
    let mut summary = ImpactSummary {
        production: evaluate_rows(registry.demand().rows(), values, scale.demand),
        ghg: registry
            .ghg()
            .rows()
            .exprs()
            .values()
            .next()
            .map(|expr| expr.evaluate(values) * scale.ghg),
        water: evaluate_rows(registry.water().rows(), values, scale.water),
        ..Default::default()
    };
    for target in registry.biodiversity() {
        let (out, factor) = match target.kind() {
            FamilyKind::Gbf2 => (&mut summary.gbf2, scale.gbf2),
            FamilyKind::Gbf3 => (&mut summary.gbf3, scale.gbf3),
            FamilyKind::Gbf4Snes => (&mut summary.gbf4_snes, scale.gbf4_snes),
            FamilyKind::Gbf4Ecnes => (&mut summary.gbf4_ecnes, scale.gbf4_ecnes),
            FamilyKind::Gbf8 => (&mut summary.gbf8, scale.gbf8),
            _ => continue,
        };
        *out = evaluate_rows(target.rows(), values, factor);
    }
    summary
}

/// `achieved[name] − raw[i]` for each name in `names` that was modelled
fn deviations(
    achieved: &IndexMap<String, f64>,
    names: impl IntoIterator<Item = String>,
    limit: &Limit<Array1<f64>>,
) -> IndexMap<String, f64> {
    names
        .into_iter()
        .enumerate()
        .filter_map(|(i, name)| {
            let value = achieved.get(&name)?;
            Some((name, value - limit.raw.get(i).copied().unwrap_or(0.0)))
        })
        .collect()
}

fn breakdown(
    raw: &RawSolution,
    prod_data: &ImpactSummary,
    input: &SolverInputData,
    objective: &ObjectiveTerms,
    config: &SolverConfig,
) -> ObjectiveBreakdown {
    let values = &raw.values;
    let eval = |expr: &LinExpr| expr.evaluate(values);
    let limits = &input.limits;

    let mut biodiversity_deviation = IndexMap::new();
    for (name, achieved, layer, limit) in [
        ("GBF2", &prod_data.gbf2, &input.biodiversity_layers.gbf2, &limits.gbf2),
        ("GBF3", &prod_data.gbf3, &input.biodiversity_layers.gbf3, &limits.gbf3),
        (
            "GBF4_SNES",
            &prod_data.gbf4_snes,
            &input.biodiversity_layers.gbf4_snes,
            &limits.gbf4_snes,
        ),
        (
            "GBF4_ECNES",
            &prod_data.gbf4_ecnes,
            &input.biodiversity_layers.gbf4_ecnes,
            &limits.gbf4_ecnes,
        ),
        ("GBF8", &prod_data.gbf8, &input.biodiversity_layers.gbf8, &limits.gbf8),
    ] {
        if !achieved.is_empty() {
            biodiversity_deviation.insert(
                name.to_string(),
                deviations(achieved, layer.names.iter().cloned(), limit),
            );
        }
    }

    ObjectiveBreakdown {
        objective: if raw.status.is_optimal() {
            raw.objective
        } else {
            None
        },
        economy: eval(&objective.economy) * config.alpha,
        biodiversity: eval(&objective.biodiversity) * (1.0 - config.alpha),
        penalties: eval(&objective.penalty) * config.beta,

        economy_ag: eval(&objective.economy_ag) * config.currency_unit,
        economy_ag_man: eval(&objective.economy_ag_man) * config.currency_unit,
        economy_non_ag: eval(&objective.economy_non_ag) * config.currency_unit,
        biodiversity_ag: eval(&objective.biodiversity_ag),
        biodiversity_ag_man: eval(&objective.biodiversity_ag_man),
        biodiversity_non_ag: eval(&objective.biodiversity_non_ag),

        demand_deviation: deviations(
            &prod_data.production,
            input.commodities.iter().cloned(),
            &limits.demand,
        ),
        water_deviation: deviations(
            &prod_data.water,
            input.water_regions.iter().map(|region| region.name.clone()),
            &limits.water,
        ),
        ghg_deviation: if config.ghg_is_soft() {
            prod_data.ghg.map(|ghg| ghg - limits.ghg.raw)
        } else {
            None
        },
        biodiversity_deviation,
    }
}
