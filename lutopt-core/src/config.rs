//! Solver configuration
//!
//! Configuration is read once from TOML and validated before any model is built.
//! Unknown enumeration values and out-of-range weights are rejected with a
//! [`LutoptError::Configuration`].

use crate::errors::{LutoptError, LutoptResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of the composed objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    /// Minimise `(α·economy − (1−α)·biodiversity)(1−β) + β·penalty`
    #[serde(rename = "mincost")]
    MinCost,
    /// Maximise `(α·economy + (1−α)·biodiversity)(1−β) − β·penalty`
    #[serde(rename = "maxprofit")]
    MaxProfit,
}

impl FromStr for ObjectiveSense {
    type Err = LutoptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mincost" => Ok(ObjectiveSense::MinCost),
            "maxprofit" => Ok(ObjectiveSense::MaxProfit),
            other => Err(LutoptError::Configuration(format!(
                "Unknown objective sense `{other}`. Expected one of `mincost`, `maxprofit`"
            ))),
        }
    }
}

impl fmt::Display for ObjectiveSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveSense::MinCost => write!(f, "mincost"),
            ObjectiveSense::MaxProfit => write!(f, "maxprofit"),
        }
    }
}

/// Whether a target must be met exactly or may be violated at a cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    Hard,
    Soft,
}

impl FromStr for LimitType {
    type Err = LutoptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hard" => Ok(LimitType::Hard),
            "soft" => Ok(LimitType::Soft),
            other => Err(LutoptError::Configuration(format!(
                "Unknown limit type `{other}`. Expected one of `hard`, `soft`"
            ))),
        }
    }
}

/// Domain of the agricultural and management-option allocation variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationDomain {
    Continuous,
    Binary,
}

/// Settings applied to a single non-agricultural land use or management option
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UseSettings {
    /// Disabled uses get no decision variables
    pub enabled: bool,
    /// Irreversible uses keep last year's allocation as a lower bound
    pub reversible: bool,
}

impl Default for UseSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reversible: true,
        }
    }
}

/// Relative weights of the target-violation penalties
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    pub demand: f64,
    pub ghg: f64,
    pub water: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            demand: 1.0,
            ghg: 1.0,
            water: 1.0,
        }
    }
}

/// Switches for the biodiversity target families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BiodiversityTargets {
    /// Restoration of priority degraded areas
    pub gbf2: bool,
    /// Major vegetation groups
    pub gbf3: bool,
    /// Species of national environmental significance
    pub gbf4_snes: bool,
    /// Ecological communities of national environmental significance
    pub gbf4_ecnes: bool,
    /// Species suitability
    pub gbf8: bool,
}

/// Simplex, interior point or let the engine decide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveMethod {
    Auto,
    Simplex,
    Ipm,
}

/// Options forwarded to the solve engine
///
/// Engines ignore options they don't support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveEngineConfig {
    /// Number of threads the engine may use. `None` leaves the engine default.
    pub threads: Option<u32>,
    /// Wall clock limit in seconds
    pub time_limit: Option<f64>,
    pub primal_feasibility_tolerance: f64,
    pub dual_feasibility_tolerance: f64,
    /// Relative gap at which a mixed-integer solve is considered optimal
    pub mip_rel_gap: f64,
    pub presolve: bool,
    pub method: SolveMethod,
    pub verbose: bool,
}

impl Default for SolveEngineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            time_limit: None,
            primal_feasibility_tolerance: 1e-7,
            dual_feasibility_tolerance: 1e-7,
            mip_rel_gap: 1e-4,
            presolve: true,
            method: SolveMethod::Auto,
            verbose: false,
        }
    }
}

/// Configuration of the land-use optimisation
///
/// ```toml
/// objective = "mincost"
/// alpha = 0.8
/// beta = 0.5
/// demand_constraint_type = "soft"
/// ghg_enabled = true
/// ghg_constraint_type = "hard"
///
/// [non_ag_landuses."Environmental Plantings"]
/// reversible = false
///
/// [engine]
/// threads = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub objective: ObjectiveSense,
    /// Weight of the economic term against the biodiversity term, in [0, 1]
    pub alpha: f64,
    /// Weight of the target penalties against the objective terms, in [0, 1]
    pub beta: f64,

    pub demand_constraint_type: LimitType,

    pub water_enabled: bool,
    pub water_constraint_type: LimitType,

    pub ghg_enabled: bool,
    pub ghg_constraint_type: LimitType,

    pub biodiversity: BiodiversityTargets,

    /// Cap the area of individual land uses within regions
    pub regional_adoption: bool,

    pub penalty_weights: PenaltyWeights,

    /// Per non-agricultural land use settings, keyed by land-use name.
    /// Land uses without an entry use [`UseSettings::default`].
    pub non_ag_landuses: IndexMap<String, UseSettings>,
    /// Per management option settings, keyed by option name.
    pub ag_managements: IndexMap<String, UseSettings>,

    /// Minimum allocation for a management option to be reported as adopted
    pub activation_threshold: f64,
    /// Divisor converting economic values into objective units
    pub currency_unit: f64,
    /// Land-use map code of the first non-agricultural land use
    pub non_ag_base_code: usize,
    pub allocation_domain: AllocationDomain,
    /// Margin by which the non-agricultural branch must beat the agricultural
    /// branch when decoding a cell
    pub decode_tie_tolerance: f64,

    pub engine: SolveEngineConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            objective: ObjectiveSense::MaxProfit,
            alpha: 1.0,
            beta: 0.9,
            demand_constraint_type: LimitType::Soft,
            water_enabled: true,
            water_constraint_type: LimitType::Hard,
            ghg_enabled: true,
            ghg_constraint_type: LimitType::Hard,
            biodiversity: BiodiversityTargets::default(),
            regional_adoption: false,
            penalty_weights: PenaltyWeights::default(),
            non_ag_landuses: IndexMap::new(),
            ag_managements: IndexMap::new(),
            activation_threshold: 0.1,
            currency_unit: 1e6,
            non_ag_base_code: 100,
            allocation_domain: AllocationDomain::Continuous,
            decode_tie_tolerance: 0.0,
            engine: SolveEngineConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> LutoptResult<Self> {
        let config: SolverConfig =
            toml::from_str(content).map_err(|e| LutoptError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> LutoptResult<String> {
        toml::to_string(self).map_err(|e| LutoptError::Configuration(e.to_string()))
    }

    /// Check that every numeric setting lies in its admissible range
    pub fn validate(&self) -> LutoptResult<()> {
        check_unit_interval("alpha", self.alpha)?;
        check_unit_interval("beta", self.beta)?;

        for (name, weight) in [
            ("penalty_weights.demand", self.penalty_weights.demand),
            ("penalty_weights.ghg", self.penalty_weights.ghg),
            ("penalty_weights.water", self.penalty_weights.water),
        ] {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(LutoptError::Configuration(format!(
                    "`{name}` must be a non-negative number, got {weight}"
                )));
            }
        }
        if !(self.currency_unit.is_finite() && self.currency_unit > 0.0) {
            return Err(LutoptError::Configuration(format!(
                "`currency_unit` must be positive, got {}",
                self.currency_unit
            )));
        }
        if !(self.activation_threshold.is_finite() && self.activation_threshold > 0.0) {
            return Err(LutoptError::Configuration(format!(
                "`activation_threshold` must be positive, got {}",
                self.activation_threshold
            )));
        }
        if !(self.decode_tie_tolerance.is_finite() && self.decode_tie_tolerance >= 0.0) {
            return Err(LutoptError::Configuration(format!(
                "`decode_tie_tolerance` must be non-negative, got {}",
                self.decode_tie_tolerance
            )));
        }
        Ok(())
    }

    pub fn non_ag_landuse(&self, name: &str) -> UseSettings {
        self.non_ag_landuses.get(name).copied().unwrap_or_default()
    }

    pub fn ag_management(&self, name: &str) -> UseSettings {
        self.ag_managements.get(name).copied().unwrap_or_default()
    }

    pub fn demand_is_soft(&self) -> bool {
        self.demand_constraint_type == LimitType::Soft
    }

    pub fn water_is_soft(&self) -> bool {
        self.water_enabled && self.water_constraint_type == LimitType::Soft
    }

    pub fn ghg_is_soft(&self) -> bool {
        self.ghg_enabled && self.ghg_constraint_type == LimitType::Soft
    }
}

fn check_unit_interval(name: &str, value: f64) -> LutoptResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LutoptError::Configuration(format!(
            "`{name}` must lie in [0, 1], got {value}"
        )))
    }
}
