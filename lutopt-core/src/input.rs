//! Per-year solver input
//!
//! [`SolverInputData`] is an immutable snapshot of every coefficient the
//! formulation consumes for one simulated year. It is produced by an external
//! coefficient provider; this crate only checks that the arrays have
//! consistent shapes.
//!
//! Axis naming follows the array suffixes:
//! `m` land management (0 = dry, 1 = irrigated), `r` cell, `j` agricultural land use,
//! `k` non-agricultural land use, `p` product, `c` commodity,
//! `x` member of a biodiversity target layer.

use crate::errors::{LutoptError, LutoptResult};
use indexmap::IndexMap;
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

/// Number of land-management types (dry and irrigated)
pub const N_LAND_MANAGEMENTS: usize = 2;

/// A target expressed both in reporting units and in solver units
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Limit<T> {
    pub raw: T,
    pub rescale: T,
}

impl Limit<Array1<f64>> {
    pub fn zeros(n: usize) -> Self {
        Self {
            raw: Array1::zeros(n),
            rescale: Array1::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Area cap on one land use within one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalAdoptionLimit {
    pub region_id: usize,
    /// Index of the land use (`j` for agricultural, `k` for non-agricultural caps)
    pub landuse: usize,
    pub landuse_name: String,
    pub cells: Vec<usize>,
    /// Maximum area in hectares
    pub area_limit: f64,
}

/// Region over which net water yield is constrained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterRegion {
    pub id: usize,
    pub name: String,
    pub cells: Vec<usize>,
}

/// Members of one biodiversity target family and the area each cell contributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiodiversityLayer {
    pub names: Vec<String>,
    /// Shape (x, r)
    pub area_xr: Array2<f64>,
}

impl BiodiversityLayer {
    pub fn empty(n_cells: usize) -> Self {
        Self {
            names: vec![],
            area_xr: Array2::zeros((0, n_cells)),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Cells contributing to member `x`
    pub fn cells(&self, x: usize) -> Vec<usize> {
        self.area_xr
            .row(x)
            .iter()
            .enumerate()
            .filter(|(_, area)| **area > 0.0)
            .map(|(r, _)| r)
            .collect()
    }
}

impl Default for BiodiversityLayer {
    fn default() -> Self {
        Self::empty(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiodiversityLayers {
    pub gbf2: BiodiversityLayer,
    pub gbf3: BiodiversityLayer,
    pub gbf4_snes: BiodiversityLayer,
    pub gbf4_ecnes: BiodiversityLayer,
    pub gbf8: BiodiversityLayer,
}

/// Targets for the current year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Per commodity
    pub demand: Limit<Array1<f64>>,
    /// Per water region, in the order of [`SolverInputData::water_regions`]
    pub water: Limit<Array1<f64>>,
    pub ghg: Limit<f64>,
    pub gbf2: Limit<Array1<f64>>,
    pub gbf3: Limit<Array1<f64>>,
    pub gbf4_snes: Limit<Array1<f64>>,
    pub gbf4_ecnes: Limit<Array1<f64>>,
    pub gbf8: Limit<Array1<f64>>,
    pub ag_regional_adoption: Vec<RegionalAdoptionLimit>,
    pub non_ag_regional_adoption: Vec<RegionalAdoptionLimit>,
}

/// Multipliers converting solver units back into reporting units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleFactors {
    pub economy: f64,
    pub biodiversity: f64,
    pub demand: f64,
    pub water: f64,
    pub ghg: f64,
    pub gbf2: f64,
    pub gbf3: f64,
    pub gbf4_snes: f64,
    pub gbf4_ecnes: f64,
    pub gbf8: f64,
}

impl Default for ScaleFactors {
    fn default() -> Self {
        Self {
            economy: 1.0,
            biodiversity: 1.0,
            demand: 1.0,
            water: 1.0,
            ghg: 1.0,
            gbf2: 1.0,
            gbf3: 1.0,
            gbf4_snes: 1.0,
            gbf4_ecnes: 1.0,
            gbf8: 1.0,
        }
    }
}

/// Coefficients of one agricultural management option
///
/// Arrays with a `j` axis of length `landuses.len()` are indexed by the position
/// of the land use in `landuses` rather than by the land use itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementOptionData {
    /// Agricultural land uses (`j`) the option applies to
    pub landuses: Vec<usize>,
    /// Last year's allocation, used as lower bound when the option is irreversible.
    /// Shape (m, r, j) over all agricultural land uses.
    pub lb_mrj: Array3<f64>,
    /// Cells the option may be applied to, on top of base land-use eligibility
    #[serde(default)]
    pub cell_mask: Option<Array1<bool>>,
    pub obj_mrj: Array3<f64>,
    pub b_mrj: Array3<f64>,
    /// Shape (m, r, p)
    pub q_mrp: Array3<f64>,
    pub w_mrj: Array3<f64>,
    pub g_mrj: Array3<f64>,
    /// Shape (j, r)
    pub biodiv_contr_jr: Array2<f64>,
    /// Maximum share of each applicable land use that may adopt the option
    pub adoption_limits: Array1<f64>,
}

impl ManagementOptionData {
    /// All-zero coefficients with full adoption allowed
    pub fn zeros(landuses: Vec<usize>, n_cells: usize, n_ag: usize, n_products: usize) -> Self {
        let n_am = landuses.len();
        Self {
            landuses,
            lb_mrj: Array3::zeros((N_LAND_MANAGEMENTS, n_cells, n_ag)),
            cell_mask: None,
            obj_mrj: Array3::zeros((N_LAND_MANAGEMENTS, n_cells, n_am)),
            b_mrj: Array3::zeros((N_LAND_MANAGEMENTS, n_cells, n_am)),
            q_mrp: Array3::zeros((N_LAND_MANAGEMENTS, n_cells, n_products)),
            w_mrj: Array3::zeros((N_LAND_MANAGEMENTS, n_cells, n_am)),
            g_mrj: Array3::zeros((N_LAND_MANAGEMENTS, n_cells, n_am)),
            biodiv_contr_jr: Array2::zeros((n_am, n_cells)),
            adoption_limits: Array1::ones(n_am),
        }
    }

    /// Whether the option may be applied in cell `r`
    pub fn allows_cell(&self, r: usize) -> bool {
        self.cell_mask.as_ref().map_or(true, |mask| mask[r])
    }
}

/// Snapshot of all coefficients for a single year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverInputData {
    pub ag_landuses: Vec<String>,
    pub non_ag_landuses: Vec<String>,
    pub products: Vec<String>,
    pub commodities: Vec<String>,

    /// Area of each cell in hectares
    pub real_area: Array1<f64>,
    /// Current land-use map. Agricultural uses are coded `j`,
    /// non-agricultural uses `non_ag_base_code + k`.
    pub lumap: Array1<usize>,
    /// Current land-management map (0 = dry, 1 = irrigated)
    pub lmmap: Array1<usize>,

    /// Eligibility of each agricultural (m, j) pair in each cell
    pub ag_x_mrj: Array3<f64>,
    /// Upper bound (eligible fraction) of each non-agricultural use
    pub non_ag_x_rk: Array2<f64>,
    /// Last year's non-agricultural allocation, the lower bound of irreversible uses
    pub non_ag_lb_rk: Array2<f64>,

    pub ag_obj_mrj: Array3<f64>,
    pub non_ag_obj_rk: Array2<f64>,
    pub ag_b_mrj: Array3<f64>,
    pub non_ag_b_rk: Array2<f64>,

    pub ag_q_mrp: Array3<f64>,
    /// Which products each land use yields
    pub lu2pr_pj: Array2<f64>,
    /// Which commodities each product counts towards
    pub pr2cm_cp: Array2<f64>,
    pub non_ag_q_crk: Array3<f64>,

    pub ag_w_mrj: Array3<f64>,
    pub non_ag_w_rk: Array2<f64>,
    #[serde(default)]
    pub water_regions: Vec<WaterRegion>,

    pub ag_g_mrj: Array3<f64>,
    /// Emissions from transitioning into each agricultural use
    pub ag_ghg_t_mrj: Array3<f64>,
    pub non_ag_g_rk: Array2<f64>,
    #[serde(default)]
    pub offland_ghg: f64,

    pub biodiv_contr_ag_j: Array1<f64>,
    pub biodiv_contr_non_ag_k: Array1<f64>,
    #[serde(default)]
    pub biodiversity_layers: BiodiversityLayers,

    /// Commodity prices used to weight demand deviations
    pub economic_base_yr_prices: Array1<f64>,
    #[serde(default)]
    pub base_yr_ghg: f64,
    #[serde(default)]
    pub base_yr_water: f64,

    #[serde(default)]
    pub ag_managements: IndexMap<String, ManagementOptionData>,

    #[serde(default)]
    pub scale_factors: ScaleFactors,
    pub limits: Limits,
}

impl SolverInputData {
    /// An input where no land use is eligible and every coefficient is zero
    pub fn zeros(
        ag_landuses: Vec<String>,
        non_ag_landuses: Vec<String>,
        products: Vec<String>,
        commodities: Vec<String>,
        n_cells: usize,
    ) -> Self {
        let n_ag = ag_landuses.len();
        let n_non_ag = non_ag_landuses.len();
        let n_products = products.len();
        let n_commodities = commodities.len();
        let mrj = (N_LAND_MANAGEMENTS, n_cells, n_ag);
        let rk = (n_cells, n_non_ag);

        Self {
            ag_landuses,
            non_ag_landuses,
            products,
            commodities,
            real_area: Array1::ones(n_cells),
            lumap: Array1::zeros(n_cells),
            lmmap: Array1::zeros(n_cells),
            ag_x_mrj: Array3::zeros(mrj),
            non_ag_x_rk: Array2::zeros(rk),
            non_ag_lb_rk: Array2::zeros(rk),
            ag_obj_mrj: Array3::zeros(mrj),
            non_ag_obj_rk: Array2::zeros(rk),
            ag_b_mrj: Array3::zeros(mrj),
            non_ag_b_rk: Array2::zeros(rk),
            ag_q_mrp: Array3::zeros((N_LAND_MANAGEMENTS, n_cells, n_products)),
            lu2pr_pj: Array2::zeros((n_products, n_ag)),
            pr2cm_cp: Array2::zeros((n_commodities, n_products)),
            non_ag_q_crk: Array3::zeros((n_commodities, n_cells, n_non_ag)),
            ag_w_mrj: Array3::zeros(mrj),
            non_ag_w_rk: Array2::zeros(rk),
            water_regions: vec![],
            ag_g_mrj: Array3::zeros(mrj),
            ag_ghg_t_mrj: Array3::zeros(mrj),
            non_ag_g_rk: Array2::zeros(rk),
            offland_ghg: 0.0,
            biodiv_contr_ag_j: Array1::zeros(n_ag),
            biodiv_contr_non_ag_k: Array1::zeros(n_non_ag),
            biodiversity_layers: BiodiversityLayers {
                gbf2: BiodiversityLayer::empty(n_cells),
                gbf3: BiodiversityLayer::empty(n_cells),
                gbf4_snes: BiodiversityLayer::empty(n_cells),
                gbf4_ecnes: BiodiversityLayer::empty(n_cells),
                gbf8: BiodiversityLayer::empty(n_cells),
            },
            economic_base_yr_prices: Array1::zeros(n_commodities),
            base_yr_ghg: 0.0,
            base_yr_water: 0.0,
            ag_managements: IndexMap::new(),
            scale_factors: ScaleFactors::default(),
            limits: Limits {
                demand: Limit::zeros(n_commodities),
                water: Limit::zeros(0),
                gbf2: Limit::zeros(0),
                gbf3: Limit::zeros(0),
                gbf4_snes: Limit::zeros(0),
                gbf4_ecnes: Limit::zeros(0),
                gbf8: Limit::zeros(0),
                ..Default::default()
            },
        }
    }

    pub fn n_cells(&self) -> usize {
        self.real_area.len()
    }

    pub fn n_ag(&self) -> usize {
        self.ag_landuses.len()
    }

    pub fn n_non_ag(&self) -> usize {
        self.non_ag_landuses.len()
    }

    pub fn n_products(&self) -> usize {
        self.products.len()
    }

    pub fn n_commodities(&self) -> usize {
        self.commodities.len()
    }

    /// Replace the demand target and recompute its solver-unit value
    pub fn set_demand(&mut self, demand: Array1<f64>) -> LutoptResult<()> {
        expect_shape("demand", demand.shape(), &[self.n_commodities()])?;
        self.limits.demand.rescale = &demand / self.scale_factors.demand;
        self.limits.demand.raw = demand;
        Ok(())
    }

    /// Check that every array is consistent with the named axes
    pub fn validate(&self) -> LutoptResult<()> {
        let r = self.n_cells();
        let j = self.n_ag();
        let k = self.n_non_ag();
        let p = self.n_products();
        let c = self.n_commodities();
        let m = N_LAND_MANAGEMENTS;

        expect_shape("lumap", self.lumap.shape(), &[r])?;
        expect_shape("lmmap", self.lmmap.shape(), &[r])?;
        if let Some(bad) = self.lmmap.iter().find(|&&lm| lm >= m) {
            return Err(LutoptError::ContractViolation(format!(
                "lmmap contains land management {bad}, expected 0 or 1"
            )));
        }

        for (field, arr) in [
            ("ag_x_mrj", &self.ag_x_mrj),
            ("ag_obj_mrj", &self.ag_obj_mrj),
            ("ag_b_mrj", &self.ag_b_mrj),
            ("ag_w_mrj", &self.ag_w_mrj),
            ("ag_g_mrj", &self.ag_g_mrj),
            ("ag_ghg_t_mrj", &self.ag_ghg_t_mrj),
        ] {
            expect_shape(field, arr.shape(), &[m, r, j])?;
        }
        for (field, arr) in [
            ("non_ag_x_rk", &self.non_ag_x_rk),
            ("non_ag_lb_rk", &self.non_ag_lb_rk),
            ("non_ag_obj_rk", &self.non_ag_obj_rk),
            ("non_ag_b_rk", &self.non_ag_b_rk),
            ("non_ag_w_rk", &self.non_ag_w_rk),
            ("non_ag_g_rk", &self.non_ag_g_rk),
        ] {
            expect_shape(field, arr.shape(), &[r, k])?;
        }

        expect_shape("ag_q_mrp", self.ag_q_mrp.shape(), &[m, r, p])?;
        expect_shape("lu2pr_pj", self.lu2pr_pj.shape(), &[p, j])?;
        expect_shape("pr2cm_cp", self.pr2cm_cp.shape(), &[c, p])?;
        expect_shape("non_ag_q_crk", self.non_ag_q_crk.shape(), &[c, r, k])?;
        expect_shape("biodiv_contr_ag_j", self.biodiv_contr_ag_j.shape(), &[j])?;
        expect_shape(
            "biodiv_contr_non_ag_k",
            self.biodiv_contr_non_ag_k.shape(),
            &[k],
        )?;
        expect_shape(
            "economic_base_yr_prices",
            self.economic_base_yr_prices.shape(),
            &[c],
        )?;

        expect_shape("limits.demand.raw", self.limits.demand.raw.shape(), &[c])?;
        expect_shape(
            "limits.demand.rescale",
            self.limits.demand.rescale.shape(),
            &[c],
        )?;

        let n_regions = self.water_regions.len();
        expect_shape("limits.water.raw", self.limits.water.raw.shape(), &[n_regions])?;
        expect_shape(
            "limits.water.rescale",
            self.limits.water.rescale.shape(),
            &[n_regions],
        )?;
        for region in &self.water_regions {
            expect_cells(&format!("water_regions[{}]", region.name), &region.cells, r)?;
        }

        for (field, layer, limit) in [
            ("gbf2", &self.biodiversity_layers.gbf2, &self.limits.gbf2),
            ("gbf3", &self.biodiversity_layers.gbf3, &self.limits.gbf3),
            (
                "gbf4_snes",
                &self.biodiversity_layers.gbf4_snes,
                &self.limits.gbf4_snes,
            ),
            (
                "gbf4_ecnes",
                &self.biodiversity_layers.gbf4_ecnes,
                &self.limits.gbf4_ecnes,
            ),
            ("gbf8", &self.biodiversity_layers.gbf8, &self.limits.gbf8),
        ] {
            let x = layer.len();
            if x > 0 {
                expect_shape(
                    &format!("biodiversity_layers.{field}.area_xr"),
                    layer.area_xr.shape(),
                    &[x, r],
                )?;
            }
            expect_shape(&format!("limits.{field}.raw"), limit.raw.shape(), &[x])?;
            expect_shape(
                &format!("limits.{field}.rescale"),
                limit.rescale.shape(),
                &[x],
            )?;
        }

        for (field, caps, n_uses) in [
            ("ag_regional_adoption", &self.limits.ag_regional_adoption, j),
            (
                "non_ag_regional_adoption",
                &self.limits.non_ag_regional_adoption,
                k,
            ),
        ] {
            for cap in caps {
                if cap.landuse >= n_uses {
                    return Err(LutoptError::ContractViolation(format!(
                        "{field} references land use {} but only {n_uses} exist",
                        cap.landuse
                    )));
                }
                expect_cells(field, &cap.cells, r)?;
            }
        }

        for (name, am) in &self.ag_managements {
            let n_am = am.landuses.len();
            if let Some(&bad) = am.landuses.iter().find(|&&lu| lu >= j) {
                return Err(LutoptError::ContractViolation(format!(
                    "management option `{name}` applies to land use {bad} but only {j} exist"
                )));
            }
            let field = |suffix: &str| format!("ag_managements[{name}].{suffix}");
            expect_shape(&field("lb_mrj"), am.lb_mrj.shape(), &[m, r, j])?;
            for (suffix, arr) in [
                ("obj_mrj", &am.obj_mrj),
                ("b_mrj", &am.b_mrj),
                ("w_mrj", &am.w_mrj),
                ("g_mrj", &am.g_mrj),
            ] {
                expect_shape(&field(suffix), arr.shape(), &[m, r, n_am])?;
            }
            expect_shape(&field("q_mrp"), am.q_mrp.shape(), &[m, r, p])?;
            expect_shape(
                &field("biodiv_contr_jr"),
                am.biodiv_contr_jr.shape(),
                &[n_am, r],
            )?;
            expect_shape(
                &field("adoption_limits"),
                am.adoption_limits.shape(),
                &[n_am],
            )?;
            if let Some(mask) = &am.cell_mask {
                expect_shape(&field("cell_mask"), mask.shape(), &[r])?;
            }
        }

        Ok(())
    }
}

pub(crate) fn expect_shape(field: &str, actual: &[usize], expected: &[usize]) -> LutoptResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(LutoptError::shape(field, expected, actual))
    }
}

fn expect_cells(field: &str, cells: &[usize], n_cells: usize) -> LutoptResult<()> {
    match cells.iter().find(|&&r| r >= n_cells) {
        Some(bad) => Err(LutoptError::ContractViolation(format!(
            "{field} references cell {bad} but only {n_cells} cells exist"
        ))),
        None => Ok(()),
    }
}
