use super::{AggregateRows, BuildContext, ConstraintFamily, FamilyKind};
use crate::errors::LutoptResult;
use crate::model::{LinearModel, Relation};
use crate::tools::am_name_snake_case;

/// Share of a land use that may adopt a management option:
/// `Σ x_ag_man[am, ·, ·, j] ≤ limit[am, j] · Σ x_ag[·, ·, j]`
#[derive(Debug, Clone, Default)]
pub struct AdoptionCeiling {
    rows: AggregateRows,
}

impl AdoptionCeiling {
    pub fn rows(&self) -> &AggregateRows {
        &self.rows
    }
}

impl ConstraintFamily for AdoptionCeiling {
    fn kind(&self) -> FamilyKind {
        FamilyKind::AdoptionCeiling
    }

    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        self.remove_all(ctx.model);
        let all_cells = 0..ctx.input.n_cells();

        for (am, data) in &ctx.input.ag_managements {
            if !ctx.config.ag_management(am).enabled {
                continue;
            }
            let am_name = am_name_snake_case(am);
            for (j_idx, &j) in data.landuses.iter().enumerate() {
                let adopted = ctx.vars.ag_man_expr(am, all_cells.clone(), |_, _, idx| {
                    if idx == j_idx {
                        1.0
                    } else {
                        0.0
                    }
                });
                if adopted.is_empty() {
                    continue;
                }
                let total = ctx.vars.ag_expr(all_cells.clone(), |_, _, lu| {
                    if lu == j {
                        1.0
                    } else {
                        0.0
                    }
                });
                let mut lhs = adopted.clone();
                lhs.add_scaled(&total, -data.adoption_limits[j_idx]);
                self.rows.add(
                    ctx.model,
                    format!("ag_man_adoption_limit_{am_name}_{j}"),
                    lhs,
                    Relation::Le,
                    0.0,
                )?;
                self.rows
                    .record(format!("{am}|{}", ctx.input.ag_landuses[j]), adopted);
            }
        }
        Ok(())
    }

    fn remove_all(&mut self, model: &mut LinearModel) {
        self.rows.clear(model);
    }

    fn constraint_count(&self) -> usize {
        self.rows.len()
    }
}

/// Area cap of a land use within a region: `Σ_r area[r] · x[r, lu] ≤ limit`
///
/// One family instance covers agricultural caps, another non-agricultural caps.
#[derive(Debug, Clone)]
pub struct RegionalAdoption {
    kind: FamilyKind,
    rows: AggregateRows,
}

impl RegionalAdoption {
    pub fn new(kind: FamilyKind) -> Self {
        Self {
            kind,
            rows: AggregateRows::default(),
        }
    }

    pub fn rows(&self) -> &AggregateRows {
        &self.rows
    }
}

impl ConstraintFamily for RegionalAdoption {
    fn kind(&self) -> FamilyKind {
        self.kind
    }

    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        self.remove_all(ctx.model);
        if !ctx.config.regional_adoption {
            return Ok(());
        }
        let input = ctx.input;
        let (caps, prefix) = match self.kind {
            FamilyKind::NonAgRegionalAdoption => {
                (&input.limits.non_ag_regional_adoption, "non_ag")
            }
            _ => (&input.limits.ag_regional_adoption, "ag"),
        };

        for cap in caps {
            let cells = cap.cells.iter().copied();
            let expr = if self.kind == FamilyKind::NonAgRegionalAdoption {
                ctx.vars.non_ag_expr(cells, |r, k| {
                    if k == cap.landuse {
                        input.real_area[r]
                    } else {
                        0.0
                    }
                })
            } else {
                ctx.vars.ag_expr(cells, |_, r, j| {
                    if j == cap.landuse {
                        input.real_area[r]
                    } else {
                        0.0
                    }
                })
            };
            if expr.is_empty() {
                continue;
            }
            let lu_name = cap.landuse_name.replace(' ', "_");
            self.rows.add(
                ctx.model,
                format!("reg_adopt_limit_{prefix}_{lu_name}_{}", cap.region_id),
                expr.clone(),
                Relation::Le,
                cap.area_limit,
            )?;
            self.rows
                .record(format!("{}|{}", cap.region_id, cap.landuse_name), expr);
        }
        Ok(())
    }

    fn remove_all(&mut self, model: &mut LinearModel) {
        self.rows.clear(model);
    }

    fn constraint_count(&self) -> usize {
        self.rows.len()
    }
}
