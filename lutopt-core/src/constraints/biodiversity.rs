use super::{AggregateRows, BuildContext, ConstraintFamily, FamilyKind};
use crate::errors::{LutoptError, LutoptResult};
use crate::input::{BiodiversityLayer, Limit, SolverInputData};
use crate::model::{LinearModel, Relation};
use log::{debug, warn};
use ndarray::Array1;

/// Biodiversity contribution of each member of a target layer stays above its limit
///
/// The contribution of an allocation in cell `r` to member `x` is
/// `area[x, r] × contribution of the use`. Members without any contributing cell
/// and members with a zero target are not modelled.
#[derive(Debug, Clone)]
pub struct BiodiversityTarget {
    kind: FamilyKind,
    rows: AggregateRows,
}

impl BiodiversityTarget {
    pub fn new(kind: FamilyKind) -> Self {
        Self {
            kind,
            rows: AggregateRows::default(),
        }
    }

    pub fn rows(&self) -> &AggregateRows {
        &self.rows
    }

    fn enabled(&self, ctx: &BuildContext<'_>) -> bool {
        let targets = &ctx.config.biodiversity;
        match self.kind {
            FamilyKind::Gbf2 => targets.gbf2,
            FamilyKind::Gbf3 => targets.gbf3,
            FamilyKind::Gbf4Snes => targets.gbf4_snes,
            FamilyKind::Gbf4Ecnes => targets.gbf4_ecnes,
            FamilyKind::Gbf8 => targets.gbf8,
            _ => false,
        }
    }

    fn layer<'a>(
        &self,
        input: &'a SolverInputData,
    ) -> LutoptResult<(&'a BiodiversityLayer, &'a Limit<Array1<f64>>)> {
        let layers = &input.biodiversity_layers;
        let limits = &input.limits;
        match self.kind {
            FamilyKind::Gbf2 => Ok((&layers.gbf2, &limits.gbf2)),
            FamilyKind::Gbf3 => Ok((&layers.gbf3, &limits.gbf3)),
            FamilyKind::Gbf4Snes => Ok((&layers.gbf4_snes, &limits.gbf4_snes)),
            FamilyKind::Gbf4Ecnes => Ok((&layers.gbf4_ecnes, &limits.gbf4_ecnes)),
            FamilyKind::Gbf8 => Ok((&layers.gbf8, &limits.gbf8)),
            other => Err(LutoptError::ContractViolation(format!(
                "{other} is not a biodiversity target"
            ))),
        }
    }
}

impl ConstraintFamily for BiodiversityTarget {
    fn kind(&self) -> FamilyKind {
        self.kind
    }

    fn rebuild_all(&mut self, ctx: &mut BuildContext<'_>) -> LutoptResult<()> {
        self.remove_all(ctx.model);
        if !self.enabled(ctx) {
            return Ok(());
        }
        let input = ctx.input;
        let (layer, limit) = self.layer(input)?;

        for (x, member) in layer.names.iter().enumerate() {
            let cells = layer.cells(x);
            if cells.is_empty() {
                warn!(
                    "{} target `{member}` has no contributing cells, skipping",
                    self.kind
                );
                continue;
            }
            if limit.raw[x] == 0.0 {
                debug!("{} target `{member}` is zero, skipping", self.kind);
                continue;
            }

            let area = layer.area_xr.row(x);
            let mut expr = ctx.vars.ag_expr(cells.iter().copied(), |_, r, j| {
                area[r] * input.biodiv_contr_ag_j[j]
            });
            for (am, data) in &input.ag_managements {
                expr.add_expr(&ctx.vars.ag_man_expr(am, cells.iter().copied(), |_, r, j_idx| {
                    area[r] * data.biodiv_contr_jr[[j_idx, r]]
                }));
            }
            expr.add_expr(&ctx.vars.non_ag_expr(cells.iter().copied(), |r, k| {
                area[r] * input.biodiv_contr_non_ag_k[k]
            }));

            self.rows.add(
                ctx.model,
                format!("bio_{}_{x}", self.kind),
                expr.clone(),
                Relation::Ge,
                limit.rescale[x],
            )?;
            self.rows.record(member.clone(), expr);
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
