use super::VarId;
use indexmap::IndexMap;
use slotmap::SecondaryMap;

/// A linear expression `Σ coeff·var + constant`
///
/// Terms are kept in insertion order and a variable appears at most once;
/// adding the same variable twice accumulates its coefficient.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: IndexMap<VarId, f64>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_constant(constant: f64) -> Self {
        Self {
            terms: IndexMap::new(),
            constant,
        }
    }

    /// Add `coeff·var`. Zero coefficients are dropped.
    pub fn add_term(&mut self, var: VarId, coeff: f64) {
        if coeff == 0.0 {
            return;
        }
        *self.terms.entry(var).or_insert(0.0) += coeff;
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Add `scale·other`
    pub fn add_scaled(&mut self, other: &LinExpr, scale: f64) {
        if scale == 0.0 {
            return;
        }
        for (&var, &coeff) in &other.terms {
            self.add_term(var, coeff * scale);
        }
        self.constant += other.constant * scale;
    }

    pub fn add_expr(&mut self, other: &LinExpr) {
        self.add_scaled(other, 1.0);
    }

    /// A copy with every coefficient and the constant multiplied by `scale`
    pub fn scaled(&self, scale: f64) -> LinExpr {
        let mut out = LinExpr::new();
        out.add_scaled(self, scale);
        out
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(&var, &coeff)| (var, coeff))
    }

    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms.get(&var).copied().unwrap_or(0.0)
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True if the expression has no variable terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression for the given variable values.
    /// Variables without a value count as zero.
    pub fn evaluate(&self, values: &SecondaryMap<VarId, f64>) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values.get(*var).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

impl FromIterator<(VarId, f64)> for LinExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        let mut expr = LinExpr::new();
        for (var, coeff) in iter {
            expr.add_term(var, coeff);
        }
        expr
    }
}
