//! Conversions between land-use maps and decision-variable layouts

use crate::input::N_LAND_MANAGEMENTS;
#[cfg(test)]
use ndarray::{Array1, Array2, Array3};

/// Short names of the land-management types, used in variable names
pub const LAND_MANAGEMENT_NAMES: [&str; N_LAND_MANAGEMENTS] = ["dry", "irr"];

/// Lower-case a management option name and join its words with underscores
///
/// "Savanna Burning" becomes "savanna_burning".
pub fn am_name_snake_case(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Agricultural allocation `(m, r, j)` implied by a land-use and land-management map
///
/// Cells holding a non-agricultural use (code ≥ `n_ag`) are all zero.
#[cfg(test)]
pub(crate) fn lumap2ag_l_mrj(lumap: &Array1<usize>, lmmap: &Array1<usize>, n_ag: usize) -> Array3<bool> {
    let mut x_mrj = Array3::from_elem((N_LAND_MANAGEMENTS, lumap.len(), n_ag), false);
    for (r, (&lu, &lm)) in lumap.iter().zip(lmmap.iter()).enumerate() {
        if lu < n_ag && lm < N_LAND_MANAGEMENTS {
            x_mrj[[lm, r, lu]] = true;
        }
    }
    x_mrj
}

/// Non-agricultural allocation `(r, k)` implied by a land-use map
#[cfg(test)]
pub(crate) fn lumap2non_ag_l_rk(lumap: &Array1<usize>, n_non_ag: usize, base_code: usize) -> Array2<bool> {
    let mut x_rk = Array2::from_elem((lumap.len(), n_non_ag), false);
    for (r, &lu) in lumap.iter().enumerate() {
        if lu >= base_code && lu - base_code < n_non_ag {
            x_rk[[r, lu - base_code]] = true;
        }
    }
    x_rk
}
