//! Conversion of solved allocations into land-use maps
//!
//! Solved allocations are fractional in general, so a cell may hold non-zero values
//! for several uses. [`decode`] assigns exactly one use and one land management to
//! every cell without modifying its inputs.

use crate::input::N_LAND_MANAGEMENTS;
use indexmap::IndexMap;
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};

/// How ties and activations are resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    /// Code of the first non-agricultural land use in the land-use map
    pub non_ag_base_code: usize,
    /// Minimum allocation for a management option to count as adopted
    pub activation_threshold: f64,
    /// Margin by which the best non-agricultural value must exceed the best
    /// agricultural value for a cell to be classed non-agricultural
    pub tie_tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAllocation {
    pub lumap: Array1<usize>,
    pub lmmap: Array1<usize>,
    /// Per option, 1 where the option is adopted on the cell's selected use
    pub ammaps: IndexMap<String, Array1<u8>>,
    /// Agricultural allocation with non-agricultural cells zeroed
    pub ag_x_mrj: Array3<f64>,
    /// Non-agricultural allocation with agricultural cells zeroed
    pub non_ag_x_rk: Array2<f64>,
    pub ag_man_x_mrj: IndexMap<String, Array3<f64>>,
}

/// Index of the largest value, the first one on ties
fn argmax(values: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

fn max_or_zero(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(f64::NEG_INFINITY, f64::max).max(0.0)
}

/// Resolve solved allocations into one land use and one land management per cell
///
/// A cell is non-agricultural when its best non-agricultural value exceeds its best
/// agricultural value by more than the tie tolerance. The land use of an agricultural
/// cell is the arg-max over land uses of the allocation summed over land managements,
/// and its land management the arg-max over managements of the allocation summed over
/// land uses. Non-agricultural cells are always dryland.
///
/// `ag_man_x_mrj` holds each option's allocation over all agricultural land uses.
pub fn decode(
    ag_x_mrj: &Array3<f64>,
    non_ag_x_rk: &Array2<f64>,
    ag_man_x_mrj: &IndexMap<String, Array3<f64>>,
    options: &DecodeOptions,
) -> DecodedAllocation {
    let n_cells = ag_x_mrj.len_of(Axis(1));
    let mut ag_x = ag_x_mrj.clone();
    let mut non_ag_x = non_ag_x_rk.clone();
    let mut lumap = Array1::zeros(n_cells);
    let mut lmmap = Array1::zeros(n_cells);
    let mut non_ag_cells = vec![false; n_cells];

    for r in 0..n_cells {
        let ag_r = ag_x_mrj.index_axis(Axis(1), r);
        let non_ag_r = non_ag_x_rk.row(r);
        let best_ag = max_or_zero(ag_r.iter().copied());
        let best_non_ag = max_or_zero(non_ag_r.iter().copied());

        if non_ag_r.len() > 0 && best_non_ag > best_ag + options.tie_tolerance {
            non_ag_cells[r] = true;
            lumap[r] = options.non_ag_base_code + argmax(non_ag_r);
            lmmap[r] = 0;
            ag_x.index_axis_mut(Axis(1), r).fill(0.0);
        } else {
            lumap[r] = argmax(ag_r.sum_axis(Axis(0)).view());
            lmmap[r] = argmax(ag_r.sum_axis(Axis(1)).view());
            non_ag_x.row_mut(r).fill(0.0);
        }
    }

    let ammaps = ag_man_x_mrj
        .iter()
        .map(|(am, x_mrj)| {
            let map = Array1::from_shape_fn(n_cells, |r| {
                let (m, j) = (lmmap[r], lumap[r]);
                let adopted = !non_ag_cells[r]
                    && m < N_LAND_MANAGEMENTS
                    && j < x_mrj.len_of(Axis(2))
                    && x_mrj[[m, r, j]] >= options.activation_threshold;
                u8::from(adopted)
            });
            (am.clone(), map)
        })
        .collect();

    DecodedAllocation {
        lumap,
        lmmap,
        ammaps,
        ag_x_mrj: ag_x,
        non_ag_x_rk: non_ag_x,
        ag_man_x_mrj: ag_man_x_mrj.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{lumap2ag_l_mrj, lumap2non_ag_l_rk};
    use ndarray::array;

    fn options() -> DecodeOptions {
        DecodeOptions {
            non_ag_base_code: 100,
            activation_threshold: 0.1,
            tie_tolerance: 0.0,
        }
    }

    #[test]
    fn binary_allocations_round_trip_through_maps() {
        let lumap = array![0, 2, 100, 1];
        let lmmap = array![0, 1, 0, 1];
        let ag_x = lumap2ag_l_mrj(&lumap, &lmmap, 3).mapv(|x| f64::from(u8::from(x)));
        let non_ag_x = lumap2non_ag_l_rk(&lumap, 2, 100).mapv(|x| f64::from(u8::from(x)));

        let decoded = decode(&ag_x, &non_ag_x, &IndexMap::new(), &options());
        assert_eq!(decoded.lumap, lumap);
        assert_eq!(decoded.lmmap, lmmap);
        assert_eq!(decoded.ag_x_mrj, ag_x);
        assert_eq!(decoded.non_ag_x_rk, non_ag_x);
    }

    #[test]
    fn fractional_cells_pick_the_largest_share() {
        // One cell split 0.3 dry A, 0.45 irrigated B, 0.25 non-ag
        let mut ag_x = Array3::zeros((2, 1, 2));
        ag_x[[0, 0, 0]] = 0.3;
        ag_x[[1, 0, 1]] = 0.45;
        let non_ag_x = array![[0.25]];

        let decoded = decode(&ag_x, &non_ag_x, &IndexMap::new(), &options());
        assert_eq!(decoded.lumap[0], 1);
        assert_eq!(decoded.lmmap[0], 1);
        assert_eq!(decoded.non_ag_x_rk[[0, 0]], 0.0);
        assert_eq!(decoded.ag_x_mrj[[0, 0, 0]], 0.3);
    }

    #[test]
    fn ties_stay_agricultural() {
        let mut ag_x = Array3::zeros((2, 2, 1));
        ag_x[[0, 0, 0]] = 0.5;
        ag_x[[0, 1, 0]] = 0.5;
        let non_ag_x = array![[0.5], [0.5000001]];

        let decoded = decode(&ag_x, &non_ag_x, &IndexMap::new(), &options());
        assert_eq!(decoded.lumap, array![0, 100]);
        assert_eq!(decoded.ag_x_mrj[[0, 1, 0]], 0.0);

        let tolerant = DecodeOptions {
            tie_tolerance: 1e-3,
            ..options()
        };
        let decoded = decode(&ag_x, &non_ag_x, &IndexMap::new(), &tolerant);
        assert_eq!(decoded.lumap, array![0, 0]);
    }

    #[test]
    fn inputs_are_not_modified() {
        let mut ag_x = Array3::zeros((2, 1, 1));
        ag_x[[0, 0, 0]] = 0.2;
        let non_ag_x = array![[0.8]];
        let ag_before = ag_x.clone();

        let decoded = decode(&ag_x, &non_ag_x, &IndexMap::new(), &options());
        assert_eq!(decoded.lumap[0], 100);
        assert_eq!(decoded.ag_x_mrj[[0, 0, 0]], 0.0);
        assert_eq!(ag_x, ag_before);
    }

    #[test]
    fn ammaps_follow_the_selected_use() {
        // Cell 0 dry A, cell 1 irrigated B, cell 2 non-ag
        let lumap = array![0, 1, 100];
        let lmmap = array![0, 1, 0];
        let ag_x = lumap2ag_l_mrj(&lumap, &lmmap, 2).mapv(|x| f64::from(u8::from(x)));
        let non_ag_x = lumap2non_ag_l_rk(&lumap, 1, 100).mapv(|x| f64::from(u8::from(x)));

        let mut am_x = Array3::zeros((2, 3, 2));
        am_x[[0, 0, 0]] = 0.5;
        // Below the threshold
        am_x[[1, 1, 1]] = 0.05;
        // On a use the cell does not hold
        am_x[[0, 1, 1]] = 1.0;
        let mut ag_man = IndexMap::new();
        ag_man.insert("Precision Agriculture".to_string(), am_x);

        let decoded = decode(&ag_x, &non_ag_x, &ag_man, &options());
        assert_eq!(decoded.ammaps["Precision Agriculture"], array![1, 0, 0]);
    }
}
