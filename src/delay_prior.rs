//! # Conditional delay priors
//!
//! Histograms of discretized arrival-time delays for **every ordered subset** of two or
//! more detectors of a network. They support a semi-coherent prior on the time of arrival,
//! built one detector at a time: given the arrival time at the first detector of an
//! ordering, the histogram gives the relative probability of each arrival-time delay at the
//! following detectors.
//!
//! ## Construction
//!
//! For `k = 2 ..= n_det` and every ordered `k`-permutation `order` of the detector indices:
//!
//! ```text
//! key_i = round( f_s · (t_geo[order[1..], i] − t_geo[order[0], i]) )          (k − 1 ints)
//! w_i   = ( Σ_{d ∈ order} F+(i, d)² + F×(i, d)² )^{3/2}                     (norm cubed)
//! H[key] = Σ_{i : key_i = key} w_i
//! ```
//!
//! Bins have unit width with edges at half-integers, `[min − ½, max + ½]` per dimension, so
//! that each integer delay sits at the center of its bin.
//!
//! For pairs (`k = 2`), the observed `(min, max)` discretized delay is also recorded; it
//! bounds the delays a single-detector prior may propose.

use std::collections::BTreeMap;

use itertools::Itertools;
use nalgebra::DMatrix;
use tracing::debug;

use crate::constants::{DelayKey, Hertz, Second};
use crate::delay_index::{discretize, DelayGrid};

/// Ordered tuple of detector indices (positions in the network).
pub type DetectorOrder = Vec<usize>;

/// Weighted histogram of discretized delays over a [`DelayGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct DelayHistogram {
    grid: DelayGrid,
    weights: Vec<f64>,
}

impl DelayHistogram {
    /// Accumulate `weights[i]` into the bin of `keys[i]`.
    ///
    /// Return
    /// ----------
    /// * `None` if `keys` is empty.
    pub fn from_weighted_keys(ndim: usize, keys: &[DelayKey], weights: &[f64]) -> Option<Self> {
        debug_assert_eq!(keys.len(), weights.len());
        let grid = DelayGrid::spanning(ndim, keys)?;

        let mut hist = vec![0.0; grid.len()];
        for (key, w) in keys.iter().zip(weights) {
            if let Some(cell) = grid.offset(key) {
                hist[cell] += w;
            }
        }

        Some(DelayHistogram {
            grid,
            weights: hist,
        })
    }

    pub fn grid(&self) -> &DelayGrid {
        &self.grid
    }

    pub fn shape(&self) -> &[usize] {
        self.grid.shape()
    }

    /// Bin contents, row-major over [`grid`](DelayHistogram::grid).
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Bin edges per dimension: `min − ½, min + ½, …, max + ½`.
    pub fn edges(&self) -> Vec<Vec<f64>> {
        self.grid
            .min()
            .iter()
            .zip(self.grid.max())
            .map(|(&lo, &hi)| (lo..=hi + 1).map(|v| v as f64 - 0.5).collect())
            .collect()
    }

    /// Content of the bin centered on `key`; zero outside the histogram.
    pub fn weight(&self, key: &[i64]) -> f64 {
        self.grid.offset(key).map_or(0.0, |cell| self.weights[cell])
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Conditional delay priors for every ordering of 2+ detectors, and pairwise delay bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DelayPriorTable {
    priors: BTreeMap<DetectorOrder, DelayHistogram>,
    bounds: BTreeMap<(usize, usize), (i64, i64)>,
}

impl DelayPriorTable {
    /// Build the table from per-sample geometry.
    ///
    /// Arguments
    /// -----------------
    /// * `geocenter_delays`: `n_det × nsky` geocenter delays, seconds.
    /// * `fplus_fcross_0`: `nsky × (2·n_det)` antenna coefficients at ψ = 0.
    /// * `f_sampling`: delay resolution, Hz.
    ///
    /// Return
    /// ----------
    /// * The table; empty for a single-detector network.
    pub fn new(
        geocenter_delays: &DMatrix<Second>,
        fplus_fcross_0: &DMatrix<f64>,
        f_sampling: Hertz,
    ) -> Self {
        let n_det = geocenter_delays.nrows();
        let nsky = geocenter_delays.ncols();
        debug_assert_eq!(fplus_fcross_0.shape(), (nsky, 2 * n_det));

        // |F|² per detector and sample
        let response_sq = DMatrix::from_fn(n_det, nsky, |d, i| {
            fplus_fcross_0[(i, 2 * d)].powi(2) + fplus_fcross_0[(i, 2 * d + 1)].powi(2)
        });

        let mut table = DelayPriorTable::default();
        for n_detectors in 2..=n_det {
            for order in (0..n_det).permutations(n_detectors) {
                let keys: Vec<DelayKey> = (0..nsky)
                    .map(|i| {
                        let t_first = geocenter_delays[(order[0], i)];
                        order[1..]
                            .iter()
                            .map(|&d| discretize(geocenter_delays[(d, i)] - t_first, f_sampling))
                            .collect()
                    })
                    .collect();

                let weights: Vec<f64> = (0..nsky)
                    .map(|i| {
                        let norm_sq: f64 = order.iter().map(|&d| response_sq[(d, i)]).sum();
                        norm_sq.powf(1.5)
                    })
                    .collect();

                let Some(histogram) =
                    DelayHistogram::from_weighted_keys(n_detectors - 1, &keys, &weights)
                else {
                    continue;
                };

                if n_detectors == 2 {
                    let grid = histogram.grid();
                    table
                        .bounds
                        .insert((order[0], order[1]), (grid.min()[0], grid.max()[0]));
                }
                table.priors.insert(order, histogram);
            }
        }

        debug!(
            n_det,
            n_orders = table.priors.len(),
            "built conditional delay priors"
        );
        table
    }

    /// Histogram for an ordering of detector indices.
    pub fn delays_prior(&self, order: &[usize]) -> Option<&DelayHistogram> {
        self.priors.get(order)
    }

    /// Observed `(min, max)` discretized delay from `pair.0` to `pair.1`.
    pub fn delays_bounds(&self, pair: (usize, usize)) -> Option<(i64, i64)> {
        self.bounds.get(&pair).copied()
    }

    /// All orderings, lexicographic.
    pub fn orders(&self) -> impl Iterator<Item = &DetectorOrder> {
        self.priors.keys()
    }

    pub fn len(&self) -> usize {
        self.priors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }
}
