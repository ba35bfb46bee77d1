//! # Delay discretization & delay index
//!
//! This module turns the continuous inter-detector delays of every sky sample into an
//! **O(1) lookup structure** keyed by discretized delays:
//!
//! 1. [`discretize`](crate::delay_index::discretize) maps a delay in seconds to an integer
//!    number of sampling periods (round to nearest, ties to even).
//! 2. [`DelayIndex`](crate::delay_index::DelayIndex) buckets the sample indices by their
//!    delay key (sample order kept inside each bucket), records the elementwise
//!    **delay range** of the keys, and lays out two dense arrays over that range:
//!    - the **sky prior** `f_s^(n_det−1) · |bucket| / nsky` (zero for empty bins),
//!    - the bucket handle of each bin, from which round-robin draws are served.
//! 3. [`SampleCursors`](crate::delay_index::SampleCursors) holds one cursor per bucket.
//!
//! ## Query semantics
//!
//! ```text
//! delay column ──► in [min, max]? ──no──► unphysical
//!                        │yes
//!                        ▼
//!                 sky_prior > 0 ? ──no──► unphysical
//!                        │yes
//!                        ▼
//!             next sample of the bucket (round robin)
//! ```
//!
//! The delay range is **empirical**: it only covers keys realized by the samples, and a
//! key inside the range that no sample realizes has zero density. Both cases are reported
//! through the physical mask, never as errors.

pub mod cursors;
pub mod grid;

use nalgebra::DMatrix;
use tracing::debug;

use crate::constants::{DelayKey, Hertz, Second};
use crate::skymarg_errors::SkyMargError;
pub use cursors::SampleCursors;
pub use grid::DelayGrid;

/// Sentinel of the dense bucket array for bins without samples.
const EMPTY_BIN: u32 = u32::MAX;

/// Delay in seconds → integer number of periods of `f_sampling`.
#[inline]
pub fn discretize(delay: Second, f_sampling: Hertz) -> i64 {
    (delay * f_sampling as f64).round_ties_even() as i64
}

/// Elementwise [`discretize`] of a delay matrix.
pub fn discretize_matrix(delays: &DMatrix<Second>, f_sampling: Hertz) -> DMatrix<i64> {
    delays.map(|delay| discretize(delay, f_sampling))
}

/// Result of a batch of sky lookups.
///
/// `sky_inds` and `sky_prior` only contain the physical queries, in query order;
/// their length is the number of `true` entries of `physical_mask`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkyLookup {
    /// Index of a sky sample realizing each physical delay vector.
    pub sky_inds: Vec<usize>,
    /// Prior density of each physical delay vector, s^−(n_det−1).
    pub sky_prior: Vec<f64>,
    /// One flag per query column.
    pub physical_mask: Vec<bool>,
}

impl SkyLookup {
    /// Number of physical queries.
    pub fn n_physical(&self) -> usize {
        self.sky_inds.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bucket {
    cell: usize,
    start: usize,
    len: usize,
}

/// Sample indices bucketed by discretized delays, with dense lookup arrays over the
/// observed delay range.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayIndex {
    f_sampling: Hertz,
    nsky: usize,
    grid: DelayGrid,
    /// Dense prior density, one entry per grid cell.
    sky_prior: Vec<f64>,
    /// Dense bucket handle, one entry per grid cell.
    cell_bucket: Vec<u32>,
    /// Populated buckets, in grid order.
    buckets: Vec<Bucket>,
    /// Sample indices grouped by bucket, sample order inside each bucket.
    members: Vec<usize>,
}

impl DelayIndex {
    /// Build the index from the discretized delays of every sample.
    ///
    /// Arguments
    /// -----------------
    /// * `discrete_delays`: `(n_det − 1) × nsky` matrix; column `i` is the delay key of
    ///   sample `i`.
    /// * `f_sampling`: resolution used to discretize the delays, Hz.
    ///
    /// Errors
    /// ----------
    /// * [`SkyMargError::InvalidConfig`] if there are no samples, or more populated bins
    ///   than the bucket handle can address.
    pub fn new(discrete_delays: &DMatrix<i64>, f_sampling: Hertz) -> Result<Self, SkyMargError> {
        let ndim = discrete_delays.nrows();
        let nsky = discrete_delays.ncols();

        let grid = DelayGrid::spanning(
            ndim,
            discrete_delays
                .column_iter()
                .map(|col| col.iter().copied().collect::<DelayKey>()),
        )
        .ok_or_else(|| {
            SkyMargError::InvalidConfig(
                "no sky samples, or their delays span too many bins to index".into(),
            )
        })?;

        // Counting sort of the samples by cell: stable, so bucket order is sample order.
        let cells = discrete_delays
            .column_iter()
            .map(|col| {
                grid.offset_of(col.iter().copied()).ok_or_else(|| {
                    SkyMargError::InvalidConfig("sample delay key outside its own range".into())
                })
            })
            .collect::<Result<Vec<usize>, _>>()?;

        let mut counts = vec![0usize; grid.len()];
        for &cell in &cells {
            counts[cell] += 1;
        }

        let n_populated = counts.iter().filter(|&&c| c > 0).count();
        if n_populated >= EMPTY_BIN as usize {
            return Err(SkyMargError::InvalidConfig(format!(
                "{n_populated} populated delay bins exceed the index capacity"
            )));
        }

        let mut cell_bucket = vec![EMPTY_BIN; grid.len()];
        let mut buckets = Vec::with_capacity(n_populated);
        let mut start = 0;
        for (cell, &count) in counts.iter().enumerate() {
            if count > 0 {
                cell_bucket[cell] = buckets.len() as u32;
                buckets.push(Bucket {
                    cell,
                    start,
                    len: count,
                });
                start += count;
            }
        }

        let mut fill: Vec<usize> = buckets.iter().map(|b| b.start).collect();
        let mut members = vec![0usize; nsky];
        for (sample, &cell) in cells.iter().enumerate() {
            let bucket = cell_bucket[cell] as usize;
            members[fill[bucket]] = sample;
            fill[bucket] += 1;
        }

        let density_scale = (f_sampling as f64).powi(ndim as i32) / nsky as f64;
        let sky_prior = counts
            .iter()
            .map(|&count| density_scale * count as f64)
            .collect();

        debug!(
            nsky,
            ndim,
            n_bins = grid.len(),
            n_populated,
            min = ?grid.min(),
            max = ?grid.max(),
            "built delay index"
        );

        Ok(DelayIndex {
            f_sampling,
            nsky,
            grid,
            sky_prior,
            cell_bucket,
            buckets,
            members,
        })
    }

    pub fn f_sampling(&self) -> Hertz {
        self.f_sampling
    }

    pub fn nsky(&self) -> usize {
        self.nsky
    }

    /// Dimension of the delay keys, `n_det − 1`.
    pub fn ndim(&self) -> usize {
        self.grid.ndim()
    }

    pub fn grid(&self) -> &DelayGrid {
        &self.grid
    }

    /// Elementwise `(min, max)` of the realized delay keys.
    pub fn delay_range(&self) -> (&[i64], &[i64]) {
        (self.grid.min(), self.grid.max())
    }

    /// Dense prior density over the grid, row-major.
    pub fn dense_prior(&self) -> &[f64] {
        &self.sky_prior
    }

    /// Prior density of a delay key; zero outside the delay range or for empty bins.
    pub fn sky_prior_at(&self, key: &[i64]) -> f64 {
        self.grid
            .offset(key)
            .map_or(0.0, |cell| self.sky_prior[cell])
    }

    /// Number of populated bins.
    pub fn n_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Sample indices sharing `key`, in sample order.
    pub fn bucket(&self, key: &[i64]) -> Option<&[usize]> {
        let cell = self.grid.offset(key)?;
        match self.cell_bucket[cell] {
            EMPTY_BIN => None,
            b => Some(self.members_of(b as usize)),
        }
    }

    /// Every populated `(key, samples)` pair, in grid order.
    pub fn buckets(&self) -> impl Iterator<Item = (DelayKey, &[usize])> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .map(|(b, bucket)| (self.grid.key_at(bucket.cell), self.members_of(b)))
    }

    /// Fresh round-robin cursors for this index.
    pub fn new_cursors(&self) -> SampleCursors {
        SampleCursors::new(self.buckets.iter().map(|b| b.len).collect())
    }

    #[inline]
    fn members_of(&self, bucket: usize) -> &[usize] {
        let Bucket { start, len, .. } = self.buckets[bucket];
        &self.members[start..start + len]
    }

    /// Map query delay vectors to sky samples and prior densities.
    ///
    /// Arguments
    /// -----------------
    /// * `cursors`: round-robin state, from [`new_cursors`](DelayIndex::new_cursors) of
    ///   this index.
    /// * `delays`: `(n_det − 1) × n_queries` discretized delays; one query per column.
    ///
    /// Return
    /// ----------
    /// * A [`SkyLookup`]; see the module documentation for the filtering rules.
    ///
    /// Errors
    /// ----------
    /// * [`SkyMargError::DelayShapeMismatch`] if `delays` does not have `n_det − 1` rows.
    /// * [`SkyMargError::InvalidConfig`] if `cursors` were not created for buckets of the
    ///   sizes of this index.
    pub fn lookup(
        &self,
        cursors: &mut SampleCursors,
        delays: &DMatrix<i64>,
    ) -> Result<SkyLookup, SkyMargError> {
        if delays.nrows() != self.ndim() {
            return Err(SkyMargError::DelayShapeMismatch {
                expected: self.ndim(),
                got: delays.nrows(),
            });
        }
        if !cursors.tracks(self.buckets.iter().map(|b| b.len)) {
            return Err(SkyMargError::InvalidConfig(format!(
                "cursor state tracks {} buckets that do not match the {} buckets of this index",
                cursors.len(),
                self.buckets.len()
            )));
        }

        let n_queries = delays.ncols();
        let mut lookup = SkyLookup {
            sky_inds: Vec::with_capacity(n_queries),
            sky_prior: Vec::with_capacity(n_queries),
            physical_mask: Vec::with_capacity(n_queries),
        };

        for column in delays.column_iter() {
            let physical = self
                .grid
                .offset_of(column.iter().copied())
                .filter(|&cell| self.sky_prior[cell] > 0.0);

            match physical {
                Some(cell) => {
                    let bucket = self.cell_bucket[cell] as usize;
                    let sample = cursors
                        .next_sample(bucket, self.members_of(bucket))
                        .ok_or_else(|| {
                            SkyMargError::InvalidConfig(format!(
                                "cursor of bucket {bucket} lies outside the bucket"
                            ))
                        })?;
                    lookup.sky_inds.push(sample);
                    lookup.sky_prior.push(self.sky_prior[cell]);
                    lookup.physical_mask.push(true);
                }
                None => lookup.physical_mask.push(false),
            }
        }

        Ok(lookup)
    }
}

#[cfg(test)]
mod delay_index_test {
    use approx::assert_relative_eq;

    use super::*;

    /// Six samples with 2-D keys; the bin (0, 1) is inside the range but empty.
    fn toy_index() -> DelayIndex {
        let delays = DMatrix::from_column_slice(
            2,
            6,
            &[
                0, 0, //
                1, 1, //
                0, 0, //
                -1, 2, //
                1, 1, //
                0, 0, //
            ],
        );
        DelayIndex::new(&delays, 10).unwrap()
    }

    #[test]
    fn test_discretize_rounds_to_nearest() {
        assert_eq!(discretize(0.0, 4096), 0);
        assert_eq!(discretize(1.2 / 4096.0, 4096), 1);
        assert_eq!(discretize(-1.6 / 4096.0, 4096), -2);
        assert_eq!(discretize(2.5 / 8.0, 8), 2);
        assert_eq!(discretize(-0.5 / 8.0, 8), 0);
        assert_eq!(discretize(0.01, 4096), 41);
    }

    #[test]
    fn test_buckets_keep_sample_order() {
        let index = toy_index();
        assert_eq!(index.n_buckets(), 3);
        assert_eq!(index.bucket(&[0, 0]), Some(&[0, 2, 5][..]));
        assert_eq!(index.bucket(&[1, 1]), Some(&[1, 4][..]));
        assert_eq!(index.bucket(&[-1, 2]), Some(&[3][..]));
        assert_eq!(index.bucket(&[0, 1]), None);
        assert_eq!(index.bucket(&[5, 5]), None);
    }

    #[test]
    fn test_delay_range_and_dense_prior() {
        let index = toy_index();
        assert_eq!(index.delay_range(), (&[-1, 0][..], &[1, 2][..]));
        assert_eq!(index.grid().len(), 9);
        assert_relative_eq!(index.sky_prior_at(&[0, 0]), 100.0 * 3.0 / 6.0);
        assert_relative_eq!(index.sky_prior_at(&[1, 1]), 100.0 * 2.0 / 6.0);
        assert_eq!(index.sky_prior_at(&[0, 1]), 0.0);
        assert_eq!(index.sky_prior_at(&[9, 9]), 0.0);

        let total: f64 = index.dense_prior().iter().sum::<f64>() / 100.0;
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lookup_filters_and_cycles() {
        let index = toy_index();
        let mut cursors = index.new_cursors();
        let queries = DMatrix::from_column_slice(
            2,
            7,
            &[
                0, 0, // bucket [0, 2, 5]
                2, 0, // out of range
                0, 1, // in range, empty
                0, 0, //
                1, 1, // bucket [1, 4]
                0, 0, //
                0, 0, // wraps
            ],
        );

        let lookup = index.lookup(&mut cursors, &queries).unwrap();
        assert_eq!(
            lookup.physical_mask,
            vec![true, false, false, true, true, true, true]
        );
        assert_eq!(lookup.sky_inds, vec![0, 2, 1, 5, 0]);
        assert_eq!(lookup.n_physical(), 5);
        assert_relative_eq!(lookup.sky_prior[2], 100.0 * 2.0 / 6.0);
    }

    #[test]
    fn test_lookup_shape_mismatch() {
        let index = toy_index();
        let mut cursors = index.new_cursors();
        let queries = DMatrix::<i64>::zeros(3, 2);
        assert_eq!(
            index.lookup(&mut cursors, &queries),
            Err(SkyMargError::DelayShapeMismatch {
                expected: 2,
                got: 3
            })
        );
    }

    #[test]
    fn test_lookup_rejects_foreign_cursors() {
        let index = toy_index();
        let queries = DMatrix::<i64>::zeros(2, 1);
        for sizes in [vec![1], vec![3, 2, 2], vec![1, 3, 2]] {
            let mut cursors = SampleCursors::new(sizes);
            assert!(matches!(
                index.lookup(&mut cursors, &queries),
                Err(SkyMargError::InvalidConfig(_))
            ));
        }

        // same bucket sizes, in grid order
        let mut cursors = SampleCursors::new(vec![1, 3, 2]);
        assert!(cursors.tracks([1, 3, 2]));
        let mut own = index.new_cursors();
        assert_eq!(own.bucket_sizes(), &[1, 3, 2]);
        assert_eq!(
            index.lookup(&mut cursors, &queries),
            index.lookup(&mut own, &queries)
        );
    }

    #[test]
    fn test_empty_query_batch() {
        let index = toy_index();
        let mut cursors = index.new_cursors();
        let lookup = index
            .lookup(&mut cursors, &DMatrix::<i64>::zeros(2, 0))
            .unwrap();
        assert_eq!(lookup, SkyLookup::default());
    }

    #[test]
    fn test_zero_dimensional_index() {
        let index = DelayIndex::new(&DMatrix::<i64>::zeros(0, 4), 4096).unwrap();
        assert_eq!(index.n_buckets(), 1);
        assert_eq!(index.bucket(&[]), Some(&[0, 1, 2, 3][..]));
        assert_relative_eq!(index.sky_prior_at(&[]), 1.0);

        let mut cursors = index.new_cursors();
        let lookup = index
            .lookup(&mut cursors, &DMatrix::<i64>::zeros(0, 3))
            .unwrap();
        assert_eq!(lookup.physical_mask, vec![true; 3]);
        assert_eq!(lookup.sky_inds, vec![0, 1, 2]);
    }

    #[test]
    fn test_no_samples_is_an_error() {
        assert!(DelayIndex::new(&DMatrix::<i64>::zeros(1, 0), 4096).is_err());
    }
}
