//! Flat row-major addressing of a rectangular block of integer delay keys.
//!
//! A [`DelayGrid`] covers every key `k` with `min[d] <= k[d] <= max[d]` in each
//! dimension `d`. Keys are mapped to a linear offset (last dimension fastest) so that
//! dense per-bin arrays can be stored in a plain `Vec` and read in O(1) without hashing.
//!
//! A zero-dimensional grid (single-detector network) has exactly one cell, addressed by
//! the empty key.

use serde::{Deserialize, Serialize};

use crate::constants::DelayKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayGrid {
    min: Vec<i64>,
    max: Vec<i64>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl DelayGrid {
    /// Grid covering `[min, max]` elementwise (both inclusive).
    ///
    /// Return
    /// ----------
    /// * `None` if `min` and `max` differ in length, if `min[d] > max[d]` in some
    ///   dimension, or if the number of cells overflows `usize`.
    pub fn from_bounds(min: Vec<i64>, max: Vec<i64>) -> Option<Self> {
        if min.len() != max.len() {
            return None;
        }

        let shape = min
            .iter()
            .zip(&max)
            .map(|(lo, hi)| {
                let span = usize::try_from(hi.checked_sub(*lo)?).ok()?;
                span.checked_add(1)
            })
            .collect::<Option<Vec<usize>>>()?;

        let mut strides = vec![1usize; shape.len()];
        for d in (0..shape.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1].checked_mul(shape[d + 1])?;
        }
        if let Some(&outer) = shape.first() {
            strides[0].checked_mul(outer)?;
        }

        Some(DelayGrid {
            min,
            max,
            shape,
            strides,
        })
    }

    /// Smallest grid containing every key produced by `keys`.
    ///
    /// Return
    /// ----------
    /// * `None` if `keys` is empty or the spanned block is too large to address.
    pub fn spanning<I, K>(ndim: usize, keys: I) -> Option<Self>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[i64]>,
    {
        let mut keys = keys.into_iter();
        let first = keys.next()?;
        let mut min = first.as_ref().to_vec();
        let mut max = min.clone();
        debug_assert_eq!(min.len(), ndim);

        for key in keys {
            for (d, &v) in key.as_ref().iter().enumerate() {
                min[d] = min[d].min(v);
                max[d] = max[d].max(v);
            }
        }
        DelayGrid::from_bounds(min, max)
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn min(&self) -> &[i64] {
        &self.min
    }

    pub fn max(&self) -> &[i64] {
        &self.max
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// Always `false`: every grid holds at least one cell.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear offset of a key given as an iterator of its components.
    ///
    /// Return
    /// ----------
    /// * `None` if any component falls outside `[min, max]`, or if the number of
    ///   components differs from [`ndim`](DelayGrid::ndim).
    #[inline]
    pub fn offset_of<I>(&self, key: I) -> Option<usize>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut offset = 0;
        let mut n = 0;
        for (d, v) in key.into_iter().enumerate() {
            if d >= self.ndim() || v < self.min[d] || v > self.max[d] {
                return None;
            }
            offset += (v - self.min[d]) as usize * self.strides[d];
            n += 1;
        }
        (n == self.ndim()).then_some(offset)
    }

    #[inline]
    pub fn offset(&self, key: &[i64]) -> Option<usize> {
        self.offset_of(key.iter().copied())
    }

    pub fn contains(&self, key: &[i64]) -> bool {
        self.offset(key).is_some()
    }

    /// Inverse of [`offset`](DelayGrid::offset).
    pub fn key_at(&self, offset: usize) -> DelayKey {
        debug_assert!(offset < self.len());
        self.min
            .iter()
            .zip(&self.shape)
            .zip(&self.strides)
            .map(|((lo, n), stride)| lo + ((offset / stride) % n) as i64)
            .collect()
    }
}

#[cfg(test)]
mod grid_test {
    use super::*;

    #[test]
    fn test_offsets_are_row_major() {
        let grid = DelayGrid::from_bounds(vec![-1, 3], vec![1, 6]).unwrap();
        assert_eq!(grid.shape(), &[3, 4]);
        assert_eq!(grid.len(), 12);
        assert_eq!(grid.offset(&[-1, 3]), Some(0));
        assert_eq!(grid.offset(&[-1, 4]), Some(1));
        assert_eq!(grid.offset(&[0, 3]), Some(4));
        assert_eq!(grid.offset(&[1, 6]), Some(11));
    }

    #[test]
    fn test_out_of_range() {
        let grid = DelayGrid::from_bounds(vec![-2, 0], vec![2, 1]).unwrap();
        assert_eq!(grid.offset(&[-3, 0]), None);
        assert_eq!(grid.offset(&[0, 2]), None);
        assert_eq!(grid.offset(&[0]), None);
        assert_eq!(grid.offset(&[0, 0, 0]), None);
        assert!(grid.contains(&[2, 1]));
    }

    #[test]
    fn test_key_at_inverts_offset() {
        let grid = DelayGrid::from_bounds(vec![-4, -1, 7], vec![-2, 2, 9]).unwrap();
        for offset in 0..grid.len() {
            let key = grid.key_at(offset);
            assert_eq!(grid.offset(&key), Some(offset));
        }
    }

    #[test]
    fn test_invalid_bounds() {
        assert_eq!(DelayGrid::from_bounds(vec![2], vec![1]), None);
        assert_eq!(DelayGrid::from_bounds(vec![0, 0], vec![1]), None);
        assert_eq!(DelayGrid::from_bounds(vec![i64::MIN], vec![i64::MAX]), None);
        assert_eq!(
            DelayGrid::from_bounds(vec![0, 0, 0], vec![1 << 30, 1 << 30, 1 << 30]),
            None
        );
        assert!(DelayGrid::from_bounds(vec![5], vec![5]).is_some());
    }

    #[test]
    fn test_spanning() {
        let keys = vec![vec![0, 5], vec![-3, 2], vec![1, 4]];
        let grid = DelayGrid::spanning(2, &keys).unwrap();
        assert_eq!(grid.min(), &[-3, 2]);
        assert_eq!(grid.max(), &[1, 5]);
        assert!(DelayGrid::spanning(2, Vec::<Vec<i64>>::new()).is_none());
    }

    #[test]
    fn test_zero_dimensional_grid() {
        let grid = DelayGrid::from_bounds(vec![], vec![]).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.offset(&[]), Some(0));
        assert_eq!(grid.key_at(0), Vec::<i64>::new());
    }
}
