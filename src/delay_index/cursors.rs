//! Round-robin cursors over the buckets of a [`DelayIndex`](super::DelayIndex).
//!
//! The cursors are the only mutable state of a sky dictionary. They live apart from
//! the (immutable, shareable) index so that each worker can own its own shard.
//!
//! A cursor set records the size of every bucket it was created for. The index refuses
//! cursor sets whose sizes do not match its own buckets, and deserialization refuses
//! positions that do not fall inside their bucket.

use serde::{Deserialize, Serialize};

use crate::skymarg_errors::SkyMargError;

/// One explicit cursor per populated bucket.
///
/// `positions[b]` is the position, inside bucket `b`, of the sample handed out by the
/// next draw. Draws return `bucket[position]` and then advance the position modulo
/// the bucket size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSampleCursors")]
pub struct SampleCursors {
    positions: Vec<usize>,
    bucket_sizes: Vec<usize>,
}

#[derive(Deserialize)]
struct RawSampleCursors {
    positions: Vec<usize>,
    bucket_sizes: Vec<usize>,
}

impl TryFrom<RawSampleCursors> for SampleCursors {
    type Error = SkyMargError;

    fn try_from(raw: RawSampleCursors) -> Result<Self, Self::Error> {
        if raw.positions.len() != raw.bucket_sizes.len() {
            return Err(SkyMargError::InvalidConfig(format!(
                "{} cursor positions for {} buckets",
                raw.positions.len(),
                raw.bucket_sizes.len()
            )));
        }
        if let Some(b) = raw
            .positions
            .iter()
            .zip(&raw.bucket_sizes)
            .position(|(&pos, &size)| pos >= size)
        {
            return Err(SkyMargError::InvalidConfig(format!(
                "cursor position {} outside bucket {b} of size {}",
                raw.positions[b], raw.bucket_sizes[b]
            )));
        }
        Ok(SampleCursors {
            positions: raw.positions,
            bucket_sizes: raw.bucket_sizes,
        })
    }
}

impl SampleCursors {
    /// Fresh cursors (all at the first bucket member) for buckets of the given sizes.
    pub(crate) fn new(bucket_sizes: Vec<usize>) -> Self {
        SampleCursors {
            positions: vec![0; bucket_sizes.len()],
            bucket_sizes,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sizes of the buckets these cursors were created for.
    pub fn bucket_sizes(&self) -> &[usize] {
        &self.bucket_sizes
    }

    /// `true` if these cursors were created for buckets of exactly these sizes.
    pub(crate) fn tracks<I>(&self, sizes: I) -> bool
    where
        I: IntoIterator<Item = usize>,
    {
        sizes.into_iter().eq(self.bucket_sizes.iter().copied())
    }

    /// Rewind every cursor to the first member of its bucket.
    pub fn reset(&mut self) {
        self.positions.fill(0);
    }

    /// Hand out the next member of `members` (bucket `bucket`) and advance.
    ///
    /// Return
    /// ----------
    /// * `None` if `bucket` has no cursor or its position falls outside `members`.
    #[inline]
    pub(crate) fn next_sample(&mut self, bucket: usize, members: &[usize]) -> Option<usize> {
        let position = self.positions.get_mut(bucket)?;
        let sample = *members.get(*position)?;
        *position = (*position + 1) % members.len();
        Some(sample)
    }
}
