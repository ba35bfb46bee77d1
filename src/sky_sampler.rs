//! # Quasi-random sky sampler
//!
//! Deterministic, isotropic population of sky locations in Earth-fixed coordinates,
//! drawn from a two-dimensional **scrambled Halton sequence** (bases 2 and 3).
//!
//! ## Transform
//!
//! ```text
//! (u₁, u₂) ∈ [0, 1)²   ──►   lat = asin(2·u₁ − 1),   lon = 2π·u₂
//! ```
//!
//! `lat` is uniform in `sin(lat)`, so equal areas of the sphere receive equal numbers
//! of samples.
//!
//! ## Scrambling
//!
//! Every base and every digit position get an independent random permutation of the
//! digits `0..base`, drawn from a [`StdRng`](rand::rngs::StdRng) seeded with the user
//! seed. The radical inverse is evaluated with permuted digits over a fixed number of
//! digit positions (enough to exhaust `f64` precision), so the permutation of the
//! digit `0` also shifts the sequence away from the origin.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::constants::{Radian, DPI};

/// Bases of the two Halton coordinates.
const HALTON_BASES: [u32; 2] = [2, 3];

/// A digit-permuted (scrambled) Halton sequence.
#[derive(Debug, Clone)]
pub struct ScrambledHalton {
    bases: Vec<u32>,
    /// `permutations[axis][digit_position][digit]`
    permutations: Vec<Vec<Vec<u32>>>,
}

impl ScrambledHalton {
    /// Build the sequence for the given bases, scrambled from `seed`.
    ///
    /// Arguments
    /// -----------------
    /// * `bases`: one (prime) base per dimension.
    /// * `seed`: seed of the digit permutations.
    pub fn new(bases: &[u32], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let permutations = bases
            .iter()
            .map(|&base| {
                (0..n_digits(base))
                    .map(|_| {
                        let mut perm: Vec<u32> = (0..base).collect();
                        perm.shuffle(&mut rng);
                        perm
                    })
                    .collect()
            })
            .collect();

        ScrambledHalton {
            bases: bases.to_vec(),
            permutations,
        }
    }

    pub fn dimension(&self) -> usize {
        self.bases.len()
    }

    /// The `index`-th point of the sequence, one coordinate per base, each in `[0, 1)`.
    pub fn point(&self, index: u64) -> Vec<f64> {
        self.bases
            .iter()
            .zip(&self.permutations)
            .map(|(&base, perms)| scrambled_radical_inverse(index, base, perms))
            .collect()
    }
}

/// Number of digit positions needed to resolve a `f64` mantissa in `base`.
fn n_digits(base: u32) -> usize {
    (f64::MANTISSA_DIGITS as f64 / (base as f64).log2()).ceil() as usize
}

fn scrambled_radical_inverse(index: u64, base: u32, permutations: &[Vec<u32>]) -> f64 {
    let b = base as u64;
    let inv_base = 1.0 / base as f64;

    let mut n = index;
    let mut scale = inv_base;
    let mut value = 0.0;
    for perm in permutations {
        let digit = (n % b) as usize;
        value += perm[digit] as f64 * scale;
        n /= b;
        scale *= inv_base;
    }
    value
}

/// Isotropic sky samples in Earth-fixed coordinates, radians.
///
/// `lat[i]`, `lon[i]` describe sample `i`; both vectors always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkySamples {
    /// Latitude in `[-π/2, π/2]`.
    pub lat: Vec<Radian>,
    /// Longitude in `[0, 2π)`.
    pub lon: Vec<Radian>,
}

impl SkySamples {
    /// Draw `nsky` samples from a scrambled Halton sequence seeded with `seed`.
    ///
    /// The result is bit-reproducible for a given `(nsky, seed)`, and the first `n`
    /// samples of a larger draw equal a draw of size `n` with the same seed.
    pub fn halton(nsky: usize, seed: u64) -> Self {
        let sequence = ScrambledHalton::new(&HALTON_BASES, seed);

        let (lat, lon): (Vec<Radian>, Vec<Radian>) = (0..nsky as u64)
            .map(|i| {
                let u = sequence.point(i);
                ((2.0 * u[0] - 1.0).asin(), DPI * u[1])
            })
            .unzip();

        SkySamples { lat, lon }
    }

    pub fn len(&self) -> usize {
        self.lat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Radian, Radian)> + '_ {
        self.lat.iter().copied().zip(self.lon.iter().copied())
    }
}
