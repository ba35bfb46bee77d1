#![allow(dead_code)]

use nalgebra::DMatrix;
use skymarg::sky_dictionary::{SkyDictionary, SkyDictionaryConfig};

pub fn build_skydict(network: &str, f_sampling: u32, nsky: usize, seed: u64) -> SkyDictionary {
    let config = SkyDictionaryConfig::builder(network.parse().unwrap())
        .f_sampling(f_sampling)
        .nsky(nsky)
        .seed(seed)
        .build()
        .unwrap();
    SkyDictionary::new(config).unwrap()
}

/// Query matrix with `key` repeated `n` times.
pub fn repeated_query(key: &[i64], n: usize) -> DMatrix<i64> {
    DMatrix::from_fn(key.len(), n, |r, _| key[r])
}

/// Discretized delay key of sky sample `i`.
pub fn sample_key(skydict: &SkyDictionary, i: usize) -> Vec<i64> {
    skydict
        .delays()
        .column(i)
        .iter()
        .map(|&d| skydict.discretize(d))
        .collect()
}
