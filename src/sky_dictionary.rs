//! # SkyDictionary: sky samples indexed by inter-detector delays
//!
//! This module defines [`SkyDictionary`](crate::sky_dictionary::SkyDictionary), the façade that
//! wires together, for one detector network:
//!
//! 1. **Sky samples**: an isotropic, scrambled-Halton population of Earth-fixed `(lat, lon)`
//!    ([`SkySamples`](crate::sky_sampler::SkySamples)).
//! 2. **Per-sample geometry**: antenna coefficients `(F+, F×)` at ψ = 0 and geocenter delays of
//!    every detector, from a [`DetectorGeometry`](crate::detectors::DetectorGeometry) provider.
//! 3. **Delay index**: samples bucketed by the discretized delays from the reference detector,
//!    with a dense prior density and round-robin sample cursors
//!    ([`DelayIndex`](crate::delay_index::DelayIndex)).
//! 4. **Conditional delay priors** for every ordering of 2+ detectors
//!    ([`DelayPriorTable`](crate::delay_prior::DelayPriorTable)).
//!
//! Everything is built once in the constructor and is read-only afterwards, except the
//! round-robin cursors advanced by [`get_sky_inds_and_prior`](SkyDictionary::get_sky_inds_and_prior).
//!
//! ## Configuration & persistence
//!
//! A dictionary is fully determined by its [`SkyDictionaryConfig`]: detector network, delay
//! resolution `f_sampling`, number of samples `nsky` and `seed`. Serializing a dictionary writes
//! its configuration only; deserializing rebuilds every derived structure.
//!
//! ## Typical usage
//!
//! ```rust,no_run
//! use nalgebra::DMatrix;
//! use skymarg::sky_dictionary::{SkyDictionary, SkyDictionaryConfig};
//!
//! let config = SkyDictionaryConfig::builder("HLV".parse()?)
//!     .f_sampling(4096)
//!     .nsky(100_000)
//!     .seed(1)
//!     .build()?;
//! let mut skydict = SkyDictionary::new(config)?;
//!
//! // Delays H→L and H→V, in units of 1 / f_sampling, one query per column.
//! let delays = DMatrix::from_column_slice(2, 3, &[0, 0, 12, -30, 500, 500]);
//! let lookup = skydict.get_sky_inds_and_prior(&delays)?;
//! assert_eq!(lookup.physical_mask.len(), 3);
//! assert_eq!(lookup.sky_inds.len(), lookup.n_physical());
//! # Ok::<(), skymarg::skymarg_errors::SkyMargError>(())
//! ```
//!
//! ## Concurrency
//!
//! [`get_sky_inds_and_prior`](SkyDictionary::get_sky_inds_and_prior) takes `&mut self` because it
//! advances the built-in cursors. Workers sharing one dictionary (e.g. behind an `Arc`) each take
//! their own shard with [`fork_cursors`](SkyDictionary::fork_cursors) and query through
//! [`lookup_with`](SkyDictionary::lookup_with).

use std::fmt;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{
    DelayKey, Hertz, Radian, Second, DEFAULT_F_SAMPLING, DEFAULT_NSKY, DEFAULT_SEED,
};
use crate::delay_index::{discretize, discretize_matrix, DelayIndex, SampleCursors, SkyLookup};
use crate::delay_prior::{DelayHistogram, DelayPriorTable};
use crate::detectors::{DetectorGeometry, DetectorNetwork, EarthFixedGeometry};
use crate::resample::{self, TimeAxis, Window};
use crate::sky_sampler::SkySamples;
use crate::skymarg_errors::SkyMargError;

/// Mean number of samples per populated delay bin below which the prior is reported as sparse.
const SPARSE_OCCUPANCY: f64 = 2.0;

/// Construction parameters of a [`SkyDictionary`].
///
/// The [`Default`]-like values used by [`SkyDictionaryConfig::new`] are
/// `f_sampling = 2¹³ Hz`, `nsky = 10⁶`, `seed = 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSkyDictionaryConfig")]
pub struct SkyDictionaryConfig {
    /// Detector network; delays are measured from its first detector.
    pub detector_names: DetectorNetwork,
    /// Inverse of the delay bin size, Hz.
    pub f_sampling: Hertz,
    /// Number of sky samples.
    pub nsky: usize,
    /// Seed of the sky sampler.
    pub seed: u64,
}

#[derive(Deserialize)]
struct RawSkyDictionaryConfig {
    detector_names: DetectorNetwork,
    #[serde(default = "default_f_sampling")]
    f_sampling: Hertz,
    #[serde(default = "default_nsky")]
    nsky: usize,
    #[serde(default)]
    seed: u64,
}

fn default_f_sampling() -> Hertz {
    DEFAULT_F_SAMPLING
}

fn default_nsky() -> usize {
    DEFAULT_NSKY
}

impl TryFrom<RawSkyDictionaryConfig> for SkyDictionaryConfig {
    type Error = SkyMargError;

    fn try_from(raw: RawSkyDictionaryConfig) -> Result<Self, Self::Error> {
        SkyDictionaryConfig::builder(raw.detector_names)
            .f_sampling(raw.f_sampling)
            .nsky(raw.nsky)
            .seed(raw.seed)
            .build()
    }
}

impl SkyDictionaryConfig {
    /// Configuration with default resolution, sample count and seed.
    pub fn new(detector_names: DetectorNetwork) -> Self {
        SkyDictionaryConfig {
            detector_names,
            f_sampling: DEFAULT_F_SAMPLING,
            nsky: DEFAULT_NSKY,
            seed: DEFAULT_SEED,
        }
    }

    /// Fluent, validating builder starting from [`SkyDictionaryConfig::new`].
    pub fn builder(detector_names: DetectorNetwork) -> SkyDictionaryConfigBuilder {
        SkyDictionaryConfigBuilder {
            config: SkyDictionaryConfig::new(detector_names),
        }
    }

    /// Check the configuration rules.
    ///
    /// Validation rules
    /// -----------------
    /// * `f_sampling > 0`
    /// * `nsky > 0`
    ///
    /// The detector network is valid by construction.
    pub fn validate(&self) -> Result<(), SkyMargError> {
        if self.f_sampling == 0 {
            return Err(SkyMargError::InvalidConfig(
                "f_sampling must be > 0".into(),
            ));
        }
        if self.nsky == 0 {
            return Err(SkyMargError::InvalidConfig("nsky must be > 0".into()));
        }
        Ok(())
    }
}

/// Builder for [`SkyDictionaryConfig`], with validation.
#[derive(Debug, Clone)]
pub struct SkyDictionaryConfigBuilder {
    config: SkyDictionaryConfig,
}

impl SkyDictionaryConfigBuilder {
    pub fn f_sampling(mut self, v: Hertz) -> Self {
        self.config.f_sampling = v;
        self
    }

    pub fn nsky(mut self, v: usize) -> Self {
        self.config.nsky = v;
        self
    }

    pub fn seed(mut self, v: u64) -> Self {
        self.config.seed = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Errors
    /// ----------
    /// * [`SkyMargError::InvalidConfig`] if a rule of
    ///   [`SkyDictionaryConfig::validate`] fails.
    pub fn build(self) -> Result<SkyDictionaryConfig, SkyMargError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl fmt::Display for SkyDictionaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 32;
            writeln!(f, "Sky Dictionary Parameters")?;
            writeln!(f, "-------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = " ".repeat(PARAM_COL.saturating_sub(s.len()).max(1));
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            line!(
                "detector_names = {}",
                self.detector_names,
                "first detector is the delay reference"
            )?;
            line!("f_sampling = {}", self.f_sampling, "delay bins per second")?;
            line!("nsky = {}", self.nsky, "number of sky samples")?;
            line!("seed = {}", self.seed, "sky sampler seed")
        } else {
            write!(
                f,
                "SkyDictionaryConfig(detectors={}, f_sampling={}, nsky={}, seed={})",
                self.detector_names, self.f_sampling, self.nsky, self.seed
            )
        }
    }
}

/// Sky samples of a detector network, indexed by discretized arrival-time delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "SkyDictionaryConfig", try_from = "SkyDictionaryConfig")]
pub struct SkyDictionary {
    config: SkyDictionaryConfig,
    sky_samples: SkySamples,
    /// nsky × (2·n_det)
    fplus_fcross_0: DMatrix<f64>,
    /// n_det × nsky
    geocenter_delays: DMatrix<Second>,
    /// (n_det − 1) × nsky, relative to the reference detector
    delays: DMatrix<Second>,
    index: DelayIndex,
    delay_priors: DelayPriorTable,
    cursors: SampleCursors,
}

impl SkyDictionary {
    /// Build a dictionary with the built-in [`EarthFixedGeometry`].
    ///
    /// See also
    /// ------------
    /// * [`SkyDictionary::with_geometry`] – Same with a custom geometry provider.
    pub fn new(config: SkyDictionaryConfig) -> Result<Self, SkyMargError> {
        SkyDictionary::with_geometry(config, &EarthFixedGeometry)
    }

    /// Build a dictionary, taking antenna coefficients and geocenter delays from `geometry`.
    ///
    /// Arguments
    /// -----------------
    /// * `config`: construction parameters, validated first.
    /// * `geometry`: detector-physics provider.
    ///
    /// Return
    /// ----------
    /// * The dictionary, or a [`SkyMargError`] if the configuration is invalid or the
    ///   provider returns arrays of the wrong shape.
    pub fn with_geometry<G>(config: SkyDictionaryConfig, geometry: &G) -> Result<Self, SkyMargError>
    where
        G: DetectorGeometry + ?Sized,
    {
        config.validate()?;
        let network = &config.detector_names;
        let n_det = network.len();
        let nsky = config.nsky;

        let sky_samples = SkySamples::halton(nsky, config.seed);
        debug!(nsky, seed = config.seed, "drew sky samples");

        let fplus_fcross_0 =
            geometry.antenna_coefficients(network, &sky_samples.lat, &sky_samples.lon);
        let geocenter_delays =
            geometry.geocenter_delays(network, &sky_samples.lat, &sky_samples.lon);
        if fplus_fcross_0.shape() != (nsky, 2 * n_det) {
            return Err(SkyMargError::InvalidConfig(format!(
                "antenna coefficients have shape {:?}, expected {:?}",
                fplus_fcross_0.shape(),
                (nsky, 2 * n_det)
            )));
        }
        if geocenter_delays.shape() != (n_det, nsky) {
            return Err(SkyMargError::InvalidConfig(format!(
                "geocenter delays have shape {:?}, expected {:?}",
                geocenter_delays.shape(),
                (n_det, nsky)
            )));
        }
        debug!(network = %network, "computed antenna coefficients and geocenter delays");

        let delays = DMatrix::from_fn(n_det - 1, nsky, |r, i| {
            geocenter_delays[(r + 1, i)] - geocenter_delays[(0, i)]
        });

        let index = DelayIndex::new(&discretize_matrix(&delays, config.f_sampling), config.f_sampling)?;
        let occupancy = nsky as f64 / index.n_buckets() as f64;
        if occupancy < SPARSE_OCCUPANCY {
            warn!(
                nsky,
                n_bins = index.n_buckets(),
                "sky samples sparsely cover the delay bins, sky prior will be noisy"
            );
        }

        let delay_priors =
            DelayPriorTable::new(&geocenter_delays, &fplus_fcross_0, config.f_sampling);
        let cursors = index.new_cursors();

        Ok(SkyDictionary {
            config,
            sky_samples,
            fplus_fcross_0,
            geocenter_delays,
            delays,
            index,
            delay_priors,
            cursors,
        })
    }

    pub fn config(&self) -> &SkyDictionaryConfig {
        &self.config
    }

    pub fn detector_names(&self) -> &DetectorNetwork {
        &self.config.detector_names
    }

    pub fn nsky(&self) -> usize {
        self.config.nsky
    }

    pub fn f_sampling(&self) -> Hertz {
        self.config.f_sampling
    }

    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    pub fn sky_samples(&self) -> &SkySamples {
        &self.sky_samples
    }

    /// Earth-fixed `(lat, lon)` of sample `i`.
    pub fn sky_location(&self, i: usize) -> Option<(Radian, Radian)> {
        Some((*self.sky_samples.lat.get(i)?, *self.sky_samples.lon.get(i)?))
    }

    /// Antenna coefficients at ψ = 0, `nsky × (2·n_det)`; columns `(2d, 2d+1)` are `(F+, F×)`
    /// of detector `d`.
    pub fn fplus_fcross_0(&self) -> &DMatrix<f64> {
        &self.fplus_fcross_0
    }

    /// Geocenter delays of every detector, `n_det × nsky`, seconds.
    pub fn geocenter_delays(&self) -> &DMatrix<Second> {
        &self.geocenter_delays
    }

    /// Geocenter delay of the reference detector for every sample, seconds.
    pub fn geocenter_delay_first_det(&self) -> Vec<Second> {
        self.geocenter_delays.row(0).iter().copied().collect()
    }

    /// Delays from the reference detector to the others, `(n_det − 1) × nsky`, seconds.
    pub fn delays(&self) -> &DMatrix<Second> {
        &self.delays
    }

    pub fn delay_index(&self) -> &DelayIndex {
        &self.index
    }

    /// Samples whose discretized delays equal `key`, in sample order.
    pub fn delays2inds(&self, key: &[i64]) -> Option<&[usize]> {
        self.index.bucket(key)
    }

    /// Every `(delay key, samples)` pair of the index.
    pub fn delays2inds_map(&self) -> impl Iterator<Item = (DelayKey, &[usize])> + '_ {
        self.index.buckets()
    }

    /// Elementwise `(min, max)` of the realized delay keys.
    pub fn delay_range(&self) -> (&[i64], &[i64]) {
        self.index.delay_range()
    }

    /// Prior density `f_s^(n_det−1) · |bucket| / nsky` of a delay key, s^−(n_det−1).
    pub fn sky_prior_at(&self, key: &[i64]) -> f64 {
        self.index.sky_prior_at(key)
    }

    /// Conditional delay prior for an ordering of detector indices.
    pub fn delays_prior(&self, order: &[usize]) -> Option<&DelayHistogram> {
        self.delay_priors.delays_prior(order)
    }

    /// Observed `(min, max)` discretized delay between a pair of detector indices.
    pub fn delays_bounds(&self, pair: (usize, usize)) -> Option<(i64, i64)> {
        self.delay_priors.delays_bounds(pair)
    }

    pub fn delay_priors(&self) -> &DelayPriorTable {
        &self.delay_priors
    }

    /// A delay in seconds in units of `1 / f_sampling`.
    pub fn discretize(&self, delay: Second) -> i64 {
        discretize(delay, self.config.f_sampling)
    }

    /// Elementwise [`discretize`](SkyDictionary::discretize).
    pub fn discretize_delays(&self, delays: &DMatrix<Second>) -> DMatrix<i64> {
        discretize_matrix(delays, self.config.f_sampling)
    }

    /// Map proposed delays to sky samples, prior densities and a physical mask.
    ///
    /// Arguments
    /// -----------------
    /// * `delays`: `(n_det − 1) × n_queries` time-of-arrival delays from the reference
    ///   detector, in units of `1 / f_sampling`; one query per column.
    ///
    /// Return
    /// ----------
    /// * [`SkyLookup`] with:
    ///   - `sky_inds`: a sample with the requested delays for every physical query,
    ///     cycling through the samples of each delay bin in order;
    ///   - `sky_prior`: prior density of the delays, s^−(n_det−1);
    ///   - `physical_mask`: `false` for delays outside the realized range or without any
    ///     sample. Unphysical queries are dropped from the two other arrays.
    ///
    /// Errors
    /// ----------
    /// * [`SkyMargError::DelayShapeMismatch`] if `delays` does not have `n_det − 1` rows.
    pub fn get_sky_inds_and_prior(
        &mut self,
        delays: &DMatrix<i64>,
    ) -> Result<SkyLookup, SkyMargError> {
        self.index.lookup(&mut self.cursors, delays)
    }

    /// Independent round-robin cursors, starting at the first sample of every bin.
    pub fn fork_cursors(&self) -> SampleCursors {
        self.index.new_cursors()
    }

    /// Same as [`get_sky_inds_and_prior`](SkyDictionary::get_sky_inds_and_prior), advancing
    /// `cursors` instead of the built-in cursors.
    pub fn lookup_with(
        &self,
        cursors: &mut SampleCursors,
        delays: &DMatrix<i64>,
    ) -> Result<SkyLookup, SkyMargError> {
        self.index.lookup(cursors, delays)
    }

    /// Rewind the built-in cursors.
    pub fn reset_cursors(&mut self) {
        self.cursors.reset();
    }

    /// Resample a timeseries onto this dictionary's delay resolution.
    ///
    /// Arguments
    /// -----------------
    /// * `timeseries`: data, time along `axis`.
    /// * `times`: equally spaced sample times along `axis`, seconds.
    /// * `axis`: which matrix dimension is time.
    /// * `window`: taper applied first; pass `Some(Window::default())` for the usual
    ///   Tukey(0.1) or `None` to skip it.
    ///
    /// Errors
    /// ----------
    /// * [`SkyMargError::IncommensurateSampling`] if `times` cannot be brought onto a grid of
    ///   spacing `1 / f_sampling`.
    /// * [`SkyMargError::InvalidTimeseries`] on malformed inputs.
    ///
    /// See also
    /// ------------
    /// * [`resample::resample_timeseries`] – Underlying free function.
    pub fn resample_timeseries(
        &self,
        timeseries: &DMatrix<f64>,
        times: &[Second],
        axis: TimeAxis,
        window: Option<Window>,
    ) -> Result<(DMatrix<f64>, Vec<Second>), SkyMargError> {
        resample::resample_timeseries(timeseries, times, axis, window, self.config.f_sampling)
    }
}

impl From<SkyDictionary> for SkyDictionaryConfig {
    fn from(skydict: SkyDictionary) -> Self {
        skydict.config
    }
}

impl TryFrom<SkyDictionaryConfig> for SkyDictionary {
    type Error = SkyMargError;

    fn try_from(config: SkyDictionaryConfig) -> Result<Self, Self::Error> {
        SkyDictionary::new(config)
    }
}

#[cfg(test)]
mod sky_dictionary_test {
    use approx::assert_relative_eq;

    use super::*;

    fn small_config(network: &str) -> SkyDictionaryConfig {
        SkyDictionaryConfig::builder(network.parse().unwrap())
            .f_sampling(1024)
            .nsky(2000)
            .seed(3)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults_and_validation() {
        let config = SkyDictionaryConfig::new("HL".parse().unwrap());
        assert_eq!(config.f_sampling, 8192);
        assert_eq!(config.nsky, 1_000_000);
        assert_eq!(config.seed, 0);

        let err = SkyDictionaryConfig::builder("HL".parse().unwrap())
            .nsky(0)
            .build();
        assert_eq!(
            err,
            Err(SkyMargError::InvalidConfig("nsky must be > 0".into()))
        );

        let err = SkyDictionaryConfig::builder("HL".parse().unwrap())
            .f_sampling(0)
            .build();
        assert_eq!(
            err,
            Err(SkyMargError::InvalidConfig("f_sampling must be > 0".into()))
        );
    }

    #[test]
    fn test_new_rejects_invalid_public_fields() {
        let mut config = small_config("HL");
        config.nsky = 0;
        assert!(SkyDictionary::new(config).is_err());
    }

    #[test]
    fn test_config_display() {
        let config = small_config("HLV");
        assert_eq!(
            config.to_string(),
            "SkyDictionaryConfig(detectors=HLV, f_sampling=1024, nsky=2000, seed=3)"
        );
        let table = format!("{config:#}");
        assert!(table.starts_with("Sky Dictionary Parameters"));
        assert!(table.contains("nsky = 2000"));
        assert!(table.contains("# sky sampler seed"));
    }

    #[test]
    fn test_config_serde_defaults_and_validation() {
        let config: SkyDictionaryConfig =
            serde_json::from_str(r#"{"detector_names":["H","L"],"seed":5}"#).unwrap();
        assert_eq!(config.f_sampling, DEFAULT_F_SAMPLING);
        assert_eq!(config.nsky, DEFAULT_NSKY);
        assert_eq!(config.seed, 5);

        assert!(serde_json::from_str::<SkyDictionaryConfig>(
            r#"{"detector_names":["H","L"],"nsky":0}"#
        )
        .is_err());
    }

    #[test]
    fn test_derived_shapes() {
        let skydict = SkyDictionary::new(small_config("HLV")).unwrap();
        assert_eq!(skydict.sky_samples().len(), 2000);
        assert_eq!(skydict.fplus_fcross_0().shape(), (2000, 6));
        assert_eq!(skydict.geocenter_delays().shape(), (3, 2000));
        assert_eq!(skydict.delays().shape(), (2, 2000));
        assert_eq!(skydict.geocenter_delay_first_det().len(), 2000);
        assert_eq!(skydict.delay_index().ndim(), 2);
        assert_eq!(skydict.delay_priors().len(), 12);

        let geo = skydict.geocenter_delays();
        assert_relative_eq!(
            skydict.delays()[(1, 17)],
            geo[(2, 17)] - geo[(0, 17)],
            epsilon = 1e-18
        );
        assert_eq!(skydict.geocenter_delay_first_det()[17], geo[(0, 17)]);
    }

    #[test]
    fn test_serialize_as_config_and_rebuild() {
        let skydict = SkyDictionary::new(small_config("LV")).unwrap();
        let json = serde_json::to_string(&skydict).unwrap();
        assert_eq!(
            json,
            r#"{"detector_names":["L","V"],"f_sampling":1024,"nsky":2000,"seed":3}"#
        );

        let rebuilt: SkyDictionary = serde_json::from_str(&json).unwrap();
        assert_eq!(rebuilt.sky_samples(), skydict.sky_samples());
        assert_eq!(rebuilt.delays(), skydict.delays());
        assert_eq!(
            rebuilt.delay_index().dense_prior(),
            skydict.delay_index().dense_prior()
        );
    }

    #[test]
    fn test_wrong_query_shape() {
        let mut skydict = SkyDictionary::new(small_config("HLV")).unwrap();
        let result = skydict.get_sky_inds_and_prior(&DMatrix::zeros(1, 4));
        assert_eq!(
            result,
            Err(SkyMargError::DelayShapeMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    struct BrokenGeometry;

    impl DetectorGeometry for BrokenGeometry {
        fn antenna_coefficients(
            &self,
            _network: &DetectorNetwork,
            lat: &[Radian],
            _lon: &[Radian],
        ) -> DMatrix<f64> {
            DMatrix::zeros(lat.len(), 1)
        }

        fn geocenter_delays(
            &self,
            network: &DetectorNetwork,
            lat: &[Radian],
            _lon: &[Radian],
        ) -> DMatrix<f64> {
            DMatrix::zeros(network.len(), lat.len())
        }
    }

    #[test]
    fn test_geometry_shape_is_checked() {
        let result = SkyDictionary::with_geometry(small_config("HL"), &BrokenGeometry);
        assert!(matches!(result, Err(SkyMargError::InvalidConfig(_))));
    }
}
