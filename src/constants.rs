//! # Constants and type definitions for skymarg
//!
//! This module centralizes the **physical constants**, **construction defaults**, and
//! **common type aliases** used throughout the `skymarg` library.
//!
//! ## Overview
//!
//! - Physical constants (speed of light)
//! - Default construction parameters of a [`SkyDictionary`](crate::sky_dictionary::SkyDictionary)
//! - Core type aliases (units and delay keys)

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Speed of light in vacuum, m/s (exact, SI)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

// -------------------------------------------------------------------------------------------------
// Construction defaults
// -------------------------------------------------------------------------------------------------

/// Default inverse time-bin size of the delay grid, Hz
pub const DEFAULT_F_SAMPLING: u32 = 1 << 13;

/// Default number of sky samples
pub const DEFAULT_NSKY: usize = 1_000_000;

/// Default seed of the quasi-random sky sampler
pub const DEFAULT_SEED: u64 = 0;

/// Default Tukey taper fraction applied before resampling
pub const DEFAULT_TUKEY_ALPHA: f64 = 0.1;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in radians
pub type Radian = f64;
/// Time in seconds
pub type Second = f64;
/// Frequency in hertz
pub type Hertz = u32;
/// Distance in meters
pub type Meter = f64;

/// Discretized delays (units of `1 / f_sampling`) from a reference detector
/// to the remaining detectors of a network.
pub type DelayKey = Vec<i64>;
