//! # Timeseries resampling onto the delay grid
//!
//! Detector data rarely come at the resolution used to discretize arrival-time delays.
//! This module brings an equally spaced series onto a target sampling frequency with the
//! **Fourier method** (spectrum truncation or zero padding), after an optional time-domain
//! taper.
//!
//! ## Taper
//!
//! The Fourier method treats the series as periodic: a mismatch between the first and
//! last samples rings across the whole output. A mild Tukey taper (default α = 0.1)
//! brings both edges smoothly to zero.
//!
//! ## Windows
//!
//! All windows are **periodic** (DFT-even): a window of length `n` is the symmetric
//! window of length `n + 1` with its last point dropped.
//!
//! | window          | definition (symmetric, length `m`)                          |
//! |-----------------|-------------------------------------------------------------|
//! | `Tukey(α)`      | cosine tapers over `α·(m−1)/2` samples at both ends, flat in between |
//! | `Hann`          | `½ − ½ cos(2πk/(m−1))`                                      |
//! | `Boxcar`        | `1`                                                         |
//!
//! `Tukey(α ≤ 0)` is a boxcar and `Tukey(α ≥ 1)` is a Hann window.

use std::f64::consts::PI;
use std::sync::Arc;

use nalgebra::DMatrix;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::constants::{Hertz, Second, DEFAULT_TUKEY_ALPHA};
use crate::skymarg_errors::SkyMargError;

/// Time-domain taper applied before resampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    /// Tapered cosine window with taper fraction `alpha`.
    Tukey(f64),
    Hann,
    Boxcar,
}

impl Default for Window {
    fn default() -> Self {
        Window::Tukey(DEFAULT_TUKEY_ALPHA)
    }
}

impl Window {
    /// Periodic window coefficients of length `n`.
    ///
    /// Errors
    /// ----------
    /// * [`SkyMargError::InvalidWindow`] if the Tukey fraction is NaN.
    pub fn coefficients(&self, n: usize) -> Result<Vec<f64>, SkyMargError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut w = match *self {
            Window::Tukey(alpha) if alpha.is_nan() => {
                return Err(SkyMargError::InvalidWindow(
                    "Tukey alpha must not be NaN".into(),
                ))
            }
            Window::Tukey(alpha) => symmetric_tukey(n + 1, alpha),
            Window::Hann => symmetric_hann(n + 1),
            Window::Boxcar => vec![1.0; n + 1],
        };
        w.truncate(n);
        Ok(w)
    }
}

fn symmetric_hann(m: usize) -> Vec<f64> {
    if m == 1 {
        return vec![1.0];
    }
    let denom = (m - 1) as f64;
    (0..m)
        .map(|k| 0.5 - 0.5 * (2.0 * PI * k as f64 / denom).cos())
        .collect()
}

fn symmetric_tukey(m: usize, alpha: f64) -> Vec<f64> {
    if m == 1 || alpha <= 0.0 {
        return vec![1.0; m];
    }
    if alpha >= 1.0 {
        return symmetric_hann(m);
    }

    let denom = (m - 1) as f64;
    let width = (alpha * denom / 2.0).floor() as usize;
    (0..m)
        .map(|k| {
            let n = k as f64;
            if k <= width {
                0.5 * (1.0 + (PI * (-1.0 + 2.0 * n / alpha / denom)).cos())
            } else if k + width + 1 >= m {
                0.5 * (1.0 + (PI * (-2.0 / alpha + 1.0 + 2.0 * n / alpha / denom)).cos())
            } else {
                1.0
            }
        })
        .collect()
}

/// Which axis of a timeseries matrix is time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeAxis {
    /// Each row is one series; time is the column index.
    #[default]
    Rows,
    /// Each column is one series; time is the row index.
    Columns,
}

/// Reusable forward/inverse plans for resampling series of one length to another.
struct FourierResampler {
    n_in: usize,
    n_out: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl FourierResampler {
    fn new(n_in: usize, n_out: usize) -> Self {
        let mut planner = FftPlanner::new();
        FourierResampler {
            n_in,
            n_out,
            forward: planner.plan_fft_forward(n_in),
            inverse: planner.plan_fft_inverse(n_out),
        }
    }

    /// Resample one real series of length `n_in` to `n_out` points.
    fn process(&self, series: &[f64]) -> Vec<f64> {
        let (n_in, n_out) = (self.n_in, self.n_out);
        debug_assert_eq!(series.len(), n_in);

        let mut spectrum: Vec<Complex<f64>> =
            series.iter().map(|&x| Complex::new(x, 0.0)).collect();
        self.forward.process(&mut spectrum);

        // Keep the non-negative frequencies common to both lengths.
        let n_common = n_in.min(n_out);
        let n_keep = n_common / 2 + 1;
        let mut half = vec![Complex::new(0.0, 0.0); n_out / 2 + 1];
        half[..n_keep].copy_from_slice(&spectrum[..n_keep]);

        // Even common length: the Nyquist bin is shared by ±f.
        if n_common % 2 == 0 {
            if n_out < n_in {
                half[n_common / 2] *= 2.0;
            } else if n_out > n_in {
                half[n_common / 2] *= 0.5;
            }
        }

        // Hermitian completion.
        let mut full = vec![Complex::new(0.0, 0.0); n_out];
        for (k, value) in half.iter().enumerate() {
            full[k] = *value;
            if k > 0 && n_out - k > k {
                full[n_out - k] = value.conj();
            }
        }
        if n_out % 2 == 0 {
            full[n_out / 2].im = 0.0;
        }

        self.inverse.process(&mut full);
        let scale = 1.0 / n_in as f64;
        full.iter().map(|c| c.re * scale).collect()
    }
}

/// Fourier resampling of a single real series to `num` points.
///
/// Equivalent to the truncated/zero-padded spectrum method: the output is the band-limited
/// interpolant of `series` evaluated on `num` equally spaced points over the same period.
pub fn fourier_resample(series: &[f64], num: usize) -> Vec<f64> {
    if series.is_empty() || num == 0 {
        return vec![0.0; num];
    }
    FourierResampler::new(series.len(), num).process(series)
}

fn series_along(timeseries: &DMatrix<f64>, axis: TimeAxis) -> Vec<Vec<f64>> {
    match axis {
        TimeAxis::Rows => timeseries
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect(),
        TimeAxis::Columns => timeseries
            .column_iter()
            .map(|col| col.iter().copied().collect())
            .collect(),
    }
}

fn assemble(series: Vec<Vec<f64>>, n_time: usize, axis: TimeAxis) -> DMatrix<f64> {
    let n_series = series.len();
    match axis {
        TimeAxis::Rows => DMatrix::from_fn(n_series, n_time, |r, c| series[r][c]),
        TimeAxis::Columns => DMatrix::from_fn(n_time, n_series, |r, c| series[c][r]),
    }
}

/// Bring `timeseries` onto a grid of spacing `1 / f_sampling`.
///
/// Arguments
/// -----------------
/// * `timeseries`: the data; `axis` says which dimension is time.
/// * `times`: equally spaced sample times along `axis`, seconds.
/// * `axis`: time axis of `timeseries`.
/// * `window`: taper applied before resampling, `None` for no taper.
/// * `f_sampling`: target sampling frequency, Hz.
///
/// Return
/// ----------
/// * `(resampled, resampled_times)`. When `times` is already spaced by `1 / f_sampling`
///   the (tapered) input is returned with the original times.
///
/// Errors
/// ----------
/// * [`SkyMargError::InvalidTimeseries`] if fewer than two times are given, if `times` does
///   not match the time axis, or if the target grid would be empty.
/// * [`SkyMargError::IncommensurateSampling`] if the resampled spacing differs from
///   `1 / f_sampling`, i.e. the two rates are not commensurate over the series length.
pub fn resample_timeseries(
    timeseries: &DMatrix<f64>,
    times: &[Second],
    axis: TimeAxis,
    window: Option<Window>,
    f_sampling: Hertz,
) -> Result<(DMatrix<f64>, Vec<Second>), SkyMargError> {
    let n_time = match axis {
        TimeAxis::Rows => timeseries.ncols(),
        TimeAxis::Columns => timeseries.nrows(),
    };
    if times.len() < 2 {
        return Err(SkyMargError::InvalidTimeseries(
            "at least two sample times are required".into(),
        ));
    }
    if times.len() != n_time {
        return Err(SkyMargError::InvalidTimeseries(format!(
            "{} times for a time axis of length {n_time}",
            times.len()
        )));
    }

    let mut series = series_along(timeseries, axis);
    if let Some(window) = window {
        let taper = window.coefficients(n_time)?;
        for s in series.iter_mut() {
            s.iter_mut().zip(&taper).for_each(|(x, w)| *x *= w);
        }
    }

    let dt = times[1] - times[0];
    let fs_ratio = f_sampling as f64 * dt;
    if fs_ratio == 1.0 {
        return Ok((assemble(series, n_time, axis), times.to_vec()));
    }

    let num = (n_time as f64 * fs_ratio).floor();
    if !(num >= 1.0) {
        return Err(SkyMargError::InvalidTimeseries(format!(
            "resampling {n_time} samples at ratio {fs_ratio} leaves no samples"
        )));
    }
    let num = num as usize;

    let new_dt = dt * n_time as f64 / num as f64;
    let expected = 1.0 / f_sampling as f64;
    if (expected - new_dt).abs() > 1e-8 + 1e-5 * new_dt.abs() {
        return Err(SkyMargError::IncommensurateSampling {
            expected,
            got: new_dt,
        });
    }

    let resampler = FourierResampler::new(n_time, num);
    let resampled: Vec<Vec<f64>> = series.iter().map(|s| resampler.process(s)).collect();
    let new_times = (0..num).map(|i| times[0] + i as f64 * new_dt).collect();

    Ok((assemble(resampled, num, axis), new_times))
}

#[cfg(test)]
mod resample_test {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_periodic_hann() {
        let w = Window::Hann.coefficients(4).unwrap();
        let expected = [0.0, 0.5, 1.0, 0.5];
        for (a, b) in w.iter().zip(expected) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_tukey_limits() {
        assert_eq!(
            Window::Tukey(0.0).coefficients(8).unwrap(),
            Window::Boxcar.coefficients(8).unwrap()
        );
        assert_eq!(
            Window::Tukey(1.0).coefficients(8).unwrap(),
            Window::Hann.coefficients(8).unwrap()
        );
        assert!(Window::Tukey(f64::NAN).coefficients(8).is_err());
    }

    #[test]
    fn test_tukey_shape() {
        let w = Window::default().coefficients(100).unwrap();
        assert_eq!(w.len(), 100);
        assert_abs_diff_eq!(w[0], 0.0, epsilon = 1e-15);
        assert!(w[1] > 0.0 && w[1] < 1.0);
        assert!(w[10..90].iter().all(|&x| x == 1.0));
        // symmetric about the center of the (n + 1)-point window
        for k in 1..50 {
            assert_abs_diff_eq!(w[k], w[100 - k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fourier_identity() {
        let x: Vec<f64> = (0..37).map(|i| (0.3 * i as f64).sin() + 0.1 * i as f64).collect();
        let y = fourier_resample(&x, x.len());
        for (a, b) in x.iter().zip(&y) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fourier_upsample_band_limited_signal() {
        // Periodic, band-limited: upsampling must interpolate exactly.
        let n = 32;
        let f = |t: f64| (2.0 * PI * 3.0 * t).cos() + 0.5 * (2.0 * PI * 5.0 * t).sin();
        let x: Vec<f64> = (0..n).map(|i| f(i as f64 / n as f64)).collect();
        let y = fourier_resample(&x, 4 * n);
        for (i, v) in y.iter().enumerate() {
            assert_abs_diff_eq!(*v, f(i as f64 / (4 * n) as f64), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fourier_downsample_band_limited_signal() {
        let n = 64;
        let f = |t: f64| 1.0 + (2.0 * PI * 2.0 * t).cos();
        let x: Vec<f64> = (0..n).map(|i| f(i as f64 / n as f64)).collect();
        let y = fourier_resample(&x, 16);
        for (i, v) in y.iter().enumerate() {
            assert_abs_diff_eq!(*v, f(i as f64 / 16.0), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_same_rate_without_window_is_identity() {
        let data = DMatrix::from_fn(2, 16, |r, c| (r * 16 + c) as f64);
        let times: Vec<f64> = (0..16).map(|i| 10.0 + i as f64 / 64.0).collect();
        let (out, out_times) =
            resample_timeseries(&data, &times, TimeAxis::Rows, None, 64).unwrap();
        assert_eq!(out, data);
        assert_eq!(out_times, times);
    }

    #[test]
    fn test_columns_axis() {
        let n = 32;
        let data = DMatrix::from_fn(n, 3, |r, c| ((r as f64) * 0.2 + c as f64).cos());
        let times: Vec<f64> = (0..n).map(|i| i as f64 / 16.0).collect();
        let (out, out_times) =
            resample_timeseries(&data, &times, TimeAxis::Columns, None, 32).unwrap();
        assert_eq!(out.shape(), (64, 3));
        assert_eq!(out_times.len(), 64);
        assert_abs_diff_eq!(out_times[1] - out_times[0], 1.0 / 32.0, epsilon = 1e-15);
        // samples on the original grid are reproduced
        for r in 0..n {
            assert_abs_diff_eq!(out[(2 * r, 1)], data[(r, 1)], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_incommensurate_rates() {
        let data = DMatrix::from_element(1, 10, 1.0);
        let times: Vec<f64> = (0..10).map(|i| i as f64 / 3.0).collect();
        let result = resample_timeseries(&data, &times, TimeAxis::Rows, None, 4);
        assert!(matches!(
            result,
            Err(SkyMargError::IncommensurateSampling { .. })
        ));
    }

    #[test]
    fn test_invalid_times() {
        let data = DMatrix::from_element(1, 10, 1.0);
        assert!(matches!(
            resample_timeseries(&data, &[0.0], TimeAxis::Rows, None, 4),
            Err(SkyMargError::InvalidTimeseries(_))
        ));
        let times: Vec<f64> = (0..9).map(|i| i as f64).collect();
        assert!(matches!(
            resample_timeseries(&data, &times, TimeAxis::Rows, None, 4),
            Err(SkyMargError::InvalidTimeseries(_))
        ));
    }
}
