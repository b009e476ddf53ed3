// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Windowed-sinc FIR filters and integer-ratio resamplers.
//!
//! [`FirFilter`], [`FirDecimator`] and [`FirInterpolator`] are causal and
//! keep `taps - 1` input samples of history, so chunked processing is
//! bit-identical to whole-buffer processing. [`resample_poly`] is a
//! one-shot, delay-compensated rational resampler for preparing input
//! audio.

use std::f64::consts::PI;
use std::ops::{Add, Mul};

use num_complex::Complex64;

use crate::error::{Error, Result};

/// Prototype length per unit of resampling factor.
pub const TAPS_PER_FACTOR: usize = 20;

/// Anything the FIR kernels can filter: `f64` and `Complex64`.
pub trait Sample: Copy + Default + Add<Output = Self> + Mul<f64, Output = Self> {}

impl<T> Sample for T where T: Copy + Default + Add<Output = T> + Mul<f64, Output = T> {}

/// Hamming-windowed sinc low-pass, normalised to unity DC gain.
///
/// `cutoff_norm` is the cutoff in cycles per sample (0.5 = Nyquist).
pub fn lowpass_taps(cutoff_norm: f64, taps: usize) -> Vec<f64> {
    let taps = taps.max(1);
    let m = (taps - 1) as f64;
    let mut coeffs: Vec<f64> = (0..taps)
        .map(|i| {
            let x = i as f64 - m / 2.0;
            let sinc = if x == 0.0 {
                2.0 * cutoff_norm
            } else {
                (2.0 * PI * cutoff_norm * x).sin() / (PI * x)
            };
            let window = if taps == 1 {
                1.0
            } else {
                0.54 - 0.46 * (2.0 * PI * i as f64 / m).cos()
            };
            sinc * window
        })
        .collect();
    let sum: f64 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        let inv = 1.0 / sum;
        for c in &mut coeffs {
            *c *= inv;
        }
    }
    coeffs
}

/// `sum(taps[j] * ext[pos - j])`.
#[inline]
fn convolve_at<T: Sample>(taps: &[f64], ext: &[T], pos: usize) -> T {
    let start = pos + 1 - taps.len();
    ext[start..=pos]
        .iter()
        .rev()
        .zip(taps)
        .fold(T::default(), |acc, (&x, &h)| acc + x * h)
}

fn check_factor(factor: usize) -> Result<()> {
    if factor == 0 {
        return Err(Error::InvalidConfig("resampling factor must be >= 1".into()));
    }
    Ok(())
}

/// Keep the trailing `len` samples of `ext` as the next call's history.
fn carry_history<T: Sample>(ext: Vec<T>, len: usize) -> Vec<T> {
    let mut ext = ext;
    let drop = ext.len() - len;
    ext.drain(..drop);
    ext
}

/// Causal FIR filter at a single rate.
#[derive(Debug, Clone)]
pub struct FirFilter<T: Sample> {
    taps: Vec<f64>,
    history: Vec<T>,
}

impl<T: Sample> FirFilter<T> {
    pub fn new(taps: Vec<f64>) -> Self {
        let taps = if taps.is_empty() { vec![1.0] } else { taps };
        let history = vec![T::default(); taps.len() - 1];
        Self { taps, history }
    }

    pub fn lowpass(cutoff_hz: f64, sample_rate: f64, taps: usize) -> Self {
        Self::new(lowpass_taps(cutoff_hz / sample_rate, taps))
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    pub fn process(&mut self, input: &[T]) -> Vec<T> {
        let hist_len = self.history.len();
        let mut ext = std::mem::take(&mut self.history);
        ext.extend_from_slice(input);
        let out = (0..input.len())
            .map(|i| convolve_at(&self.taps, &ext, hist_len + i))
            .collect();
        self.history = carry_history(ext, hist_len);
        out
    }

    pub fn reset(&mut self) {
        self.history.fill(T::default());
    }
}

/// Baseband channel filter for complex IQ.
pub type ComplexFir = FirFilter<Complex64>;

/// Anti-alias low-pass followed by keep-one-in-`factor`.
///
/// A fresh decimator turns `n` inputs into `floor(n / factor)` outputs;
/// across calls the phase carries over so no sample is dropped or doubled.
#[derive(Debug, Clone)]
pub struct FirDecimator<T: Sample> {
    factor: usize,
    taps: Vec<f64>,
    history: Vec<T>,
    phase: usize,
}

impl<T: Sample> FirDecimator<T> {
    pub fn new(factor: usize) -> Result<Self> {
        check_factor(factor)?;
        let taps = if factor == 1 {
            vec![1.0]
        } else {
            lowpass_taps(0.5 / factor as f64, TAPS_PER_FACTOR * factor + 1)
        };
        let history = vec![T::default(); taps.len() - 1];
        Ok(Self {
            factor,
            taps,
            history,
            phase: 0,
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn process(&mut self, input: &[T]) -> Vec<T> {
        let hist_len = self.history.len();
        let mut ext = std::mem::take(&mut self.history);
        ext.extend_from_slice(input);
        let mut out = Vec::with_capacity(input.len() / self.factor + 1);
        for i in 0..input.len() {
            self.phase += 1;
            if self.phase == self.factor {
                self.phase = 0;
                out.push(convolve_at(&self.taps, &ext, hist_len + i));
            }
        }
        self.history = carry_history(ext, hist_len);
        out
    }

    pub fn reset(&mut self) {
        self.history.fill(T::default());
        self.phase = 0;
    }
}

/// Polyphase band-limited interpolator: every input sample yields
/// exactly `factor` outputs.
#[derive(Debug, Clone)]
pub struct FirInterpolator {
    factor: usize,
    phases: Vec<Vec<f64>>,
    history: Vec<f64>,
}

impl FirInterpolator {
    pub fn new(factor: usize) -> Result<Self> {
        check_factor(factor)?;
        if factor == 1 {
            return Ok(Self {
                factor,
                phases: vec![vec![1.0]],
                history: Vec::new(),
            });
        }
        let prototype: Vec<f64> = lowpass_taps(0.5 / factor as f64, TAPS_PER_FACTOR * factor + 1)
            .into_iter()
            .map(|h| h * factor as f64)
            .collect();
        let phases: Vec<Vec<f64>> = (0..factor)
            .map(|p| prototype.iter().skip(p).step_by(factor).copied().collect())
            .collect();
        let longest = phases.iter().map(Vec::len).max().unwrap_or(1);
        // Shorter phases are zero-padded so every branch reads the same window.
        let phases = phases
            .into_iter()
            .map(|mut branch| {
                branch.resize(longest, 0.0);
                branch
            })
            .collect();
        Ok(Self {
            factor,
            phases,
            history: vec![0.0; longest - 1],
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn process(&mut self, input: &[f64]) -> Vec<f64> {
        let hist_len = self.history.len();
        let mut ext = std::mem::take(&mut self.history);
        ext.extend_from_slice(input);
        let mut out = Vec::with_capacity(input.len() * self.factor);
        for i in 0..input.len() {
            for branch in &self.phases {
                out.push(convolve_at(branch, &ext, hist_len + i));
            }
        }
        self.history = carry_history(ext, hist_len);
        out
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Resample by the rational factor `up / down` in one pass, compensating
/// the filter delay so the output lines up with the input.
///
/// Returns `ceil(len * up / down)` samples.
pub fn resample_poly(samples: &[f64], up: usize, down: usize) -> Result<Vec<f64>> {
    check_factor(up)?;
    check_factor(down)?;
    let g = gcd(up as u64, down as u64) as usize;
    let (up, down) = (up / g, down / g);
    if up == 1 && down == 1 {
        return Ok(samples.to_vec());
    }
    let max_rate = up.max(down);
    let half_len = (TAPS_PER_FACTOR / 2) * max_rate;
    let taps: Vec<f64> = lowpass_taps(0.5 / max_rate as f64, 2 * half_len + 1)
        .into_iter()
        .map(|h| h * up as f64)
        .collect();

    let n_out = (samples.len() * up).div_ceil(down);
    let mut out = Vec::with_capacity(n_out);
    for m in 0..n_out {
        // Position on the zero-stuffed grid, shifted by the filter delay.
        let j = (m * down + half_len) as isize;
        let mut k = j.rem_euclid(up as isize) as usize;
        let mut acc = 0.0;
        while k < taps.len() {
            let src = (j - k as isize) / up as isize;
            if src < 0 {
                break;
            }
            if let Some(&x) = samples.get(src as usize) {
                acc += taps[k] * x;
            }
            k += up;
        }
        out.push(acc);
    }
    Ok(out)
}

/// Resample between two integer rates.
pub fn resample_rational(samples: &[f64], from_hz: u32, to_hz: u32) -> Result<Vec<f64>> {
    if from_hz == 0 || to_hz == 0 {
        return Err(Error::InvalidConfig("sample rates must be > 0".into()));
    }
    resample_poly(samples, to_hz as usize, from_hz as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{band_power, power_spectrum};

    fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_lowpass_taps_unity_dc_and_symmetric() {
        let taps = lowpass_taps(0.125, 81);
        let sum: f64 = taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for i in 0..taps.len() / 2 {
            assert!((taps[i] - taps[taps.len() - 1 - i]).abs() < 1e-15);
        }
    }

    #[test]
    fn test_decimated_length_is_floor() {
        for (n, q) in [(0, 4), (3, 4), (4, 4), (1001, 12), (960, 4), (17, 1)] {
            let mut dec = FirDecimator::<f64>::new(q).unwrap();
            assert_eq!(dec.process(&vec![0.5; n]).len(), n / q, "n={n} q={q}");
        }
    }

    #[test]
    fn test_decimator_chunked_matches_whole() {
        let x = tone(1_000.0, 192_000.0, 2_000);
        let mut whole = FirDecimator::<f64>::new(4).unwrap();
        let mut chunked = whole.clone();
        let expected = whole.process(&x);
        let mut got = Vec::new();
        for chunk in x.chunks(333) {
            got.extend(chunked.process(chunk));
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_decimator_preserves_passband_and_rejects_alias() {
        let fs = 192_000.0;
        let n = 19_200;
        let q = 4;
        let mut dec = FirDecimator::<f64>::new(q).unwrap();
        let passband = dec.process(&tone(5_000.0, fs, n));
        dec.reset();
        // 36 kHz would fold onto 12 kHz at the 48 kHz output rate.
        let alias = dec.process(&tone(36_000.0, fs, n));

        let settle = 100;
        assert!((rms(&passband[settle..]) - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01);

        let out_fs = fs / q as f64;
        let spectrum = power_spectrum(&alias[settle..], 2048);
        let folded = band_power(&spectrum, out_fs, 11_000.0, 13_000.0);
        let reference = 0.5;
        let attenuation_db = 10.0 * (folded / reference).log10();
        assert!(attenuation_db < -40.0, "alias only {attenuation_db:.1} dB down");
    }

    #[test]
    fn test_interpolated_length_and_gain() {
        let fs = 48_000.0;
        let x = tone(1_000.0, fs, 4_800);
        let mut up = FirInterpolator::new(4).unwrap();
        let y = up.process(&x);
        assert_eq!(y.len(), x.len() * 4);
        assert!((rms(&y[400..]) - rms(&x[100..])).abs() < 0.01);
        assert!(up.process(&[]).is_empty());
    }

    #[test]
    fn test_interpolator_suppresses_images() {
        let fs = 48_000.0;
        let mut up = FirInterpolator::new(4).unwrap();
        let y = up.process(&tone(3_000.0, fs, 4_800));
        let spectrum = power_spectrum(&y[400..], 4096);
        let out_fs = fs * 4.0;
        let wanted = band_power(&spectrum, out_fs, 2_500.0, 3_500.0);
        let image = band_power(&spectrum, out_fs, 44_500.0, 45_500.0);
        assert!(10.0 * (image / wanted).log10() < -40.0);
    }

    #[test]
    fn test_interpolator_chunked_matches_whole() {
        let x = tone(700.0, 48_000.0, 500);
        let mut whole = FirInterpolator::new(12).unwrap();
        let mut chunked = whole.clone();
        let expected = whole.process(&x);
        let mut got = chunked.process(&x[..7]);
        got.extend(chunked.process(&x[7..]));
        assert_eq!(got, expected);
    }

    #[test]
    fn test_complex_fir_filters_both_components() {
        let fs = 2_304_000.0;
        let mut fir = FirFilter::<Complex64>::lowpass(160_000.0, fs, 63);
        let inband: Vec<Complex64> = (0..4_000)
            .map(|n| Complex64::from_polar(1.0, 2.0 * PI * 50_000.0 * n as f64 / fs))
            .collect();
        let image: Vec<Complex64> = (0..4_000)
            .map(|n| Complex64::from_polar(1.0, -2.0 * PI * 500_000.0 * n as f64 / fs))
            .collect();
        let kept = fir.process(&inband);
        fir.reset();
        let removed = fir.process(&image);
        assert!((kept[1_000].norm() - 1.0).abs() < 0.01);
        assert!(removed[1_000].norm() < 0.01);
    }

    #[test]
    fn test_resample_rational_lengths_and_tone() {
        let x = tone(1_000.0, 44_100.0, 4_410);
        let y = resample_rational(&x, 44_100, 48_000).unwrap();
        assert_eq!(y.len(), 4_800);
        assert!((rms(&y[200..4_600]) - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01);

        let same = resample_rational(&x, 48_000, 48_000).unwrap();
        assert_eq!(same, x);
        assert!(resample_rational(&x, 0, 48_000).is_err());
    }

    #[test]
    fn test_resample_poly_is_delay_compensated() {
        let x = tone(500.0, 16_000.0, 1_600);
        let y = resample_poly(&x, 3, 1).unwrap();
        // Interior samples on the original grid reproduce the input.
        for i in (400..1_200).step_by(37) {
            assert!((y[3 * i] - x[i]).abs() < 0.01, "sample {i}");
        }
    }
}
