// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Signal measurements used by tests and the end-of-run report.

use std::ops::RangeInclusive;

use crate::error::Result;
use crate::resample::{resample_poly, TAPS_PER_FACTOR};

/// Integer lags either side of the coarse estimate searched on the fine grid.
const FINE_SEARCH_SPAN: usize = 2;

pub fn mean_square(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64
}

pub fn rms(samples: &[f64]) -> f64 {
    mean_square(samples).sqrt()
}

/// SNR of `noisy` against the `clean` reference, in dB.
pub fn snr_db(clean: &[f64], noisy: &[f64]) -> f64 {
    let n = clean.len().min(noisy.len());
    let signal = mean_square(&clean[..n]);
    let noise = clean[..n]
        .iter()
        .zip(&noisy[..n])
        .map(|(c, x)| (x - c) * (x - c))
        .sum::<f64>()
        / n.max(1) as f64;
    if noise <= 0.0 {
        return f64::INFINITY;
    }
    10.0 * (signal / noise).log10()
}

/// Level difference between the wanted and the leaking channel, in dB.
pub fn separation_db(wanted: &[f64], leak: &[f64]) -> f64 {
    let w = rms(wanted);
    let l = rms(leak);
    if l <= 1e-12 {
        return f64::INFINITY;
    }
    20.0 * (w / l).log10()
}

/// Fundamental frequency estimated from rising zero crossings, with
/// linear interpolation between the straddling samples.
///
/// Returns `None` when fewer than two rising crossings are present.
pub fn zero_crossing_frequency(samples: &[f64], sample_rate: f64) -> Option<f64> {
    let mut first: Option<f64> = None;
    let mut last = 0.0;
    let mut cycles = 0usize;
    for (i, pair) in samples.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        if a < 0.0 && b >= 0.0 {
            let t = i as f64 + a / (a - b);
            match first {
                None => first = Some(t),
                Some(_) => cycles += 1,
            }
            last = t;
        }
    }
    let first = first?;
    if cycles == 0 {
        return None;
    }
    Some(cycles as f64 * sample_rate / (last - first))
}

/// Lag in `0..=max_lag` at which `delayed` best matches `reference`
/// (largest normalised cross-correlation).
pub fn best_lag(reference: &[f64], delayed: &[f64], max_lag: usize) -> usize {
    best_lag_in(reference, delayed, 0..=max_lag)
}

fn best_lag_in(reference: &[f64], delayed: &[f64], lags: RangeInclusive<usize>) -> usize {
    let mut best = (*lags.start(), f64::NEG_INFINITY);
    for lag in lags {
        if lag >= delayed.len() {
            break;
        }
        let n = reference.len().min(delayed.len() - lag);
        if n == 0 {
            break;
        }
        let score = reference[..n]
            .iter()
            .zip(&delayed[lag..lag + n])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64;
        if score > best.1 {
            best = (lag, score);
        }
    }
    best.0
}

/// [`snr_db`] after removing the processing delay between the two
/// sequences, skipping the first `settle` samples of the reference.
pub fn aligned_snr_db(reference: &[f64], delayed: &[f64], max_lag: usize, settle: usize) -> f64 {
    let lag = best_lag(reference, delayed, max_lag);
    snr_at_lag(reference, delayed, lag, settle)
}

/// [`aligned_snr_db`] for delays that are not a whole number of samples.
///
/// The integer lag is found first, then both sequences are interpolated
/// by `oversample` and the lag is refined on the finer grid. Use the
/// factor that makes the true delay integral, e.g. the RF/MPX ratio when
/// the delay comes from filters running at the RF rate.
pub fn fine_aligned_snr_db(
    reference: &[f64],
    delayed: &[f64],
    max_lag: usize,
    settle: usize,
    oversample: usize,
) -> Result<f64> {
    let coarse = best_lag(reference, delayed, max_lag);
    if oversample <= 1 {
        return Ok(snr_at_lag(reference, delayed, coarse, settle));
    }
    // The last samples of each interpolated sequence see a truncated kernel.
    let edge = (TAPS_PER_FACTOR / 2) * oversample;
    let mut fine_ref = resample_poly(reference, oversample, 1)?;
    let mut fine_delayed = resample_poly(delayed, oversample, 1)?;
    fine_ref.truncate(fine_ref.len().saturating_sub(edge));
    fine_delayed.truncate(fine_delayed.len().saturating_sub(edge));
    let lo = coarse.saturating_sub(FINE_SEARCH_SPAN) * oversample;
    let hi = (coarse + FINE_SEARCH_SPAN) * oversample;
    let lag = best_lag_in(&fine_ref, &fine_delayed, lo..=hi);
    Ok(snr_at_lag(&fine_ref, &fine_delayed, lag, settle * oversample))
}

fn snr_at_lag(reference: &[f64], delayed: &[f64], lag: usize, settle: usize) -> f64 {
    let start = settle.min(reference.len());
    let delayed = delayed.get(start + lag..).unwrap_or(&[]);
    snr_db(&reference[start..], delayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_zero_crossing_frequency() {
        let fs = 48_000.0;
        let x: Vec<f64> = (0..4_800)
            .map(|n| (2.0 * PI * 1_003.0 * n as f64 / fs + 0.3).sin())
            .collect();
        let f = zero_crossing_frequency(&x, fs).unwrap();
        assert!((f - 1_003.0).abs() < 0.5, "estimated {f}");
        assert!(zero_crossing_frequency(&[0.0; 16], fs).is_none());
    }

    #[test]
    fn test_separation_and_snr() {
        let wanted = vec![1.0, -1.0, 1.0, -1.0];
        let leak = vec![0.1, -0.1, 0.1, -0.1];
        assert!((separation_db(&wanted, &leak) - 20.0).abs() < 1e-9);
        assert!(separation_db(&wanted, &[0.0; 4]).is_infinite());

        let noisy: Vec<f64> = wanted.iter().zip(&leak).map(|(w, l)| w + l).collect();
        assert!((snr_db(&wanted, &noisy) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_aligned_snr_finds_delay() {
        let x: Vec<f64> = (0..2_000).map(|n| (0.05 * n as f64).sin() + (0.31 * n as f64).cos()).collect();
        let mut delayed = vec![0.0; 7];
        delayed.extend(x.iter().map(|v| 0.99 * v));
        assert_eq!(best_lag(&x, &delayed, 20), 7);
        let snr = aligned_snr_db(&x, &delayed, 20, 100);
        assert!((snr - 40.0).abs() < 0.1, "snr {snr}");
    }

    #[test]
    fn test_fine_alignment_resolves_fractional_delay() {
        // Band-limited sequence delayed by 7 + 2/3 samples.
        let tone = |t: f64| (0.05 * t).sin() + 0.5 * (0.9 * t + 0.2).cos();
        let x: Vec<f64> = (0..3_000).map(|n| tone(n as f64)).collect();
        let delayed: Vec<f64> = (0..3_000).map(|n| tone(n as f64 - 7.0 - 2.0 / 3.0)).collect();

        let coarse = aligned_snr_db(&x, &delayed, 20, 300);
        let fine = fine_aligned_snr_db(&x, &delayed, 20, 300, 3).unwrap();
        assert!(coarse < 25.0, "integer lag snr {coarse}");
        assert!(fine > 40.0 && fine > coarse + 20.0, "fractional lag snr {fine}");
        assert_eq!(fine_aligned_snr_db(&x, &x, 20, 300, 1).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_empty_measurements() {
        assert_eq!(rms(&[]), 0.0);
        assert!(zero_crossing_frequency(&[], 1.0).is_none());
        assert_eq!(best_lag(&[], &[], 4), 0);
    }
}
