// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Averaged power spectra for checking band occupancy and aliasing.

use std::f64::consts::PI;

use rustfft::num_complex::Complex as FftComplex;
use rustfft::FftPlanner;

/// One-sided power spectrum (Welch average, Hann window, 50 % overlap).
///
/// Bin `k` covers `k * fs / fft_size`. Scaled so the bins sum to the mean
/// square of the input: a unit-amplitude sine reads 0.5 in total.
pub fn power_spectrum(samples: &[f64], fft_size: usize) -> Vec<f64> {
    let fft_size = fft_size.max(2);
    let bins = fft_size / 2 + 1;
    if samples.is_empty() {
        return vec![0.0; bins];
    }

    let hann: Vec<f64> = (0..fft_size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / fft_size as f64).cos()))
        .collect();
    let window_power: f64 = hann.iter().map(|w| w * w).sum();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(fft_size);

    let hop = fft_size / 2;
    let mut acc = vec![0.0; bins];
    let mut segments = 0usize;
    let mut start = 0usize;
    loop {
        let mut buf: Vec<FftComplex<f64>> = (0..fft_size)
            .map(|i| {
                let x = samples.get(start + i).copied().unwrap_or(0.0);
                FftComplex::new(x * hann[i], 0.0)
            })
            .collect();
        fft.process(&mut buf);
        for (k, slot) in acc.iter_mut().enumerate() {
            let mut p = buf[k].norm_sqr() / (window_power * fft_size as f64);
            if k != 0 && !(fft_size % 2 == 0 && k == fft_size / 2) {
                p *= 2.0;
            }
            *slot += p;
        }
        segments += 1;
        start += hop;
        if start + fft_size > samples.len() {
            break;
        }
    }

    for slot in &mut acc {
        *slot /= segments as f64;
    }
    acc
}

/// Total power of the bins whose centre lies in `[low_hz, high_hz]`.
pub fn band_power(spectrum: &[f64], sample_rate: f64, low_hz: f64, high_hz: f64) -> f64 {
    if spectrum.len() < 2 {
        return 0.0;
    }
    let fft_size = (spectrum.len() - 1) * 2;
    let bin_hz = sample_rate / fft_size as f64;
    spectrum
        .iter()
        .enumerate()
        .filter(|(k, _)| {
            let f = *k as f64 * bin_hz;
            f >= low_hz && f <= high_hz
        })
        .map(|(_, p)| p)
        .sum()
}

/// Frequency of the strongest bin, refined by parabolic interpolation.
pub fn peak_frequency(spectrum: &[f64], sample_rate: f64) -> f64 {
    if spectrum.len() < 3 {
        return 0.0;
    }
    let fft_size = (spectrum.len() - 1) * 2;
    let bin_hz = sample_rate / fft_size as f64;
    let (k, _) = spectrum
        .iter()
        .enumerate()
        .skip(1)
        .fold((1, f64::MIN), |best, (k, &p)| if p > best.1 { (k, p) } else { best });
    if k + 1 >= spectrum.len() {
        return k as f64 * bin_hz;
    }
    let (a, b, c) = (
        spectrum[k - 1].max(1e-300).ln(),
        spectrum[k].max(1e-300).ln(),
        spectrum[k + 1].max(1e-300).ln(),
    );
    let denom = a - 2.0 * b + c;
    let offset = if denom.abs() > 1e-12 {
        0.5 * (a - c) / denom
    } else {
        0.0
    };
    (k as f64 + offset) * bin_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_sine_power_is_half() {
        let fs = 48_000.0;
        let spectrum = power_spectrum(&tone(3_000.0, fs, 16_384), 1024);
        let total: f64 = spectrum.iter().sum();
        assert!((total - 0.5).abs() < 0.01, "total {total}");
        let near = band_power(&spectrum, fs, 2_800.0, 3_200.0);
        assert!(near / total > 0.99);
    }

    #[test]
    fn test_peak_frequency_interpolates() {
        let fs = 192_000.0;
        let spectrum = power_spectrum(&tone(19_030.0, fs, 65_536), 8192);
        let f = peak_frequency(&spectrum, fs);
        assert!((f - 19_030.0).abs() < 5.0, "peak at {f}");
    }

    #[test]
    fn test_empty_input() {
        let spectrum = power_spectrum(&[], 64);
        assert_eq!(spectrum.len(), 33);
        assert_eq!(band_power(&spectrum, 1_000.0, 0.0, 500.0), 0.0);
    }
}
