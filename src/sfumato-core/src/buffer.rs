// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rate-tagged sample buffers exchanged between pipeline stages.

use num_complex::Complex64;
use tracing::warn;

use crate::error::{check_len, Result};

/// A sample sequence paired with the rate it was produced at.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal<T> {
    pub samples: Vec<T>,
    pub sample_rate: u32,
}

/// Real-valued audio, MPX or RF samples.
pub type RealSignal = Signal<f64>;
/// Complex baseband samples.
pub type IqSignal = Signal<Complex64>;

impl<T> Signal<T> {
    pub fn new(samples: Vec<T>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Planar stereo audio. Both channels always have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    left: Vec<f64>,
    right: Vec<f64>,
    sample_rate: u32,
}

impl StereoBuffer {
    pub fn new(left: Vec<f64>, right: Vec<f64>, sample_rate: u32) -> Result<Self> {
        check_len(left.len(), right.len())?;
        Ok(Self {
            left,
            right,
            sample_rate,
        })
    }

    /// Mono source, carried as L = R.
    pub fn mono(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            right: samples.clone(),
            left: samples,
            sample_rate,
        }
    }

    /// Split `[l0, r0, l1, r1, ...]`. A trailing unpaired sample is dropped.
    pub fn from_interleaved(samples: &[f64], sample_rate: u32) -> Self {
        let (left, right) = samples
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .unzip();
        Self {
            left,
            right,
            sample_rate,
        }
    }

    pub fn to_interleaved(&self) -> Vec<f64> {
        self.left
            .iter()
            .zip(&self.right)
            .flat_map(|(&l, &r)| [l, r])
            .collect()
    }

    pub fn left(&self) -> &[f64] {
        &self.left
    }

    pub fn right(&self) -> &[f64] {
        &self.right
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn into_channels(self) -> (Vec<f64>, Vec<f64>) {
        (self.left, self.right)
    }

    /// Largest absolute sample over both channels.
    pub fn peak(&self) -> f64 {
        peak(&self.left).max(peak(&self.right))
    }

    /// Scale both channels by the same gain so the louder one peaks at `target`.
    /// Returns the applied gain; silence is left untouched.
    pub fn normalize_peak(&mut self, target: f64) -> f64 {
        let current = self.peak();
        if current <= 0.0 {
            warn!("normalize_peak: silent buffer left unchanged");
            return 1.0;
        }
        let gain = target / current;
        for sample in self.left.iter_mut().chain(self.right.iter_mut()) {
            *sample *= gain;
        }
        gain
    }
}

pub fn peak(samples: &[f64]) -> f64 {
    samples.iter().fold(0.0_f64, |acc, &s| acc.max(s.abs()))
}

/// Scale `samples` in place so the largest magnitude equals `target`.
///
/// Returns the gain applied. An all-zero (or empty) buffer is left
/// unchanged and reports a gain of 1.0.
pub fn normalize_peak(samples: &mut [f64], target: f64) -> f64 {
    let current = peak(samples);
    if current <= 0.0 {
        return 1.0;
    }
    let gain = target / current;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
    gain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_round_trip() {
        let stereo = StereoBuffer::from_interleaved(&[0.1, -0.1, 0.2, -0.2, 0.3], 48_000);
        assert_eq!(stereo.len(), 2);
        assert_eq!(stereo.left(), &[0.1, 0.2]);
        assert_eq!(stereo.right(), &[-0.1, -0.2]);
        assert_eq!(stereo.to_interleaved(), vec![0.1, -0.1, 0.2, -0.2]);
    }

    #[test]
    fn test_mono_duplicates_channel() {
        let stereo = StereoBuffer::mono(vec![0.5, -0.25], 48_000);
        assert_eq!(stereo.left(), stereo.right());
    }

    #[test]
    fn test_new_rejects_unequal_channels() {
        assert!(StereoBuffer::new(vec![0.0; 3], vec![0.0; 2], 48_000).is_err());
    }

    #[test]
    fn test_normalize_peak_scales_to_target() {
        let mut samples = vec![0.1, -0.4, 0.2];
        let gain = normalize_peak(&mut samples, 1.0);
        assert!((gain - 2.5).abs() < 1e-12);
        assert!((samples[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_peak_leaves_silence_unchanged() {
        let mut samples = vec![0.0; 8];
        assert_eq!(normalize_peak(&mut samples, 1.0), 1.0);
        assert!(samples.iter().all(|s| *s == 0.0));

        let mut empty: Vec<f64> = Vec::new();
        assert_eq!(normalize_peak(&mut empty, 0.9), 1.0);
    }

    #[test]
    fn test_stereo_normalize_uses_common_gain() {
        let mut stereo = StereoBuffer::new(vec![0.5, 0.0], vec![0.0, -0.25], 48_000).unwrap();
        stereo.normalize_peak(0.9);
        assert!((stereo.left()[0] - 0.9).abs() < 1e-12);
        assert!((stereo.right()[1] + 0.45).abs() < 1e-12);
    }
}
