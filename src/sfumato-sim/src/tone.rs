// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f64::consts::TAU;

use sfumato_core::{Result, StereoBuffer};

use crate::config::ToneConfig;

fn sine(freq: f64, amplitude: f64, n: usize, rate: u32) -> Vec<f64> {
    let step = freq / f64::from(rate);
    (0..n)
        .map(|i| amplitude * (TAU * (step * i as f64).fract()).sin())
        .collect()
}

/// Stereo test clip: a tone on the left and, optionally, another on the
/// right. An unset right tone leaves that channel silent.
pub fn stereo_test_tone(tone: &ToneConfig, rate: u32) -> Result<StereoBuffer> {
    let n = (tone.duration_secs * f64::from(rate)).round() as usize;
    let left = sine(tone.left_hz, tone.amplitude, n, rate);
    let right = match tone.right_hz {
        Some(freq) => sine(freq, tone.amplitude, n, rate),
        None => vec![0.0; n],
    };
    StereoBuffer::new(left, right, rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfumato_core::measure::{rms, zero_crossing_frequency};

    #[test]
    fn test_left_only_tone() {
        let tone = ToneConfig {
            left_hz: 1_000.0,
            right_hz: None,
            amplitude: 0.5,
            duration_secs: 0.1,
        };
        let clip = stereo_test_tone(&tone, 48_000).unwrap();
        assert_eq!(clip.len(), 4_800);
        assert!(clip.right().iter().all(|&v| v == 0.0));
        assert!((clip.peak() - 0.5).abs() < 1e-3);
        let freq = zero_crossing_frequency(clip.left(), 48_000.0).unwrap();
        assert!((freq - 1_000.0).abs() < 1.0);
    }

    #[test]
    fn test_two_tones() {
        let tone = ToneConfig {
            left_hz: 440.0,
            right_hz: Some(660.0),
            amplitude: 0.3,
            duration_secs: 0.5,
        };
        let clip = stereo_test_tone(&tone, 48_000).unwrap();
        let r = zero_crossing_frequency(clip.right(), 48_000.0).unwrap();
        assert!((r - 660.0).abs() < 1.0);
        assert!((rms(clip.left()) - 0.3 / 2f64.sqrt()).abs() < 1e-3);
    }
}
