// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Quadrature mixing and phase-based FM discrimination.

use std::f64::consts::{PI, TAU};

use num_complex::Complex64;

/// Multiply real RF by `exp(-j 2 pi fc n / fs)`, with `n` counted from
/// `start_index` so consecutive blocks share one oscillator.
pub fn mix_to_baseband(
    rf: &[f64],
    carrier_hz: f64,
    sample_rate: f64,
    start_index: u64,
) -> Vec<Complex64> {
    let cycles_per_sample = carrier_hz / sample_rate;
    rf.iter()
        .enumerate()
        .map(|(i, &x)| {
            let n = start_index + i as u64;
            let phase = TAU * (cycles_per_sample * n as f64).fract();
            Complex64::from_polar(x, -phase)
        })
        .collect()
}

/// Remove `2 pi` jumps between consecutive phase samples.
///
/// A step of exactly `+pi` is kept as `+pi`; a step of `-pi` becomes `+pi`.
pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(phase.len());
    let Some(&first) = phase.first() else {
        return out;
    };
    out.push(first);
    let mut offset = 0.0;
    for pair in phase.windows(2) {
        let step = pair[1] - pair[0];
        let mut wrapped = (step + PI).rem_euclid(TAU) - PI;
        if wrapped == -PI && step > 0.0 {
            wrapped = PI;
        }
        offset += wrapped - step;
        out.push(pair[1] + offset);
    }
    out
}

/// First difference with the first sample duplicated, so the output has
/// the input's length and starts at zero.
pub fn differentiate(samples: &[f64]) -> Vec<f64> {
    let Some(&first) = samples.first() else {
        return Vec::new();
    };
    std::iter::once(first)
        .chain(samples.iter().copied())
        .collect::<Vec<_>>()
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .collect()
}

/// Angle, unwrap and differentiate, carrying the last angle across calls.
///
/// Output is the instantaneous frequency in radians per sample.
#[derive(Debug, Clone, Default)]
pub struct FmDiscriminator {
    last_angle: Option<f64>,
}

impl FmDiscriminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, iq: &[Complex64]) -> Vec<f64> {
        if iq.is_empty() {
            return Vec::new();
        }
        let mut angles = Vec::with_capacity(iq.len() + 1);
        angles.extend(self.last_angle);
        let skip = angles.len();
        angles.extend(iq.iter().map(|z| z.arg()));
        self.last_angle = angles.last().copied();
        let freq = differentiate(&unwrap_phase(&angles));
        freq.into_iter().skip(skip).collect()
    }

    pub fn reset(&mut self) {
        self.last_angle = None;
    }
}
