// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Second-order digital PLL that locks onto the 19 kHz pilot and emits
//! the phase-coherent 38 kHz subcarrier.
//!
//! Per sample:
//! ```text
//! error       = x * cos(phase)
//! carrier     = sin(2 * phase)
//! integrator += beta * error
//! phase      += center_step + integrator + alpha * error   (mod 2 pi)
//! ```
//! with `alpha = 2 zeta wn / fs`, `beta = wn^2 / fs^2`, `wn = 2 pi bw`.
//! Stable for `bw` well below `fs` (see [`PLL_MAX_BANDWIDTH_RATIO`]).
//! For a unit-amplitude input the phase detector gain is 1/2, so the
//! effective loop bandwidth is `bw / sqrt(2)`.
//!
//! [`PLL_MAX_BANDWIDTH_RATIO`]: crate::config::PLL_MAX_BANDWIDTH_RATIO

use std::f64::consts::TAU;

use crate::config::validate_pll;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct PilotPll {
    sample_rate: f64,
    center_step: f64,
    alpha: f64,
    beta: f64,
    phase: f64,
    integrator: f64,
}

impl PilotPll {
    pub fn new(sample_rate: f64, pilot_hz: f64, bandwidth_hz: f64, damping: f64) -> Result<Self> {
        validate_pll(sample_rate, bandwidth_hz, damping)?;
        let wn = TAU * bandwidth_hz;
        Ok(Self {
            sample_rate,
            center_step: TAU * pilot_hz / sample_rate,
            alpha: 2.0 * damping * wn / sample_rate,
            beta: wn * wn / (sample_rate * sample_rate),
            phase: 0.0,
            integrator: 0.0,
        })
    }

    /// Advance one sample; returns `(carrier, error)`.
    #[inline]
    pub fn step(&mut self, x: f64) -> (f64, f64) {
        let error = x * self.phase.cos();
        let carrier = (2.0 * self.phase).sin();
        self.integrator += self.beta * error;
        self.phase = (self.phase + self.center_step + self.integrator + self.alpha * error)
            .rem_euclid(TAU);
        (carrier, error)
    }

    /// Regenerated subcarrier for every input sample.
    pub fn process(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.step(x).0).collect()
    }

    /// Like [`process`](Self::process), also returning the phase-detector
    /// error sequence.
    pub fn process_with_error(&mut self, input: &[f64]) -> (Vec<f64>, Vec<f64>) {
        input.iter().map(|&x| self.step(x)).unzip()
    }

    /// NCO phase in `[0, 2 pi)`.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Current NCO frequency (pilot rate, Hz).
    pub fn frequency_hz(&self) -> f64 {
        (self.center_step + self.integrator) * self.sample_rate / TAU
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.integrator = 0.0;
    }
}
