// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Subcarrier regeneration from the received pilot.
//!
//! Both strategies return a unit-amplitude `sin(2 theta)` at the MPX rate,
//! where `sin(theta)` is the received pilot, i.e. in phase with the
//! transmitter's DSB-SC subcarrier.

use std::f64::consts::TAU;

use tracing::{debug, warn};

use crate::buffer::{normalize_peak, peak};
use crate::config::{CarrierStrategy, FmConfig};
use crate::error::Result;
use crate::filter::Biquad;
use crate::pll::PilotPll;

/// Pluggable carrier recovery.
pub trait CarrierRecovery: Send {
    /// Regenerate the subcarrier for a block of MPX samples.
    fn recover_carrier(&mut self, mpx: &[f64]) -> Vec<f64>;
    /// Forget all filter and loop state.
    fn reset(&mut self);
    fn name(&self) -> &'static str;
}

/// Squaring method: isolate the pilot, square it to produce a tone at
/// twice its frequency, isolate that tone and scale it to unit peak.
///
/// Squaring `sin(theta)` yields `-cos(2 theta) / 2`; a two-tap quadrature
/// rotation at the subcarrier frequency turns that into `sin(2 theta)`.
#[derive(Debug, Clone)]
pub struct SquaringRecovery {
    pilot_bp: Biquad,
    doubled_bp: Biquad,
    cos_w: f64,
    sin_w: f64,
    prev: f64,
}

impl SquaringRecovery {
    pub fn new(sample_rate: f64, pilot_hz: f64, subcarrier_hz: f64, q: f64) -> Self {
        let w = TAU * subcarrier_hz / sample_rate;
        Self {
            pilot_bp: Biquad::peak(sample_rate, pilot_hz, q),
            doubled_bp: Biquad::peak(sample_rate, subcarrier_hz, q),
            cos_w: w.cos(),
            sin_w: w.sin(),
            prev: 0.0,
        }
    }
}

impl CarrierRecovery for SquaringRecovery {
    fn recover_carrier(&mut self, mpx: &[f64]) -> Vec<f64> {
        let mut carrier: Vec<f64> = mpx
            .iter()
            .map(|&x| {
                let pilot = self.pilot_bp.process_sample(x);
                let doubled = self.doubled_bp.process_sample(pilot * pilot);
                // -cos(2t) sampled at n and n-1 gives sin(2t) at n.
                let rotated = (doubled * self.cos_w - self.prev) / self.sin_w;
                self.prev = doubled;
                rotated
            })
            .collect();
        if !carrier.is_empty() && peak(&carrier) == 0.0 {
            warn!("squaring recovery: no pilot energy, carrier left silent");
            return carrier;
        }
        normalize_peak(&mut carrier, 1.0);
        carrier
    }

    fn reset(&mut self) {
        self.pilot_bp.reset();
        self.doubled_bp.reset();
        self.prev = 0.0;
    }

    fn name(&self) -> &'static str {
        "peak_filter"
    }
}

/// PLL method: isolate and level the pilot, then track it with
/// [`PilotPll`].
#[derive(Debug, Clone)]
pub struct PllRecovery {
    pilot_bp: Biquad,
    pll: PilotPll,
}

impl PllRecovery {
    pub fn new(
        sample_rate: f64,
        pilot_hz: f64,
        q: f64,
        bandwidth_hz: f64,
        damping: f64,
    ) -> Result<Self> {
        Ok(Self {
            pilot_bp: Biquad::peak(sample_rate, pilot_hz, q),
            pll: PilotPll::new(sample_rate, pilot_hz, bandwidth_hz, damping)?,
        })
    }

    pub fn pll(&self) -> &PilotPll {
        &self.pll
    }
}

impl CarrierRecovery for PllRecovery {
    fn recover_carrier(&mut self, mpx: &[f64]) -> Vec<f64> {
        let mut pilot = self.pilot_bp.process(mpx);
        normalize_peak(&mut pilot, 1.0);
        let carrier = self.pll.process(&pilot);
        debug!(
            "pll recovery: {} samples, nco at {:.2} Hz",
            carrier.len(),
            self.pll.frequency_hz()
        );
        carrier
    }

    fn reset(&mut self) {
        self.pilot_bp.reset();
        self.pll.reset();
    }

    fn name(&self) -> &'static str {
        "pll"
    }
}

/// Build the strategy selected by `[carrier].strategy`.
pub fn build_carrier_recovery(config: &FmConfig) -> Result<Box<dyn CarrierRecovery>> {
    let fs = f64::from(config.rates.mpx_hz);
    let plan = config.band_plan();
    let c = &config.carrier;
    Ok(match c.strategy {
        CarrierStrategy::PeakFilter => Box::new(SquaringRecovery::new(
            fs,
            plan.pilot_hz,
            plan.subcarrier_hz,
            c.peak_q,
        )),
        CarrierStrategy::Pll => Box::new(PllRecovery::new(
            fs,
            plan.pilot_hz,
            c.peak_q,
            c.pll.bandwidth_hz,
            c.pll.damping,
        )?),
    })
}
