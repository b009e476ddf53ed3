// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! FM-stereo receiver.
//!
//! Front end: mix to baseband, channel filter, phase discriminator, FIR
//! decimation to the MPX rate. The regenerated subcarrier comes from the
//! configured [`CarrierRecovery`] strategy and feeds the [`StereoDecoder`].

use std::f64::consts::TAU;

use tracing::debug;

use crate::buffer::{RealSignal, StereoBuffer};
use crate::carrier::{build_carrier_recovery, CarrierRecovery};
use crate::config::FmConfig;
use crate::demod::{mix_to_baseband, FmDiscriminator};
use crate::error::{check_rate, Result};
use crate::resample::{ComplexFir, FirDecimator};
use crate::stereo::StereoDecoder;

/// Length of the complex channel filter applied right after mixing.
pub const CHANNEL_FILTER_TAPS: usize = 63;

pub struct Receiver {
    rf_rate: u32,
    mpx_rate: u32,
    carrier_hz: f64,
    rf_index: u64,
    channel_filter: ComplexFir,
    discriminator: FmDiscriminator,
    /// rad/sample -> unit MPX
    demod_gain: f64,
    decimator: FirDecimator<f64>,
    carrier: Box<dyn CarrierRecovery>,
    decoder: StereoDecoder,
}

impl Receiver {
    pub fn new(config: &FmConfig) -> Result<Self> {
        config.validate()?;
        let graph = config.rate_graph()?;
        let plan = config.band_plan();
        let rf_fs = f64::from(config.rates.rf_hz);
        let carrier = build_carrier_recovery(config)?;
        debug!(
            "receiver: channel filter {} taps at {} Hz, decimate {}, carrier recovery {}",
            CHANNEL_FILTER_TAPS,
            plan.channel_cutoff_hz,
            graph.rf_per_mpx,
            carrier.name()
        );
        Ok(Self {
            rf_rate: config.rates.rf_hz,
            mpx_rate: config.rates.mpx_hz,
            carrier_hz: config.modulation.carrier_hz,
            rf_index: 0,
            channel_filter: ComplexFir::lowpass(plan.channel_cutoff_hz, rf_fs, CHANNEL_FILTER_TAPS),
            discriminator: FmDiscriminator::new(),
            demod_gain: rf_fs / (TAU * config.modulation.max_deviation_hz),
            decimator: FirDecimator::new(graph.rf_per_mpx)?,
            carrier,
            decoder: StereoDecoder::new(config)?,
        })
    }

    /// Name of the active carrier-recovery strategy.
    pub fn carrier_strategy(&self) -> &'static str {
        self.carrier.name()
    }

    /// RF in, MPX out.
    pub fn process(&mut self, rf: &RealSignal) -> Result<RealSignal> {
        check_rate("receiver", self.rf_rate, rf.sample_rate)?;
        let baseband = mix_to_baseband(
            &rf.samples,
            self.carrier_hz,
            f64::from(self.rf_rate),
            self.rf_index,
        );
        self.rf_index += rf.len() as u64;
        let baseband = self.channel_filter.process(&baseband);
        let mut freq = self.discriminator.process(&baseband);
        for v in &mut freq {
            *v *= self.demod_gain;
        }
        let mpx = self.decimator.process(&freq);
        debug!(
            "receiver: {} RF samples -> {} MPX samples",
            rf.len(),
            mpx.len()
        );
        Ok(RealSignal::new(mpx, self.mpx_rate))
    }

    pub fn recover_carrier(&mut self, mpx: &RealSignal) -> Result<RealSignal> {
        check_rate("carrier recovery", self.mpx_rate, mpx.sample_rate)?;
        let carrier = self.carrier.recover_carrier(&mpx.samples);
        Ok(RealSignal::new(carrier, self.mpx_rate))
    }

    pub fn stereo_decode(&mut self, mpx: &RealSignal, carrier: &RealSignal) -> Result<StereoBuffer> {
        self.decoder.decode(mpx, carrier)
    }

    /// Front end, carrier recovery and stereo decode in one call.
    pub fn receive(&mut self, rf: &RealSignal) -> Result<StereoBuffer> {
        let mpx = self.process(rf)?;
        let carrier = self.recover_carrier(&mpx)?;
        self.stereo_decode(&mpx, &carrier)
    }

    pub fn reset(&mut self) {
        self.rf_index = 0;
        self.channel_filter.reset();
        self.discriminator.reset();
        self.decimator.reset();
        self.carrier.reset();
        self.decoder.reset();
    }
}
