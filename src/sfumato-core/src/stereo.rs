// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Stereo matrix decoder: MPX plus regenerated subcarrier in, L/R audio out.

use std::collections::VecDeque;

use tracing::debug;

use crate::buffer::{RealSignal, StereoBuffer};
use crate::config::{EmphasisPolicy, FmConfig};
use crate::emphasis::EmphasisFilter;
use crate::error::{check_len, check_rate, Result};
use crate::filter::SosFilter;
use crate::resample::FirDecimator;

/// Fixed integer delay.
#[derive(Debug, Clone)]
struct DelayLine {
    line: VecDeque<f64>,
}

impl DelayLine {
    fn new(samples: usize) -> Self {
        Self {
            line: VecDeque::from(vec![0.0; samples]),
        }
    }

    fn process_sample(&mut self, x: f64) -> f64 {
        self.line.push_back(x);
        self.line.pop_front().unwrap_or(x)
    }

    fn len(&self) -> usize {
        self.line.len()
    }

    fn reset(&mut self) {
        self.line.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Per-channel output stage: decimation to the audio rate, then de-emphasis.
#[derive(Debug, Clone)]
struct OutputChannel {
    decimator: FirDecimator<f64>,
    emphasis: EmphasisFilter,
}

impl OutputChannel {
    fn process(&mut self, mpx_rate_audio: &[f64]) -> Vec<f64> {
        let audio = self.decimator.process(mpx_rate_audio);
        self.emphasis.de_emphasis(&audio)
    }
}

#[derive(Debug, Clone)]
pub struct StereoDecoder {
    mpx_rate: u32,
    audio_rate: u32,
    main_lp: SosFilter,
    main_delay: DelayLine,
    sub_bp: SosFilter,
    sub_lp: SosFilter,
    sub_gain: f64,
    left: OutputChannel,
    right: OutputChannel,
    policy: EmphasisPolicy,
}

impl StereoDecoder {
    pub fn new(config: &FmConfig) -> Result<Self> {
        config.validate()?;
        let graph = config.rate_graph()?;
        let plan = config.band_plan();
        let fs = f64::from(config.rates.mpx_hz);
        let order = config.stereo.filter_order;

        let sub_bp =
            SosFilter::butterworth_bandpass(order, plan.sub_low_hz, plan.sub_high_hz, fs);
        // Line the L+R path up with the band-pass delay around the subcarrier.
        let delay = sub_bp
            .group_delay(plan.subcarrier_hz, fs)
            .round()
            .max(0.0) as usize;

        let output = || -> Result<OutputChannel> {
            Ok(OutputChannel {
                decimator: FirDecimator::new(graph.mpx_per_audio)?,
                emphasis: EmphasisFilter::new(
                    f64::from(config.rates.audio_hz),
                    config.modulation.emphasis_tau_s(),
                )?,
            })
        };

        debug!(
            "stereo decoder: order {} main < {} Hz, sub {}-{} Hz, main delay {} samples",
            order, plan.main_cutoff_hz, plan.sub_low_hz, plan.sub_high_hz, delay
        );
        Ok(Self {
            mpx_rate: config.rates.mpx_hz,
            audio_rate: config.rates.audio_hz,
            main_lp: SosFilter::butterworth_lowpass(order, plan.main_cutoff_hz, fs),
            main_delay: DelayLine::new(delay),
            sub_bp,
            sub_lp: SosFilter::butterworth_lowpass(order, plan.main_cutoff_hz, fs),
            sub_gain: config.stereo.sub_gain,
            left: output()?,
            right: output()?,
            policy: config.modulation.emphasis_policy,
        })
    }

    /// Samples of delay applied to the L+R path.
    pub fn main_delay_samples(&self) -> usize {
        self.main_delay.len()
    }

    /// Decode one block. `mpx` and `carrier` must be at the MPX rate and of
    /// equal length; the result is at the audio rate.
    pub fn decode(&mut self, mpx: &RealSignal, carrier: &RealSignal) -> Result<StereoBuffer> {
        check_rate("stereo decode (mpx)", self.mpx_rate, mpx.sample_rate)?;
        check_rate("stereo decode (carrier)", self.mpx_rate, carrier.sample_rate)?;
        check_len(mpx.len(), carrier.len())?;
        if self.policy == EmphasisPolicy::PerClip {
            self.left.emphasis.reset();
            self.right.emphasis.reset();
        }

        let mut left = Vec::with_capacity(mpx.len());
        let mut right = Vec::with_capacity(mpx.len());
        for (&x, &c) in mpx.samples.iter().zip(&carrier.samples) {
            let main = self.main_delay.process_sample(self.main_lp.process_sample(x));
            let band = self.sub_bp.process_sample(x);
            let sub = self.sub_lp.process_sample(band * c * self.sub_gain);
            left.push(main + sub);
            right.push(main - sub);
        }

        let left = self.left.process(&left);
        let right = self.right.process(&right);
        debug!(
            "stereo decode: {} MPX samples -> {} audio samples",
            mpx.len(),
            left.len()
        );
        StereoBuffer::new(left, right, self.audio_rate)
    }

    pub fn reset(&mut self) {
        self.main_lp.reset();
        self.main_delay.reset();
        self.sub_bp.reset();
        self.sub_lp.reset();
        for channel in [&mut self.left, &mut self.right] {
            channel.decimator.reset();
            channel.emphasis.reset();
        }
    }
}
