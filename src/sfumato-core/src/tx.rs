// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! FM-stereo transmitter: stereo audio to composite MPX to real RF.

use std::f64::consts::TAU;

use tracing::debug;

use crate::buffer::{RealSignal, StereoBuffer};
use crate::config::{EmphasisPolicy, FmConfig, MpxWeights};
use crate::emphasis::EmphasisFilter;
use crate::error::{check_rate, Result};
use crate::resample::FirInterpolator;

/// Pre-emphasis and audio-to-MPX upsampling for one channel.
#[derive(Debug, Clone)]
struct InputChannel {
    emphasis: EmphasisFilter,
    upsampler: FirInterpolator,
}

impl InputChannel {
    fn process(&mut self, audio: &[f64]) -> Vec<f64> {
        let emphasized = self.emphasis.pre_emphasis(audio);
        self.upsampler.process(&emphasized)
    }

    fn reset(&mut self) {
        self.emphasis.reset();
        self.upsampler.reset();
    }
}

#[derive(Debug, Clone)]
pub struct Transmitter {
    audio_rate: u32,
    mpx_rate: u32,
    rf_rate: u32,
    left: InputChannel,
    right: InputChannel,
    policy: EmphasisPolicy,
    weights: MpxWeights,
    /// Pilot cycles per MPX sample
    pilot_step: f64,
    subcarrier_multiple: f64,
    rf_upsampler: FirInterpolator,
    /// Carrier cycles per RF sample
    carrier_step: f64,
    /// Deviation cycles per RF sample for a unit MPX sample
    deviation_step: f64,
    mpx_index: u64,
    rf_index: u64,
    /// Accumulated FM phase in cycles, kept in [0, 1)
    fm_phase: f64,
}

impl Transmitter {
    pub fn new(config: &FmConfig) -> Result<Self> {
        config.validate()?;
        let graph = config.rate_graph()?;
        let audio_fs = f64::from(config.rates.audio_hz);
        let rf_fs = f64::from(config.rates.rf_hz);
        let input = || -> Result<InputChannel> {
            Ok(InputChannel {
                emphasis: EmphasisFilter::new(audio_fs, config.modulation.emphasis_tau_s())?,
                upsampler: FirInterpolator::new(graph.mpx_per_audio)?,
            })
        };
        debug!(
            "transmitter: {} Hz -> {} Hz -> {} Hz, fc {} Hz, deviation {} Hz",
            config.rates.audio_hz,
            config.rates.mpx_hz,
            config.rates.rf_hz,
            config.modulation.carrier_hz,
            config.modulation.max_deviation_hz
        );
        Ok(Self {
            audio_rate: config.rates.audio_hz,
            mpx_rate: config.rates.mpx_hz,
            rf_rate: config.rates.rf_hz,
            left: input()?,
            right: input()?,
            policy: config.modulation.emphasis_policy,
            weights: config.stereo.weights.clone(),
            pilot_step: config.stereo.pilot_hz / f64::from(config.rates.mpx_hz),
            subcarrier_multiple: f64::from(config.stereo.subcarrier_multiple),
            rf_upsampler: FirInterpolator::new(graph.rf_per_mpx)?,
            carrier_step: config.modulation.carrier_hz / rf_fs,
            deviation_step: config.modulation.max_deviation_hz / rf_fs,
            mpx_index: 0,
            rf_index: 0,
            fm_phase: 0.0,
        })
    }

    /// Build the composite baseband:
    /// `main * (L + R) + pilot * sin(theta) + sub * (L - R) * sin(k theta)`.
    ///
    /// The subcarrier phase is the pilot phase times the integer multiple, so
    /// the two stay coherent for any run length.
    pub fn mpx(&mut self, audio: &StereoBuffer) -> Result<RealSignal> {
        check_rate("transmitter", self.audio_rate, audio.sample_rate())?;
        if self.policy == EmphasisPolicy::PerClip {
            self.left.emphasis.reset();
            self.right.emphasis.reset();
        }
        let left = self.left.process(audio.left());
        let right = self.right.process(audio.right());

        let w = &self.weights;
        let samples: Vec<f64> = left
            .iter()
            .zip(&right)
            .enumerate()
            .map(|(i, (&l, &r))| {
                let n = self.mpx_index + i as u64;
                let cycles = (self.pilot_step * n as f64).fract();
                let pilot = (TAU * cycles).sin();
                let sub = (TAU * (self.subcarrier_multiple * cycles).fract()).sin();
                w.main * (l + r) + w.pilot * pilot + w.sub * (l - r) * sub
            })
            .collect();
        self.mpx_index += samples.len() as u64;
        debug!(
            "transmitter: {} audio samples -> {} MPX samples",
            audio.len(),
            samples.len()
        );
        Ok(RealSignal::new(samples, self.mpx_rate))
    }

    /// Upsample MPX to the RF rate and frequency-modulate the carrier:
    /// `cos(2 pi fc t + 2 pi kf sum(m) / fs)`.
    pub fn modulate_mpx(&mut self, mpx: &RealSignal) -> Result<RealSignal> {
        check_rate("transmitter (mpx)", self.mpx_rate, mpx.sample_rate)?;
        let baseband = self.rf_upsampler.process(&mpx.samples);
        let samples: Vec<f64> = baseband
            .iter()
            .enumerate()
            .map(|(i, &m)| {
                let n = self.rf_index + i as u64;
                self.fm_phase = (self.fm_phase + self.deviation_step * m).rem_euclid(1.0);
                let carrier = (self.carrier_step * n as f64).fract();
                (TAU * (carrier + self.fm_phase)).cos()
            })
            .collect();
        self.rf_index += samples.len() as u64;
        debug!(
            "transmitter: {} MPX samples -> {} RF samples",
            mpx.len(),
            samples.len()
        );
        Ok(RealSignal::new(samples, self.rf_rate))
    }

    /// Full transmit path: audio in, RF out.
    pub fn modulate(&mut self, audio: &StereoBuffer) -> Result<RealSignal> {
        let mpx = self.mpx(audio)?;
        self.modulate_mpx(&mpx)
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.rf_upsampler.reset();
        self.mpx_index = 0;
        self.rf_index = 0;
        self.fm_phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::spectrum::{band_power, power_spectrum};

    fn left_tone(n: usize, freq: f64, amp: f64) -> StereoBuffer {
        let left = (0..n)
            .map(|i| amp * (TAU * freq * i as f64 / 48_000.0).sin())
            .collect();
        StereoBuffer::new(left, vec![0.0; n], 48_000).unwrap()
    }

    #[test]
    fn test_output_length_follows_rate_graph() {
        let mut tx = Transmitter::new(&FmConfig::default()).unwrap();
        let audio = left_tone(480, 1_000.0, 0.5);
        let mpx = tx.mpx(&audio).unwrap();
        assert_eq!(mpx.len(), 480 * 4);
        assert_eq!(mpx.sample_rate, 192_000);
        let rf = tx.modulate_mpx(&mpx).unwrap();
        assert_eq!(rf.len(), 480 * 48);
        assert_eq!(rf.sample_rate, 2_304_000);
        assert!(rf.samples.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let mut tx = Transmitter::new(&FmConfig::default()).unwrap();
        let empty = StereoBuffer::new(Vec::new(), Vec::new(), 48_000).unwrap();
        assert!(tx.modulate(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_wrong_input_rate() {
        let mut tx = Transmitter::new(&FmConfig::default()).unwrap();
        let audio = StereoBuffer::mono(vec![0.0; 10], 44_100);
        assert_eq!(
            tx.modulate(&audio),
            Err(Error::RateMismatch {
                stage: "transmitter",
                expected: 48_000,
                actual: 44_100
            })
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut cfg = FmConfig::default();
        cfg.rates.rf_hz = 2_000_000;
        assert!(matches!(
            Transmitter::new(&cfg),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_mpx_spectral_layout() {
        let mut tx = Transmitter::new(&FmConfig::default()).unwrap();
        let mpx = tx.mpx(&left_tone(9_600, 1_000.0, 0.5)).unwrap();
        let spectrum = power_spectrum(&mpx.samples[2_000..], 8_192);
        let fs = 192_000.0;

        let main = band_power(&spectrum, fs, 500.0, 1_500.0);
        let pilot = band_power(&spectrum, fs, 18_800.0, 19_200.0);
        let lsb = band_power(&spectrum, fs, 36_500.0, 37_500.0);
        let usb = band_power(&spectrum, fs, 38_500.0, 39_500.0);
        let carrier = band_power(&spectrum, fs, 37_800.0, 38_200.0);
        let gap = band_power(&spectrum, fs, 16_000.0, 18_000.0);

        // 0.1 pilot -> 0.005 power.
        assert!((pilot - 0.005).abs() < 0.001, "pilot power {pilot}");
        assert!(main > 0.01, "main power {main}");
        assert!(lsb > main / 8.0 && usb > main / 8.0, "sidebands {lsb} {usb}");
        assert!(carrier < pilot / 100.0, "suppressed carrier {carrier}");
        assert!(gap < pilot / 100.0, "guard band {gap}");
    }

    #[test]
    fn test_rf_occupies_carson_bandwidth() {
        let cfg = FmConfig::default();
        let plan = cfg.band_plan();
        let mut tx = Transmitter::new(&cfg).unwrap();
        let rf = tx.modulate(&left_tone(2_400, 1_000.0, 0.9)).unwrap();
        let spectrum = power_spectrum(&rf.samples, 16_384);
        let fs = 2_304_000.0;
        let fc = cfg.modulation.carrier_hz;
        let half = plan.carson_bandwidth_hz / 2.0;

        let total = band_power(&spectrum, fs, 0.0, fs / 2.0);
        let inside = band_power(&spectrum, fs, fc - half, fc + half);
        assert!((total - 0.5).abs() < 0.02, "constant envelope power {total}");
        assert!(inside / total > 0.97, "in-band fraction {}", inside / total);
    }

    #[test]
    fn test_chunked_modulation_matches_whole() {
        let audio = left_tone(600, 3_000.0, 0.7);
        let mut whole = Transmitter::new(&FmConfig::default()).unwrap();
        let expected = whole.modulate(&audio).unwrap();

        let mut split = Transmitter::new(&FmConfig::default()).unwrap();
        let (l, r) = audio.into_channels();
        let first = StereoBuffer::new(l[..250].to_vec(), r[..250].to_vec(), 48_000).unwrap();
        let second = StereoBuffer::new(l[250..].to_vec(), r[250..].to_vec(), 48_000).unwrap();
        let mut got = split.modulate(&first).unwrap().samples;
        got.extend(split.modulate(&second).unwrap().samples);

        assert_eq!(got.len(), expected.len());
        for (a, b) in got.iter().zip(&expected.samples) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reset_restarts_pilot_and_phase() {
        let audio = left_tone(100, 1_000.0, 0.5);
        let mut tx = Transmitter::new(&FmConfig::default()).unwrap();
        let first = tx.modulate(&audio).unwrap();
        tx.reset();
        assert_eq!(tx.modulate(&audio).unwrap(), first);
    }

    #[test]
    fn test_per_clip_policy_restarts_pre_emphasis() {
        let audio = left_tone(200, 5_000.0, 0.5);
        let mut cfg = FmConfig::default();
        cfg.modulation.emphasis_policy = EmphasisPolicy::PerClip;

        let mut per_clip = Transmitter::new(&cfg).unwrap();
        let mut persistent = Transmitter::new(&FmConfig::default()).unwrap();
        per_clip.mpx(&audio).unwrap();
        persistent.mpx(&audio).unwrap();
        let a = per_clip.mpx(&audio).unwrap();
        let b = persistent.mpx(&audio).unwrap();
        // The first emphasised sample differs: the persistent filter still
        // remembers the previous clip's last sample.
        assert_ne!(a, b);
    }
}
