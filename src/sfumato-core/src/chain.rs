// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! End-to-end broadcast simulation: transmitter, noise channel, receiver.

use tracing::{debug, info};

use crate::buffer::{RealSignal, StereoBuffer};
use crate::channel::NoiseChannel;
use crate::config::FmConfig;
use crate::error::Result;
use crate::measure::{fine_aligned_snr_db, snr_db};
use crate::rx::Receiver;
use crate::tx::Transmitter;

/// Everything one [`FmChain::run`] produces.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// Recovered stereo audio, same length and rate as the input
    pub audio: StereoBuffer,
    /// Composite as built by the transmitter
    pub tx_mpx: RealSignal,
    /// Composite as recovered by the receiver front end
    pub rx_mpx: RealSignal,
    /// Regenerated subcarrier
    pub carrier: RealSignal,
    /// SNR actually realised on the RF waveform (dB)
    pub rf_snr_db: f64,
}

/// Longest transmitter-to-receiver MPX delay searched when aligning.
const MPX_MAX_LAG: usize = 512;

pub struct FmChain {
    config: FmConfig,
    transmitter: Transmitter,
    channel: NoiseChannel,
    receiver: Receiver,
}

impl FmChain {
    pub fn new(config: FmConfig) -> Result<Self> {
        config.validate()?;
        let transmitter = Transmitter::new(&config)?;
        let receiver = Receiver::new(&config)?;
        let channel = NoiseChannel::new(config.channel.seed);
        info!(
            "FM chain: {} Hz audio, {} Hz MPX, {} Hz RF, SNR {} dB, carrier recovery {}",
            config.rates.audio_hz,
            config.rates.mpx_hz,
            config.rates.rf_hz,
            config.channel.snr_db,
            receiver.carrier_strategy()
        );
        Ok(Self {
            config,
            transmitter,
            channel,
            receiver,
        })
    }

    pub fn config(&self) -> &FmConfig {
        &self.config
    }

    pub fn run(&mut self, audio: &StereoBuffer) -> Result<ChainOutput> {
        let tx_mpx = self.transmitter.mpx(audio)?;
        let rf = self.transmitter.modulate_mpx(&tx_mpx)?;
        let noisy = self.channel.add_awgn(&rf.samples, self.config.channel.snr_db);
        let rf_snr_db = snr_db(&rf.samples, &noisy);
        debug!("chain: RF SNR {:.2} dB over {} samples", rf_snr_db, rf.len());

        let noisy = RealSignal::new(noisy, rf.sample_rate);
        let rx_mpx = self.receiver.process(&noisy)?;
        let carrier = self.receiver.recover_carrier(&rx_mpx)?;
        let audio = self.receiver.stereo_decode(&rx_mpx, &carrier)?;
        Ok(ChainOutput {
            audio,
            tx_mpx,
            rx_mpx,
            carrier,
            rf_snr_db,
        })
    }

    /// SNR of the recovered composite against the transmitted one, in dB.
    ///
    /// The receiver delay is a whole number of RF samples but not of MPX
    /// samples, so the alignment is resolved on the RF grid. The first
    /// quarter of the run is skipped as filter start-up.
    pub fn mpx_snr_db(&self, output: &ChainOutput) -> Result<f64> {
        let graph = self.config.rate_graph()?;
        fine_aligned_snr_db(
            &output.tx_mpx.samples,
            &output.rx_mpx.samples,
            MPX_MAX_LAG,
            output.tx_mpx.len() / 4,
            graph.rf_per_mpx,
        )
    }

    /// Return every stage to its initial state. The noise generator keeps
    /// its position.
    pub fn reset(&mut self) {
        self.transmitter.reset();
        self.receiver.reset();
    }
}
