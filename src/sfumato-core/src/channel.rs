// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Additive white Gaussian noise channel.

use num_complex::Complex64;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, warn};

use crate::measure::mean_square;

/// Noise power that puts a signal of power `signal_power` at `snr_db`.
pub fn noise_power(signal_power: f64, snr_db: f64) -> f64 {
    signal_power / 10f64.powf(snr_db / 10.0)
}

/// AWGN injector with its own seeded generator.
pub struct NoiseChannel {
    rng: ChaCha8Rng,
}

impl NoiseChannel {
    /// `Some(seed)` gives a reproducible noise sequence; `None` seeds from
    /// the operating system.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng }
    }

    /// Gaussian source with the given standard deviation, or `None` when
    /// no noise should be added.
    fn normal(std_dev: f64) -> Option<Normal<f64>> {
        if std_dev.is_infinite() {
            warn!("noise power overflows, no noise added; SNR is below the usable range");
            return None;
        }
        if !(std_dev > 0.0) {
            return None;
        }
        match Normal::new(0.0, std_dev) {
            Ok(normal) => Some(normal),
            Err(e) => {
                warn!("noise generator rejected std_dev {}: {}", std_dev, e);
                None
            }
        }
    }

    /// Add real Gaussian noise so the result sits at `snr_db` relative to
    /// the mean power of `signal`.
    ///
    /// Empty or silent input and an infinite SNR return the input as is.
    /// So does an SNR low enough to overflow the noise power; pipeline
    /// configs below [`crate::config::MIN_SNR_DB`] are rejected before they get here.
    pub fn add_awgn(&mut self, signal: &[f64], snr_db: f64) -> Vec<f64> {
        let ps = mean_square(signal);
        let pn = noise_power(ps, snr_db);
        let Some(normal) = Self::normal(pn.sqrt()) else {
            debug!("add_awgn: no noise added (Ps={:.3e}, snr={} dB)", ps, snr_db);
            return signal.to_vec();
        };
        debug!(
            "add_awgn: {} samples, Ps={:.3e}, Pn={:.3e}",
            signal.len(),
            ps,
            pn
        );
        signal
            .iter()
            .map(|&x| x + normal.sample(&mut self.rng))
            .collect()
    }

    /// Complex variant: circularly-symmetric noise, total power `Pn` split
    /// equally between the in-phase and quadrature components.
    pub fn add_awgn_complex(&mut self, signal: &[Complex64], snr_db: f64) -> Vec<Complex64> {
        let ps = if signal.is_empty() {
            0.0
        } else {
            signal.iter().map(|z| z.norm_sqr()).sum::<f64>() / signal.len() as f64
        };
        let pn = noise_power(ps, snr_db);
        let Some(normal) = Self::normal((pn / 2.0).sqrt()) else {
            return signal.to_vec();
        };
        signal
            .iter()
            .map(|&z| {
                let re = normal.sample(&mut self.rng);
                let im = normal.sample(&mut self.rng);
                z + Complex64::new(re, im)
            })
            .collect()
    }
}
