// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Broadcast pre-/de-emphasis.
//!
//! Pre-emphasis is the differencing shelf `b = [1 + a, -a]` with
//! `a = tau * fs`; de-emphasis is the one-pole low-pass
//! `b = [1 - p], a = [1, -p]` with `p = exp(-1 / (fs * tau))`. Both have
//! unity gain at DC, so a constant input passes through unchanged once
//! the first sample is past.

use crate::error::{Error, Result};
use crate::filter::IirFilter;

#[derive(Debug, Clone)]
pub struct EmphasisFilter {
    pre: IirFilter,
    de: IirFilter,
}

impl EmphasisFilter {
    pub fn new(sample_rate: f64, tau_s: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(Error::InvalidConfig(
                "emphasis sample rate must be > 0".into(),
            ));
        }
        if !(tau_s.is_finite() && tau_s > 0.0) {
            return Err(Error::InvalidConfig(
                "emphasis time constant must be > 0".into(),
            ));
        }
        let alpha = tau_s * sample_rate;
        let p = (-1.0 / (sample_rate * tau_s)).exp();
        Ok(Self {
            pre: IirFilter::new(&[1.0 + alpha, -alpha], &[1.0])?,
            de: IirFilter::new(&[1.0 - p], &[1.0, -p])?,
        })
    }

    pub fn pre_emphasis(&mut self, input: &[f64]) -> Vec<f64> {
        self.pre.process(input)
    }

    pub fn de_emphasis(&mut self, input: &[f64]) -> Vec<f64> {
        self.de.process(input)
    }

    /// Clear both delay lines.
    pub fn reset(&mut self) {
        self.pre.reset();
        self.de.reset();
    }
}
