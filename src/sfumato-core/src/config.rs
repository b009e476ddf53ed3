// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Pipeline configuration record.
//!
//! Every component takes an [`FmConfig`] at construction. The spectral
//! layout (pilot, subcarrier, band edges, channel bandwidth) is derived
//! from a handful of base values by [`FmConfig::band_plan`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Widest PLL loop bandwidth accepted, as a fraction of the MPX rate.
/// Beyond this the second-order loop stops tracking and the NCO runs away.
pub const PLL_MAX_BANDWIDTH_RATIO: f64 = 0.01;

/// Lowest channel SNR accepted. Below this the noise dominates so
/// completely that the run measures nothing.
pub const MIN_SNR_DB: f64 = -60.0;

/// Margin applied to the Carson half-bandwidth when placing the receiver
/// channel filter cutoff.
const CHANNEL_CUTOFF_MARGIN: f64 = 1.25;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmConfig {
    /// Sample-rate graph
    pub rates: RateConfig,
    /// FM modulation parameters
    pub modulation: ModulationConfig,
    /// Stereo multiplex layout and decoder filters
    pub stereo: StereoConfig,
    /// Receiver carrier recovery
    pub carrier: CarrierConfig,
    /// Noise channel
    pub channel: ChannelConfig,
}

/// Audio, multiplex and RF sample rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Audio sample rate (Hz)
    pub audio_hz: u32,
    /// Multiplex (MPX) sample rate (Hz); integer multiple of `audio_hz`
    pub mpx_hz: u32,
    /// RF sample rate (Hz); integer multiple of `mpx_hz`
    pub rf_hz: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            audio_hz: 48_000,
            mpx_hz: 192_000,
            rf_hz: 2_304_000,
        }
    }
}

/// When emphasis filter history is cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmphasisPolicy {
    /// Keep filter history for the lifetime of the pipeline instance.
    #[default]
    Persistent,
    /// Clear filter history at the start of every clip.
    PerClip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulationConfig {
    /// RF carrier frequency (Hz)
    pub carrier_hz: f64,
    /// Peak frequency deviation for a full-scale MPX sample (Hz)
    pub max_deviation_hz: f64,
    /// Pre-/de-emphasis time constant (microseconds)
    pub emphasis_tau_us: f64,
    /// Emphasis state lifetime
    pub emphasis_policy: EmphasisPolicy,
}

impl Default for ModulationConfig {
    fn default() -> Self {
        Self {
            carrier_hz: 250_000.0,
            max_deviation_hz: 75_000.0,
            emphasis_tau_us: 50.0,
            emphasis_policy: EmphasisPolicy::Persistent,
        }
    }
}

impl ModulationConfig {
    pub fn emphasis_tau_s(&self) -> f64 {
        self.emphasis_tau_us * 1e-6
    }
}

/// Mixing weights of the composite signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpxWeights {
    /// Weight of the L+R main channel
    pub main: f64,
    /// Weight of the L-R DSB-SC sub channel
    pub sub: f64,
    /// Weight of the pilot tone
    pub pilot: f64,
}

impl Default for MpxWeights {
    fn default() -> Self {
        Self {
            main: 0.45,
            sub: 0.45,
            pilot: 0.10,
        }
    }
}

impl MpxWeights {
    pub fn total(&self) -> f64 {
        self.main + self.sub + self.pilot
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StereoConfig {
    /// Pilot tone frequency (Hz)
    pub pilot_hz: f64,
    /// Subcarrier frequency as a multiple of the pilot
    pub subcarrier_multiple: u32,
    /// Audio bandwidth carried by the main and sub channels (Hz)
    pub audio_bandwidth_hz: f64,
    /// Butterworth order of the decoder low-pass and band-pass filters
    pub filter_order: usize,
    /// Composite mixing weights
    pub weights: MpxWeights,
    /// Gain applied after coherent demodulation of the sub channel
    pub sub_gain: f64,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            pilot_hz: 19_000.0,
            subcarrier_multiple: 2,
            audio_bandwidth_hz: 15_000.0,
            filter_order: 5,
            weights: MpxWeights::default(),
            sub_gain: 2.0,
        }
    }
}

/// Carrier recovery algorithm used by the receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierStrategy {
    /// Square the filtered pilot and isolate the doubled tone.
    #[default]
    PeakFilter,
    /// Lock a second-order PLL onto the pilot.
    Pll,
}

impl std::fmt::Display for CarrierStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeakFilter => write!(f, "peak_filter"),
            Self::Pll => write!(f, "pll"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PllConfig {
    /// Loop bandwidth (Hz)
    pub bandwidth_hz: f64,
    /// Loop damping factor
    pub damping: f64,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            bandwidth_hz: 100.0,
            damping: 0.707,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierConfig {
    /// Recovery algorithm
    pub strategy: CarrierStrategy,
    /// Quality factor of the pilot and doubled-pilot peak filters
    pub peak_q: f64,
    /// PLL loop parameters
    pub pll: PllConfig,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            strategy: CarrierStrategy::PeakFilter,
            peak_q: 30.0,
            pll: PllConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Target signal-to-noise ratio (dB); `inf` disables noise
    pub snr_db: f64,
    /// Noise generator seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            snr_db: 40.0,
            seed: None,
        }
    }
}

/// Frequencies derived from the base stereo and modulation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPlan {
    pub pilot_hz: f64,
    pub subcarrier_hz: f64,
    /// Upper edge of the L+R main channel, also the decoder low-pass cutoff
    pub main_cutoff_hz: f64,
    pub sub_low_hz: f64,
    pub sub_high_hz: f64,
    /// Carson's rule occupied RF bandwidth
    pub carson_bandwidth_hz: f64,
    /// Cutoff of the receiver's baseband channel filter
    pub channel_cutoff_hz: f64,
}

/// Integer expansion factors between adjacent rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateGraph {
    pub mpx_per_audio: usize,
    pub rf_per_mpx: usize,
}

impl FmConfig {
    pub fn band_plan(&self) -> BandPlan {
        let pilot_hz = self.stereo.pilot_hz;
        let subcarrier_hz = pilot_hz * f64::from(self.stereo.subcarrier_multiple);
        let main_cutoff_hz = self.stereo.audio_bandwidth_hz;
        let sub_high_hz = subcarrier_hz + main_cutoff_hz;
        let carson_bandwidth_hz = 2.0 * (self.modulation.max_deviation_hz + sub_high_hz);
        BandPlan {
            pilot_hz,
            subcarrier_hz,
            main_cutoff_hz,
            sub_low_hz: subcarrier_hz - main_cutoff_hz,
            sub_high_hz,
            carson_bandwidth_hz,
            channel_cutoff_hz: 0.5 * carson_bandwidth_hz * CHANNEL_CUTOFF_MARGIN,
        }
    }

    /// Validated integer factors of the rate graph.
    pub fn rate_graph(&self) -> Result<RateGraph> {
        let RateConfig {
            audio_hz,
            mpx_hz,
            rf_hz,
        } = self.rates;
        if audio_hz == 0 {
            return invalid("[rates].audio_hz must be > 0");
        }
        if mpx_hz == 0 {
            return invalid("[rates].mpx_hz must be > 0");
        }
        if rf_hz == 0 {
            return invalid("[rates].rf_hz must be > 0");
        }
        if mpx_hz % audio_hz != 0 {
            return invalid(format!(
                "[rates].mpx_hz ({mpx_hz}) must be an integer multiple of [rates].audio_hz ({audio_hz})"
            ));
        }
        if rf_hz % mpx_hz != 0 {
            return invalid(format!(
                "[rates].rf_hz ({rf_hz}) must be an integer multiple of [rates].mpx_hz ({mpx_hz})"
            ));
        }
        Ok(RateGraph {
            mpx_per_audio: (mpx_hz / audio_hz) as usize,
            rf_per_mpx: (rf_hz / mpx_hz) as usize,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.rate_graph()?;

        let m = &self.modulation;
        require_positive("[modulation].carrier_hz", m.carrier_hz)?;
        require_positive("[modulation].max_deviation_hz", m.max_deviation_hz)?;
        require_positive("[modulation].emphasis_tau_us", m.emphasis_tau_us)?;

        let s = &self.stereo;
        require_positive("[stereo].pilot_hz", s.pilot_hz)?;
        require_positive("[stereo].audio_bandwidth_hz", s.audio_bandwidth_hz)?;
        require_positive("[stereo].sub_gain", s.sub_gain)?;
        if s.subcarrier_multiple < 2 {
            return invalid("[stereo].subcarrier_multiple must be >= 2");
        }
        if !(1..=10).contains(&s.filter_order) {
            return invalid("[stereo].filter_order must be in 1..=10");
        }
        if s.audio_bandwidth_hz >= s.pilot_hz {
            return invalid("[stereo].audio_bandwidth_hz must be below [stereo].pilot_hz");
        }
        let w = &s.weights;
        for (name, value) in [
            ("[stereo.weights].main", w.main),
            ("[stereo.weights].sub", w.sub),
            ("[stereo.weights].pilot", w.pilot),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be a finite value >= 0"));
            }
        }
        if w.total() > 1.0 + 1e-9 {
            return invalid(format!(
                "[stereo.weights] must sum to at most 1.0 (got {:.3})",
                w.total()
            ));
        }

        let plan = self.band_plan();
        let mpx_nyquist = f64::from(self.rates.mpx_hz) / 2.0;
        if plan.sub_high_hz >= mpx_nyquist {
            return invalid(format!(
                "sub channel upper edge {:.0} Hz must be below the MPX Nyquist frequency {:.0} Hz",
                plan.sub_high_hz, mpx_nyquist
            ));
        }
        let rf_nyquist = f64::from(self.rates.rf_hz) / 2.0;
        if m.carrier_hz + plan.carson_bandwidth_hz / 2.0 >= rf_nyquist {
            return invalid(format!(
                "[modulation].carrier_hz plus the Carson half-bandwidth ({:.0} Hz) must be below the RF Nyquist frequency {:.0} Hz",
                m.carrier_hz + plan.carson_bandwidth_hz / 2.0,
                rf_nyquist
            ));
        }
        let lower_edge = m.carrier_hz - plan.carson_bandwidth_hz / 2.0;
        if lower_edge <= 0.0 {
            return invalid(format!(
                "[modulation].carrier_hz minus the Carson half-bandwidth ({lower_edge:.0} Hz) must be above 0 Hz"
            ));
        }
        // Mixing a real carrier to DC leaves an image at -2 fc.
        let image_edge = 2.0 * m.carrier_hz - plan.carson_bandwidth_hz / 2.0;
        if image_edge <= plan.channel_cutoff_hz {
            return invalid(format!(
                "[modulation].carrier_hz is too low: the mixing image starts at {image_edge:.0} Hz, inside the {:.0} Hz channel filter",
                plan.channel_cutoff_hz
            ));
        }

        let c = &self.carrier;
        require_positive("[carrier].peak_q", c.peak_q)?;
        validate_pll(
            f64::from(self.rates.mpx_hz),
            c.pll.bandwidth_hz,
            c.pll.damping,
        )?;

        let snr = self.channel.snr_db;
        if snr.is_nan() || snr < MIN_SNR_DB {
            return invalid(format!(
                "[channel].snr_db must be a number >= {MIN_SNR_DB} dB (inf for a noiseless channel)"
            ));
        }
        Ok(())
    }
}

/// Check PLL loop parameters against the stable operating range.
pub(crate) fn validate_pll(sample_rate: f64, bandwidth_hz: f64, damping: f64) -> Result<()> {
    require_positive("[carrier.pll].bandwidth_hz", bandwidth_hz)?;
    require_positive("[carrier.pll].damping", damping)?;
    let max_bw = sample_rate * PLL_MAX_BANDWIDTH_RATIO;
    if bandwidth_hz > max_bw {
        return invalid(format!(
            "[carrier.pll].bandwidth_hz ({bandwidth_hz}) exceeds the stable range (<= {max_bw} Hz at {sample_rate} Hz)"
        ));
    }
    Ok(())
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return invalid(format!("{name} must be > 0"));
    }
    Ok(())
}

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::InvalidConfig(msg.into()))
}
