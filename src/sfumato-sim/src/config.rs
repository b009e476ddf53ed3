// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration for sfumato-sim.
//!
//! Loaded from the `[sfumato-sim]` section of `sfumato.toml`. The pipeline
//! tables (`rates`, `modulation`, `stereo`, `carrier`, `channel`) sit
//! directly under that section.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sfumato_app::{ConfigError, ConfigFile};
use sfumato_core::FmConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Built-in test tone, used when no input file is given
    pub tone: ToneConfig,
    /// Recovered audio output
    pub output: OutputConfig,
    /// Broadcast chain parameters
    #[serde(flatten)]
    pub fm: FmConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Left channel tone frequency (Hz)
    pub left_hz: f64,
    /// Right channel tone frequency (Hz); silent when unset
    pub right_hz: Option<f64>,
    /// Peak amplitude of each tone
    pub amplitude: f64,
    /// Clip length (seconds)
    pub duration_secs: f64,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            left_hz: 1_000.0,
            right_hz: None,
            amplitude: 0.5,
            duration_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Scale the recovered audio so its peak equals `gain`
    pub normalize: bool,
    /// Target peak when normalising
    pub gain: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            gain: 0.9,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        let nyquist = f64::from(self.fm.rates.audio_hz) / 2.0;
        let t = &self.tone;
        for (name, freq) in [("left_hz", Some(t.left_hz)), ("right_hz", t.right_hz)] {
            if let Some(freq) = freq {
                if !freq.is_finite() || freq < 0.0 || freq >= nyquist {
                    return Err(format!(
                        "[tone].{name} must be in 0..{nyquist} Hz (got {freq})"
                    ));
                }
            }
        }
        if !(t.amplitude > 0.0 && t.amplitude <= 1.0) {
            return Err("[tone].amplitude must be in (0, 1]".to_string());
        }
        if !(t.duration_secs.is_finite() && t.duration_secs > 0.0) {
            return Err("[tone].duration_secs must be > 0".to_string());
        }

        if !(self.output.gain > 0.0 && self.output.gain <= 1.0) {
            return Err("[output].gain must be in (0, 1]".to_string());
        }

        self.fm.validate().map_err(|e| e.to_string())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        <Self as ConfigFile>::load_from_file(path)
    }

    /// Explicit path when given, else the default search; defaults when
    /// nothing is found.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        <Self as ConfigFile>::load(explicit)
    }

    /// Example configuration under the `[sfumato-sim]` header.
    pub fn example_toml() -> String {
        #[derive(Serialize)]
        struct Wrapper {
            #[serde(rename = "sfumato-sim")]
            inner: SimConfig,
        }
        let mut example = SimConfig::default();
        example.general.log_level = Some("info".to_string());
        example.fm.channel.seed = Some(1);
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for SimConfig {
    fn section_key() -> &'static str {
        "sfumato-sim"
    }
}
