// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod audio_io;
mod config;
mod tone;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use sfumato_app::init_logging;
use sfumato_core::measure::{rms, separation_db};
use sfumato_core::spectrum::{peak_frequency, power_spectrum};
use sfumato_core::{CarrierStrategy, ChainOutput, DynResult, EmphasisPolicy, FmChain, StereoBuffer};

use config::SimConfig;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - FM stereo broadcast chain simulator");
const REPORT_FFT_SIZE: usize = 8_192;

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Input WAV file; a stereo test tone is generated when omitted
    #[arg(short = 'i', long = "input", value_name = "WAV")]
    input: Option<PathBuf>,
    /// Output WAV file for the recovered audio
    #[arg(short = 'o', long = "output", value_name = "WAV")]
    output: Option<PathBuf>,
    /// Channel SNR in dB ("inf" for a noiseless channel)
    #[arg(short = 's', long = "snr")]
    snr: Option<f64>,
    /// Carrier recovery strategy
    #[arg(long = "strategy", value_enum)]
    strategy: Option<StrategyKind>,
    /// Noise generator seed
    #[arg(long = "seed")]
    seed: Option<u64>,
    /// Emphasis state lifetime
    #[arg(long = "emphasis-policy", value_enum)]
    emphasis_policy: Option<EmphasisKind>,
    /// Test tone frequency on the left channel (Hz)
    #[arg(long = "left-hz")]
    left_hz: Option<f64>,
    /// Test tone frequency on the right channel (Hz)
    #[arg(long = "right-hz")]
    right_hz: Option<f64>,
    /// Test tone peak amplitude
    #[arg(long = "amplitude")]
    amplitude: Option<f64>,
    /// Test tone duration (seconds)
    #[arg(short = 'd', long = "duration")]
    duration: Option<f64>,
    /// Write the recovered audio without peak normalisation
    #[arg(long = "no-normalize")]
    no_normalize: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyKind {
    PeakFilter,
    Pll,
}

impl From<StrategyKind> for CarrierStrategy {
    fn from(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::PeakFilter => CarrierStrategy::PeakFilter,
            StrategyKind::Pll => CarrierStrategy::Pll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmphasisKind {
    Persistent,
    PerClip,
}

impl From<EmphasisKind> for EmphasisPolicy {
    fn from(kind: EmphasisKind) -> Self {
        match kind {
            EmphasisKind::Persistent => EmphasisPolicy::Persistent,
            EmphasisKind::PerClip => EmphasisPolicy::PerClip,
        }
    }
}

/// Fold command-line overrides into the loaded configuration.
fn apply_cli(cli: &Cli, cfg: &mut SimConfig) {
    if let Some(snr) = cli.snr {
        cfg.fm.channel.snr_db = snr;
    }
    if let Some(strategy) = cli.strategy {
        cfg.fm.carrier.strategy = strategy.into();
    }
    if let Some(seed) = cli.seed {
        cfg.fm.channel.seed = Some(seed);
    }
    if let Some(policy) = cli.emphasis_policy {
        cfg.fm.modulation.emphasis_policy = policy.into();
    }
    if let Some(left_hz) = cli.left_hz {
        cfg.tone.left_hz = left_hz;
    }
    if let Some(right_hz) = cli.right_hz {
        cfg.tone.right_hz = Some(right_hz);
    }
    if let Some(amplitude) = cli.amplitude {
        cfg.tone.amplitude = amplitude;
    }
    if let Some(duration) = cli.duration {
        cfg.tone.duration_secs = duration;
    }
    if cli.no_normalize {
        cfg.output.normalize = false;
    }
}

fn dominant_frequency(samples: &[f64], rate: u32) -> Option<f64> {
    if rms(samples) <= 0.0 {
        return None;
    }
    let fft_size = REPORT_FFT_SIZE.min(samples.len()) & !1;
    let spectrum = power_spectrum(samples, fft_size);
    Some(peak_frequency(&spectrum, f64::from(rate)))
}

fn report(chain: &FmChain, output: &ChainOutput) {
    // Skip filter and PLL start-up.
    let settle = output.audio.len() / 4;
    let left = &output.audio.left()[settle..];
    let right = &output.audio.right()[settle..];
    let rate = output.audio.sample_rate();

    info!("RF SNR after channel: {:.2} dB", output.rf_snr_db);
    match chain.mpx_snr_db(output) {
        Ok(mpx_snr) => info!("MPX SNR after demodulation: {:.2} dB", mpx_snr),
        Err(e) => warn!("MPX SNR unavailable: {}", e),
    }
    info!(
        "Left/right level difference: {:.2} dB",
        separation_db(left, right)
    );
    match dominant_frequency(left, rate) {
        Some(freq) => info!("Dominant left frequency: {:.1} Hz", freq),
        None => info!("Left channel is silent"),
    }
    if let Some(freq) = dominant_frequency(right, rate) {
        info!("Dominant right frequency: {:.1} Hz", freq);
    }
}

fn load_input(cli: &Cli, cfg: &SimConfig) -> DynResult<StereoBuffer> {
    let rate = cfg.fm.rates.audio_hz;
    match cli.input {
        Some(ref path) => audio_io::read_wav(path, rate),
        None => {
            let t = &cfg.tone;
            info!(
                "Generating {:.2} s test tone: left {} Hz, right {}",
                t.duration_secs,
                t.left_hz,
                t.right_hz
                    .map(|f| format!("{f} Hz"))
                    .unwrap_or_else(|| "silent".to_string())
            );
            Ok(tone::stereo_test_tone(t, rate)?)
        }
    }
}

fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", SimConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = SimConfig::load(cli.config.as_deref())?;
    apply_cli(&cli, &mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let input = load_input(&cli, &cfg)?;
    if input.is_empty() {
        warn!("Input is empty, nothing to simulate");
    }
    info!(
        "Input: {} frames at {} Hz ({:.2} s)",
        input.len(),
        input.sample_rate(),
        input.len() as f64 / f64::from(input.sample_rate())
    );

    let mut chain = FmChain::new(cfg.fm.clone())?;
    let mut output = chain.run(&input)?;
    if !output.audio.is_empty() {
        report(&chain, &output);
    }

    if cfg.output.normalize {
        let gain = output.audio.normalize_peak(cfg.output.gain);
        info!("Output normalised to peak {} (gain {:.3})", cfg.output.gain, gain);
    }
    info!("Output peak: {:.3}", output.audio.peak());

    match cli.output {
        Some(ref path) => audio_io::write_wav(path, &output.audio)?,
        None => info!("No --output given, recovered audio discarded"),
    }
    Ok(())
}
