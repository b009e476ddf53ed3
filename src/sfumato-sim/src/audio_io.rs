// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! WAV file input and output.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{info, warn};

use sfumato_core::resample::resample_rational;
use sfumato_core::{DynResult, StereoBuffer};

/// Read a PCM or float WAV file as stereo at `audio_rate`.
///
/// Mono files become L = R; extra channels beyond the first two are
/// dropped. Input whose peak exceeds full scale is scaled down to 1.0.
pub fn read_wav(path: &Path, audio_rate: u32) -> DynResult<StereoBuffer> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    info!(
        "Read WAV {}: {} Hz, {} channels, {} bits {:?}",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    let samples: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            if !(1..=32).contains(&spec.bits_per_sample) {
                return Err(format!("Unsupported bit depth: {}", spec.bits_per_sample).into());
            }
            let scale = 1.0 / f64::from(1u32 << (spec.bits_per_sample - 1));
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| f64::from(v) * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mut audio = deinterleave(&samples, spec.channels, spec.sample_rate)?;
    if audio.sample_rate() != audio_rate {
        info!(
            "Resampling input from {} Hz to {} Hz",
            audio.sample_rate(),
            audio_rate
        );
        let (left, right) = audio.into_channels();
        audio = StereoBuffer::new(
            resample_rational(&left, spec.sample_rate, audio_rate)?,
            resample_rational(&right, spec.sample_rate, audio_rate)?,
            audio_rate,
        )?;
    }
    if audio.peak() > 1.0 {
        warn!("Input peaks at {:.3}, scaling to full scale", audio.peak());
        audio.normalize_peak(1.0);
    }
    Ok(audio)
}

fn deinterleave(samples: &[f64], channels: u16, sample_rate: u32) -> DynResult<StereoBuffer> {
    match channels {
        0 => Err("WAV file reports zero channels".into()),
        1 => Ok(StereoBuffer::mono(samples.to_vec(), sample_rate)),
        2 => Ok(StereoBuffer::from_interleaved(samples, sample_rate)),
        n => {
            let frames: Vec<f64> = samples
                .chunks_exact(usize::from(n))
                .flat_map(|frame| [frame[0], frame[1]])
                .collect();
            Ok(StereoBuffer::from_interleaved(&frames, sample_rate))
        }
    }
}

/// Write 16-bit PCM stereo, clamping to full scale.
pub fn write_wav(path: &Path, audio: &StereoBuffer) -> DynResult<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for sample in audio.to_interleaved() {
        writer.write_sample(to_i16(sample))?;
    }
    writer.finalize()?;
    info!(
        "Wrote {} stereo frames at {} Hz to {}",
        audio.len(),
        audio.sample_rate(),
        path.display()
    );
    Ok(())
}

fn to_i16(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sfumato-sim-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn write_mono_i16(path: &Path, rate: u32, samples: &[i16]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_to_i16_clamps() {
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(1.0), 32767);
        assert_eq!(to_i16(2.0), 32767);
        assert_eq!(to_i16(-3.0), -32767);
    }

    #[test]
    fn test_stereo_round_trip() {
        let path = temp_path("round_trip.wav");
        let audio =
            StereoBuffer::new(vec![0.5, -0.25, 0.0], vec![-0.5, 0.25, 1.0], 48_000).unwrap();
        write_wav(&path, &audio).unwrap();
        let back = read_wav(&path, 48_000).unwrap();
        assert_eq!(back.len(), 3);
        for (a, b) in back.left().iter().zip(audio.left()) {
            assert!((a - b).abs() < 1e-4);
        }
        for (a, b) in back.right().iter().zip(audio.right()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mono_input_duplicated() {
        let path = temp_path("mono.wav");
        write_mono_i16(&path, 48_000, &[16_384, -16_384, 0]);
        let audio = read_wav(&path, 48_000).unwrap();
        assert_eq!(audio.left(), audio.right());
        assert_eq!(audio.left(), &[0.5, -0.5, 0.0]);
    }

    #[test]
    fn test_input_resampled_to_audio_rate() {
        let path = temp_path("resample.wav");
        let samples: Vec<i16> = (0..4_410)
            .map(|i| (8_000.0 * (std::f64::consts::TAU * 500.0 * i as f64 / 44_100.0).sin()) as i16)
            .collect();
        write_mono_i16(&path, 44_100, &samples);
        let audio = read_wav(&path, 48_000).unwrap();
        assert_eq!(audio.sample_rate(), 48_000);
        assert_eq!(audio.len(), 4_800);
    }

    #[test]
    fn test_multichannel_keeps_first_two() {
        let audio = deinterleave(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3, 48_000).unwrap();
        assert_eq!(audio.left(), &[0.1, 0.4]);
        assert_eq!(audio.right(), &[0.2, 0.5]);
        assert!(deinterleave(&[0.0], 0, 48_000).is_err());
    }
}
