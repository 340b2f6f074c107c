//! Audio file loading.
//!
//! WAV goes through hound (fast path); MP3, FLAC and OGG go through
//! symphonia. Whatever the source, the result is mono f32 at the working
//! sample rate.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

use crate::normalize;
use crate::waveform::Waveform;

/// Load an audio file as mono f32 at its native sample rate.
pub fn load_native(path: &Path) -> Result<Waveform> {
    let (samples, sample_rate) = if path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
    {
        load_wav(path)?
    } else {
        load_with_symphonia(path)?
    };
    Ok(Waveform::new(samples, sample_rate))
}

/// Load an audio file as mono f32 at `target_sr`.
pub fn load(path: &Path, target_sr: u32) -> Result<Waveform> {
    let (samples, sample_rate) = if path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
    {
        load_wav(path)?
    } else {
        load_with_symphonia(path)?
    };

    let samples = if sample_rate != target_sr {
        resample(&samples, sample_rate, target_sr)?
    } else {
        samples
    };

    Ok(Waveform::new(samples, target_sr))
}

/// Load a WAV file via hound, returning interleaved-downmixed mono samples.
///
/// Sample widths hound understands (integer up to 32 bits, 32-bit float)
/// pass straight through. Wider formats — 64-bit float WAVs show up from
/// some speed-processing round-trips — fall back to the raw reader in
/// `normalize`, which clamps and requantizes.
fn load_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = match hound::WavReader::open(path) {
        Ok(r) => r,
        Err(e @ (hound::Error::Unsupported | hound::Error::FormatError(_))) => {
            warn!(
                path = %path.display(),
                error = %e,
                "WAV not supported by standard reader, trying raw float reader"
            );
            return normalize::load_wide_float_wav(path);
        }
        Err(e) => return Err(e).with_context(|| format!("failed to open {}", path.display())),
    };

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("failed to read float samples from {}", path.display()))?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| format!("failed to read PCM samples from {}", path.display()))?
        }
    };

    Ok((downmix(samples, channels), sample_rate))
}

/// Load MP3/FLAC/OGG (or anything else symphonia can probe) as mono f32.
fn load_with_symphonia(path: &Path) -> Result<(Vec<f32>, u32)> {
    let src = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .with_context(|| format!("unsupported audio format: {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("no supported audio track in {}", path.display()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow::anyhow!("unknown sample rate in {}", path.display()))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    let track_id = track.id;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .context("unsupported codec")?;

    let mut all_samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(anyhow::anyhow!("error reading packet: {e}")),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    let duration = decoded.capacity() as u64;
                    sample_buf = Some(SampleBuffer::new(duration, spec));
                }
                if let Some(ref mut buf) = sample_buf {
                    buf.copy_interleaved_ref(decoded);
                    all_samples.extend_from_slice(buf.samples());
                }
            }
            // Skip corrupted packets, keep decoding
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(anyhow::anyhow!("decode error: {e}")),
        }
    }

    Ok((downmix(all_samples, channels), sample_rate))
}

/// Average interleaved channels down to mono.
pub(crate) fn downmix(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect()
}

/// Sinc-interpolated sample rate conversion (mono).
pub fn resample(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>> {
    if from_sr == to_sr || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let sinc_len = 256;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_sr as f64 / from_sr as f64,
        2.0,
        params,
        samples.len(),
        1,
    )
    .context("failed to create resampler")?;

    let input = vec![samples.to_vec()];
    let output = resampler.process(&input, None).context("resampling failed")?;

    Ok(output.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, samples: &[f32], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * 0.5)
            .collect();
        write_test_wav(&path, &samples, 44100);

        let wave = load(&path, 44100).unwrap();
        assert_eq!(wave.sample_rate, 44100);
        assert_eq!(wave.len(), 4410);
        // 16-bit quantization error only
        assert!((wave.samples[100] - samples[100]).abs() < 1e-3);
    }

    #[test]
    fn test_load_resamples_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone22k.wav");
        let samples: Vec<f32> = (0..22050).map(|i| (i as f32 * 0.01).sin() * 0.3).collect();
        write_test_wav(&path, &samples, 22050);

        let wave = load(&path, 44100).unwrap();
        assert_eq!(wave.sample_rate, 44100);
        // One second of audio either way, within resampler edge effects
        assert!((wave.duration_seconds() - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_downmix_stereo() {
        let interleaved = vec![1.0, 0.0, 0.5, 0.5, 0.0, 1.0];
        let mono = downmix(interleaved, 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 * 0.001).collect();
        assert_eq!(resample(&samples, 44100, 44100).unwrap(), samples);
    }
}
