//! Sample-format and level normalization.
//!
//! Upstream speed processing can hand back WAV files with 64-bit float
//! samples, which the standard reader refuses and which corrupt a mix if
//! blindly reinterpreted. The raw reader here parses the RIFF layout
//! directly, clamps amplitudes to [-1, 1] and requantizes into the
//! pipeline's canonical f32 representation.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::decode::downmix;
use crate::waveform::Waveform;

const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Read a WAV whose sample width exceeds what hound handles (observed:
/// 64-bit IEEE float). Returns downmixed mono samples plus the sample rate.
pub fn load_wide_float_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        bail!("{} is not a RIFF/WAVE file", path.display());
    }

    let mut format_code = 0u16;
    let mut channels = 1usize;
    let mut sample_rate = 0u32;
    let mut bits_per_sample = 0u16;
    let mut data: Option<&[u8]> = None;

    // Walk the chunk list; chunks are 16-bit word aligned.
    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes([
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]) as usize;
        let body_start = pos + 8;
        let body_end = (body_start + size).min(bytes.len());
        let body = &bytes[body_start..body_end];

        match id {
            b"fmt " => {
                if body.len() < 16 {
                    bail!("malformed fmt chunk in {}", path.display());
                }
                format_code = u16::from_le_bytes([body[0], body[1]]);
                channels = u16::from_le_bytes([body[2], body[3]]) as usize;
                sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                bits_per_sample = u16::from_le_bytes([body[14], body[15]]);
            }
            b"data" => {
                data = Some(body);
            }
            _ => {}
        }

        pos = body_start + size + (size & 1);
    }

    let data = data.ok_or_else(|| anyhow::anyhow!("no data chunk in {}", path.display()))?;

    if format_code != WAVE_FORMAT_IEEE_FLOAT || bits_per_sample != 64 {
        bail!(
            "unexpected raw WAV layout in {} (format {}, {} bits)",
            path.display(),
            format_code,
            bits_per_sample
        );
    }
    if sample_rate == 0 || channels == 0 {
        bail!("malformed fmt chunk in {}", path.display());
    }

    let samples: Vec<f32> = data
        .chunks_exact(8)
        .map(|b| {
            let v = f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
            v.clamp(-1.0, 1.0) as f32
        })
        .collect();

    warn!(
        path = %path.display(),
        samples = samples.len(),
        "requantized 64-bit float WAV to pipeline format"
    );

    Ok((downmix(samples, channels), sample_rate))
}

/// Maximum gain applied by level normalization, either direction.
const MAX_GAIN_DB: f32 = 20.0;

/// Gains below this are not worth the multiply pass.
const MIN_GAIN_DB: f32 = 0.5;

/// Nudge a segment toward the target loudness with a single RMS gain.
///
/// Near-silent input is left alone: boosting what is essentially noise
/// floor by +20 dB helps nobody.
pub fn normalize_levels(wave: &mut Waveform, target_dbfs: f32) {
    let current = wave.rms_dbfs();
    if current <= -100.0 {
        return;
    }
    let gain = (target_dbfs - current).clamp(-MAX_GAIN_DB, MAX_GAIN_DB);
    if gain.abs() < MIN_GAIN_DB {
        return;
    }
    wave.apply_gain_db(gain);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_f64_wav(path: &Path, samples: &[f64], sample_rate: u32) {
        let mut out = Vec::new();
        let data_size = (samples.len() * 8) as u32;
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_size).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&3u16.to_le_bytes()); // IEEE float
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 8).to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&64u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        std::fs::write(path, out).unwrap();
    }

    #[test]
    fn test_load_wide_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.wav");
        write_f64_wav(&path, &[0.0, 0.5, -0.5, 1.5, -1.5], 44100);

        let (samples, sr) = load_wide_float_wav(&path).unwrap();
        assert_eq!(sr, 44100);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[1], 0.5);
        // Out-of-range amplitudes are clamped, not wrapped
        assert_eq!(samples[3], 1.0);
        assert_eq!(samples[4], -1.0);
    }

    #[test]
    fn test_load_wide_float_rejects_non_riff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"not a wav at all").unwrap();
        assert!(load_wide_float_wav(&path).is_err());
    }

    #[test]
    fn test_normalize_levels_moves_toward_target() {
        let mut wave = Waveform::new(vec![0.01; 44100], 44100);
        let before = wave.rms_dbfs();
        normalize_levels(&mut wave, -20.0);
        let after = wave.rms_dbfs();
        assert!(after > before);
        assert!((after - (-20.0)).abs() < 1.0 || (after - before - MAX_GAIN_DB).abs() < 1.0);
    }

    #[test]
    fn test_normalize_levels_skips_silence() {
        let mut wave = Waveform::silence(100.0, 44100);
        normalize_levels(&mut wave, -20.0);
        assert!(wave.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_normalize_levels_gain_is_clamped() {
        // RMS around -80 dBFS, target -20: wants +60 dB, gets +20
        let mut wave = Waveform::new(vec![0.0001; 44100], 44100);
        let before = wave.rms_dbfs();
        normalize_levels(&mut wave, -20.0);
        assert!((wave.rms_dbfs() - before - MAX_GAIN_DB).abs() < 0.5);
    }
}
