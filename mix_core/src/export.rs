//! Waveform export.
//!
//! WAV is written directly as 16-bit PCM. MP3 (192 kbps CBR) and FLAC
//! (compression level 5) are transcoded from the finished WAV with the
//! ffmpeg CLI, the same interop strategy the speed backends use. Every
//! write lands on a temp path first and is renamed into place only on full
//! success, so a failed run never leaves a partial file behind.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use base64::Engine;
use tracing::debug;

use crate::config::ExportFormat;
use crate::error::{MixError, MixResult};
use crate::waveform::Waveform;

/// MP3 bitrate, fixed.
const MP3_BITRATE: &str = "192k";

/// FLAC compression level, fixed.
const FLAC_COMPRESSION: &str = "5";

/// Write 16-bit PCM WAV.
pub fn write_wav(path: &Path, wave: &Waveform) -> MixResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: wave.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| MixError::processing(format!("failed to create {}: {e}", path.display())))?;

    for &s in &wave.samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(v)
            .map_err(|e| MixError::processing(format!("wav write failed: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| MixError::processing(format!("wav finalize failed: {e}")))?;
    Ok(())
}

/// Export one container format into `out_dir` as `<stem>.<ext>`.
///
/// `master_wav` is the already-written working WAV inside the run's temp
/// directory; MP3/FLAC transcode from it rather than re-quantizing the
/// in-memory buffer a second time.
pub fn export_format(
    wave: &Waveform,
    master_wav: &Path,
    out_dir: &Path,
    stem: &str,
    format: ExportFormat,
) -> MixResult<PathBuf> {
    let final_path = out_dir.join(format!("{stem}.{}", format.extension()));
    // Temp name inside the destination directory keeps the final rename on
    // one filesystem.
    let tmp_path = out_dir.join(format!(".{stem}.{}.part", format.extension()));

    match format {
        ExportFormat::Wav => write_wav(&tmp_path, wave)?,
        ExportFormat::Mp3 => transcode(master_wav, &tmp_path, &["-f", "mp3", "-b:a", MP3_BITRATE])?,
        ExportFormat::Flac => transcode(
            master_wav,
            &tmp_path,
            &["-f", "flac", "-compression_level", FLAC_COMPRESSION],
        )?,
    }

    if let Err(e) = std::fs::rename(&tmp_path, &final_path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(MixError::processing(format!(
            "failed to persist {}: {e}",
            final_path.display()
        )));
    }

    debug!(path = %final_path.display(), "export complete");
    Ok(final_path)
}

fn transcode(input: &Path, output: &Path, codec_args: &[&str]) -> MixResult<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(input)
        .args(codec_args)
        .arg("-y")
        .arg(output);

    let result = cmd
        .output()
        .context("failed to spawn ffmpeg; mp3/flac export requires it on PATH")
        .map_err(MixError::from)?;

    if !result.status.success() {
        // Leave nothing half-written behind
        let _ = std::fs::remove_file(output);
        return Err(MixError::processing(format!(
            "ffmpeg transcode to {} failed: {}",
            output.display(),
            String::from_utf8_lossy(&result.stderr).trim()
        )));
    }
    Ok(())
}

/// Encode a waveform as an in-memory 16-bit PCM WAV and base64 it, for
/// inline API responses.
pub fn encode_wav_base64(samples: &[f32], sample_rate: u32) -> anyhow::Result<String> {
    use std::io::Cursor;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let estimated = 44 + samples.len() * 2;
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(estimated));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(v)
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
        }
        writer
            .finalize()
            .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    }

    let buf = cursor.into_inner();
    Ok(base64::engine::general_purpose::STANDARD.encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let wave = Waveform::new(vec![0.0, 0.5, -0.5, 1.0, -1.0], 44100);
        write_wav(&path, &wave).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(reader.len(), 5);
    }

    #[test]
    fn test_export_wav_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master.wav");
        let wave = Waveform::silence(100.0, 44100);
        write_wav(&master, &wave).unwrap();

        let out = export_format(&wave, &master, dir.path(), "mix_test", ExportFormat::Wav).unwrap();
        assert!(out.ends_with("mix_test.wav"));
        assert!(out.is_file());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_encode_wav_base64_has_riff_header() {
        let encoded = encode_wav_base64(&[0.1, -0.1, 0.2], 22050).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
    }
}
