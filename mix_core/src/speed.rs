//! Pitch-preserving time stretch with a prioritized backend chain.
//!
//! Backends are probed once when the adjuster is built, not at call time:
//! the hot path iterates a pre-resolved list and takes the first backend
//! that completes. The ffmpeg-based backends round-trip through a scoped
//! temp directory (write WAV, run the filter, read the result back), which
//! is the portable way to borrow native DSP without linking it.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, warn};

use crate::decode;
use crate::waveform::Waveform;

/// A single time-stretch implementation.
///
/// Implementations must preserve channel count (the pipeline is mono
/// throughout) and return floating-point samples at the input rate.
pub trait SpeedBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stretch so the output plays `factor` times as fast: duration becomes
    /// `input_duration / factor`.
    fn stretch(&self, wave: &Waveform, factor: f64) -> Result<Waveform>;
}

/// ffmpeg `rubberband` filter: pitch-preserving, tuned for speech.
/// Only present in librubberband builds of ffmpeg.
pub struct RubberbandBackend;

impl SpeedBackend for RubberbandBackend {
    fn name(&self) -> &'static str {
        "rubberband"
    }

    fn stretch(&self, wave: &Waveform, factor: f64) -> Result<Waveform> {
        run_ffmpeg_filter(wave, &format!("rubberband=tempo={factor}"))
    }
}

/// ffmpeg `atempo` filter: pitch-preserving, available in every build.
pub struct AtempoBackend;

impl SpeedBackend for AtempoBackend {
    fn name(&self) -> &'static str {
        "atempo"
    }

    fn stretch(&self, wave: &Waveform, factor: f64) -> Result<Waveform> {
        run_ffmpeg_filter(wave, &format!("atempo={factor}"))
    }
}

/// Plain rate-change resample. Shifts pitch along with tempo, so it is
/// strictly a last resort when nothing pitch-preserving is available.
pub struct ResampleBackend;

impl SpeedBackend for ResampleBackend {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn stretch(&self, wave: &Waveform, factor: f64) -> Result<Waveform> {
        let sr = wave.sample_rate;
        let virtual_sr = (sr as f64 * factor).round() as u32;
        if virtual_sr == 0 {
            bail!("speed factor {factor} collapses sample rate to zero");
        }
        let samples = decode::resample(&wave.samples, virtual_sr, sr)?;
        Ok(Waveform::new(samples, sr))
    }
}

/// Write the waveform to a temp WAV, run one ffmpeg audio filter over it
/// and read the result back. The temp directory guard cleans up on every
/// exit path, including errors.
fn run_ffmpeg_filter(wave: &Waveform, filter: &str) -> Result<Waveform> {
    let dir = tempfile::tempdir().context("failed to create temp dir for ffmpeg round-trip")?;
    let in_path = dir.path().join("in.wav");
    let out_path = dir.path().join("out.wav");

    write_float_wav(&in_path, wave)?;

    let output = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            in_path.to_str().unwrap_or_default(),
            "-af",
            filter,
            "-ar",
            &wave.sample_rate.to_string(),
            "-ac",
            "1",
            "-y",
            out_path.to_str().unwrap_or_default(),
        ])
        .output()
        .context("failed to spawn ffmpeg")?;

    if !output.status.success() {
        bail!(
            "ffmpeg filter '{}' failed: {}",
            filter,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    decode::load(&out_path, wave.sample_rate)
}

/// 32-bit float WAV, so the round-trip adds no quantization of its own.
fn write_float_wav(path: &Path, wave: &Waveform) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: wave.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &s in &wave.samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn ffmpeg_has_filter(name: &str) -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-filters"])
        .output()
        .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).contains(name))
        .unwrap_or(false)
}

/// The fallback chain. Built once; `stretch` never probes.
pub struct SpeedAdjuster {
    backends: Vec<Box<dyn SpeedBackend>>,
    range: (f64, f64),
}

impl SpeedAdjuster {
    /// Probe availability and build the chain in the configured order.
    /// Backends whose external tooling is missing are dropped here so the
    /// per-call path never sees them.
    pub fn probe(backend_order: &[String], range: (f64, f64)) -> Self {
        let mut backends: Vec<Box<dyn SpeedBackend>> = Vec::new();
        for name in backend_order {
            match name.as_str() {
                "rubberband" => {
                    if ffmpeg_has_filter("rubberband") {
                        backends.push(Box::new(RubberbandBackend));
                    } else {
                        debug!("rubberband filter unavailable, skipping backend");
                    }
                }
                "atempo" => {
                    if ffmpeg_has_filter("atempo") {
                        backends.push(Box::new(AtempoBackend));
                    } else {
                        debug!("ffmpeg unavailable, skipping atempo backend");
                    }
                }
                "resample" => backends.push(Box::new(ResampleBackend)),
                other => warn!(backend = other, "unknown speed backend in config, ignoring"),
            }
        }
        debug!(
            backends = ?backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            "speed backend chain resolved"
        );
        Self { backends, range }
    }

    /// Build from explicit backends; used by tests to inject doubles.
    pub fn with_backends(backends: Vec<Box<dyn SpeedBackend>>, range: (f64, f64)) -> Self {
        Self { backends, range }
    }

    /// Time-stretch by `factor`, clamped to the configured range.
    ///
    /// `factor == 1.0` returns the input untouched without consulting any
    /// backend. Every backend failing is not fatal: the input is returned
    /// unchanged and the condition is logged.
    ///
    /// Returns the waveform and the name of the backend that produced it,
    /// `None` for the no-op and all-failed cases.
    pub fn stretch(&self, wave: Waveform, factor: f64) -> (Waveform, Option<&'static str>) {
        if factor == 1.0 {
            return (wave, None);
        }

        let factor = factor.clamp(self.range.0, self.range.1);

        for backend in &self.backends {
            match backend.stretch(&wave, factor) {
                Ok(out) => {
                    debug!(backend = backend.name(), factor, "speed adjustment applied");
                    return (out, Some(backend.name()));
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "speed backend failed, trying next");
                }
            }
        }

        error!(factor, "every speed backend failed, returning audio unmodified");
        (wave, None)
    }
}
