//! Pipeline configuration.
//!
//! Components receive the values they need through these structs instead of
//! reading a process-wide config object, so tests can vary thresholds freely.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Static pipeline configuration, fixed for the lifetime of a `Mixer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixConfig {
    /// Working sample rate. Every decoded segment is resampled to this.
    pub sample_rate: u32,

    /// Energy threshold for silence detection, in dBFS.
    ///
    /// - Lower values (-50 and below): only near-digital silence is trimmed
    /// - Default (-40): quiet room tone counts as silence
    /// - Higher values (-30 and above): aggressive, may eat soft speech
    pub silence_threshold_db: f32,

    /// Safety margin left un-trimmed at each detected boundary, in ms.
    /// Prevents clipping consonant onsets and decay tails.
    pub silence_margin_ms: f64,

    /// A trimmed segment always keeps at least this much audio, in ms.
    pub min_segment_ms: f64,

    /// Target loudness for per-segment level normalization, in dBFS.
    pub target_dbfs: f32,

    /// Inclusive clamp range for the speed factor.
    pub speed_range: (f64, f64),

    /// Speed backend priority order. Unavailable backends are dropped at
    /// probe time, not at call time.
    pub backend_order: Vec<String>,

    /// Root directory for server-stored segment sources and mix outputs.
    pub outputs_root: PathBuf,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            silence_threshold_db: -40.0,
            silence_margin_ms: 50.0,
            min_segment_ms: 100.0,
            target_dbfs: -20.0,
            speed_range: (0.5, 2.0),
            backend_order: vec![
                "rubberband".to_string(),
                "atempo".to_string(),
                "resample".to_string(),
            ],
            outputs_root: PathBuf::from("outputs"),
        }
    }
}

impl MixConfig {
    pub fn with_outputs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.outputs_root = root.into();
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_silence_threshold_db(mut self, db: f32) -> Self {
        self.silence_threshold_db = db;
        self
    }
}

/// Output container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Wav,
    Mp3,
    Flac,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Some(ExportFormat::Wav),
            "mp3" => Some(ExportFormat::Mp3),
            "flac" => Some(ExportFormat::Flac),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Flac => "flac",
        }
    }
}

/// Per-request options for one mix run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixOptions {
    /// Run silence detection and apply recommended trims.
    pub trim: bool,

    /// A trim recommendation below this many ms is ignored; segments with
    /// only subtle silence are left untouched.
    pub trim_threshold_ms: f64,

    /// Apply per-segment RMS gain toward `MixConfig::target_dbfs`.
    pub normalize: bool,

    /// Crossfade length between adjacent audio segments; 0 disables.
    pub crossfade_ms: f64,

    /// Base duration of randomized natural pauses; 0 disables. Only takes
    /// effect when the segment list contains no explicit silence.
    pub pause_duration_ms: f64,

    /// Uniform jitter applied to each natural pause, +/- this many ms.
    pub pause_variation_ms: f64,

    /// Pitch-preserving time-stretch factor; 1.0 is a guaranteed no-op.
    pub speed_factor: f64,

    /// Requested output containers; one file is produced per entry.
    pub formats: Vec<ExportFormat>,

    /// RNG seed for pause jitter. When absent a fresh seed is drawn and
    /// recorded in the metadata sidecar.
    pub seed: Option<u64>,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            trim: false,
            trim_threshold_ms: 200.0,
            normalize: false,
            crossfade_ms: 0.0,
            pause_duration_ms: 0.0,
            pause_variation_ms: 0.0,
            speed_factor: 1.0,
            formats: vec![ExportFormat::Wav],
            seed: None,
        }
    }
}
