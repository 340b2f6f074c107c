//! The neural engine boundary.
//!
//! Synthesis and voice conversion are opaque capabilities: a trait each,
//! plus one implementation that shells out to a configured command and
//! round-trips audio through WAV files in a scoped temp directory. The
//! model's internals are never this crate's business.

use std::path::{Path, PathBuf};
use std::process::Command;

use mix_core::{decode, Waveform};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine command failed: {0}")]
    CommandFailed(String),

    #[error("engine io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine produced unreadable audio: {0}")]
    Decode(String),
}

/// Opaque knobs forwarded to the engine command.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EngineParams {
    pub speed: Option<f64>,
    pub temperature: Option<f64>,
}

/// `synthesize(text, reference_audio, params) -> waveform`
pub trait SynthesisEngine: Send + Sync {
    fn synthesize(
        &self,
        text: &str,
        reference_audio: &Path,
        params: &EngineParams,
    ) -> Result<Waveform, EngineError>;
}

/// `convert(source_audio, target_voice, params) -> waveform`
pub trait VoiceConverter: Send + Sync {
    fn convert(
        &self,
        source_audio: &Path,
        target_voice: &Path,
        params: &EngineParams,
    ) -> Result<Waveform, EngineError>;
}

/// Engine backed by an external command.
///
/// Contract: `<program> synth --text T --reference R --out O.wav` and
/// `<program> convert --source S --target R --out O.wav`, exit status zero
/// on success, a readable WAV at the `--out` path.
pub struct CommandEngine {
    program: PathBuf,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str], out_path: &Path) -> Result<Waveform, EngineError> {
        let output = Command::new(&self.program).args(args).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(program = %self.program.display(), stderr = %stderr, "engine command failed");
            return Err(EngineError::CommandFailed(stderr.trim().to_string()));
        }

        debug!(program = %self.program.display(), "engine command complete");
        decode::load_native(out_path).map_err(|e| EngineError::Decode(format!("{e:#}")))
    }
}

impl SynthesisEngine for CommandEngine {
    fn synthesize(
        &self,
        text: &str,
        reference_audio: &Path,
        params: &EngineParams,
    ) -> Result<Waveform, EngineError> {
        let dir = tempfile::tempdir()?;
        let out_path = dir.path().join("synth.wav");

        let speed = params.speed.map(|s| s.to_string());
        let mut args: Vec<&str> = vec![
            "synth",
            "--text",
            text,
            "--reference",
            reference_audio.to_str().unwrap_or_default(),
            "--out",
            out_path.to_str().unwrap_or_default(),
        ];
        if let Some(ref s) = speed {
            args.push("--speed");
            args.push(s);
        }

        self.run(&args, &out_path)
    }
}

impl VoiceConverter for CommandEngine {
    fn convert(
        &self,
        source_audio: &Path,
        target_voice: &Path,
        params: &EngineParams,
    ) -> Result<Waveform, EngineError> {
        let dir = tempfile::tempdir()?;
        let out_path = dir.path().join("converted.wav");

        let speed = params.speed.map(|s| s.to_string());
        let mut args: Vec<&str> = vec![
            "convert",
            "--source",
            source_audio.to_str().unwrap_or_default(),
            "--target",
            target_voice.to_str().unwrap_or_default(),
            "--out",
            out_path.to_str().unwrap_or_default(),
        ];
        if let Some(ref s) = speed {
            args.push("--speed");
            args.push(s);
        }

        self.run(&args, &out_path)
    }
}
