//! Request handlers.
//!
//! Thin adapters only: multipart/json in, core invocation inside
//! `spawn_blocking`, report out. All policy lives in `mix_core`.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use mix_core::config::{ExportFormat, MixOptions};
use mix_core::export::encode_wav_base64;
use mix_core::mixer::parse_segments;
use mix_core::{GenerationReport, Waveform};
use voice_core::{EngineParams, SynthesisEngine, VoiceConverter};

use crate::error::ApiError;
use crate::validation::{validate_mix_request, validate_tts_request};
use crate::AppState;

/// JSON body of the `request` part of a `/mix` multipart.
#[derive(Debug, Deserialize)]
pub struct MixRequest {
    pub segments: Vec<String>,
    pub formats: Option<Vec<String>>,
    pub trim: Option<bool>,
    pub trim_threshold_ms: Option<f64>,
    pub normalize: Option<bool>,
    pub crossfade_ms: Option<f64>,
    pub pause_duration_ms: Option<f64>,
    pub pause_variation_ms: Option<f64>,
    pub speed_factor: Option<f64>,
    pub seed: Option<u64>,
}

impl MixRequest {
    fn into_options(self) -> Result<MixOptions, ApiError> {
        let defaults = MixOptions::default();
        let formats = match self.formats {
            None => defaults.formats,
            Some(names) => names
                .iter()
                .map(|n| {
                    ExportFormat::from_str(n).ok_or_else(|| {
                        ApiError::InvalidInput(format!("Unsupported export format: {n}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(MixOptions {
            trim: self.trim.unwrap_or(defaults.trim),
            trim_threshold_ms: self.trim_threshold_ms.unwrap_or(defaults.trim_threshold_ms),
            normalize: self.normalize.unwrap_or(defaults.normalize),
            crossfade_ms: self.crossfade_ms.unwrap_or(defaults.crossfade_ms),
            pause_duration_ms: self.pause_duration_ms.unwrap_or(defaults.pause_duration_ms),
            pause_variation_ms: self
                .pause_variation_ms
                .unwrap_or(defaults.pause_variation_ms),
            speed_factor: self.speed_factor.unwrap_or(defaults.speed_factor),
            formats,
            seed: self.seed,
        })
    }
}

#[derive(Serialize)]
pub struct MixResponse {
    pub outputs: Vec<String>,
    pub sidecar: String,
    #[serde(flatten)]
    pub report: GenerationReport,
}

pub async fn mix_endpoint(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MixResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let mut request: Option<MixRequest> = None;
    let upload_dir = tempfile::tempdir()
        .map_err(|e| ApiError::InternalError(format!("Failed to create upload dir: {e}")))?;
    let mut uploads: Vec<PathBuf> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("request") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("Unreadable request part: {e}")))?;
                request = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| ApiError::InvalidInput(format!("Invalid request JSON: {e}")))?,
                );
            }
            Some("file") => {
                // Preserve the original extension: the decoder keys off it
                let ext = field
                    .file_name()
                    .and_then(|n| n.rsplit('.').next().map(str::to_string))
                    .unwrap_or_else(|| "wav".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("Unreadable file part: {e}")))?;
                let path = upload_dir
                    .path()
                    .join(format!("upload_{}.{}", uploads.len(), ext));
                std::fs::write(&path, &data)
                    .map_err(|e| ApiError::InternalError(format!("Failed to store upload: {e}")))?;
                uploads.push(path);
            }
            _ => {}
        }
    }

    let request = request
        .ok_or_else(|| ApiError::InvalidInput("Missing 'request' part in multipart".to_string()))?;
    validate_mix_request(&request)?;

    // Descriptor errors (bad notation, out-of-range silence) surface here,
    // before any audio work happens.
    let segments = parse_segments(&request.segments)?;
    let options = request.into_options()?;

    info!(
        segments = segments.len(),
        uploads = uploads.len(),
        "mix request accepted"
    );

    let mixer = state.mixer.clone();
    let output = tokio::task::spawn_blocking(move || {
        // The upload dir must outlive the run
        let _uploads_guard = upload_dir;
        mixer.run(&segments, &uploads, &options)
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("Task join error: {e}")))??;

    let file_name = |p: &PathBuf| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    Ok(Json(MixResponse {
        outputs: output.outputs.iter().map(file_name).collect(),
        sidecar: file_name(&output.sidecar),
        report: output.report,
    }))
}

#[derive(Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub voice: Option<String>,
    pub params: Option<EngineParams>,
}

#[derive(Serialize)]
pub struct AudioResponse {
    pub audio_base64: String,
    pub duration_ms: u64,
    pub sample_rate: u32,
}

fn audio_response(wave: Waveform) -> Result<Json<AudioResponse>, ApiError> {
    let duration_ms = (wave.duration_ms()) as u64;
    let sample_rate = wave.sample_rate;
    let audio_base64 = encode_wav_base64(&wave.samples, sample_rate)
        .map_err(|e| ApiError::InternalError(format!("WAV encoding error: {e}")))?;
    Ok(Json(AudioResponse {
        audio_base64,
        duration_ms,
        sample_rate,
    }))
}

pub async fn tts_endpoint(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<AudioResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    validate_tts_request(&req.text)?;

    let engine = state.engine.clone().ok_or(ApiError::EngineUnavailable)?;
    let (voice_id, entry) = state
        .library
        .resolve(req.voice.as_deref())
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    let reference = state.voices_dir.join(&entry.reference);
    if !reference.is_file() {
        return Err(ApiError::NotFound(format!(
            "Reference audio for voice '{voice_id}' is missing"
        )));
    }

    let params = req.params.unwrap_or_default();
    let text = req.text;
    let wave = tokio::task::spawn_blocking(move || engine.synthesize(&text, &reference, &params))
        .await
        .map_err(|e| ApiError::InternalError(format!("Task join error: {e}")))??;

    audio_response(wave)
}

pub async fn convert_endpoint(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AudioResponse>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let engine = state.engine.clone().ok_or(ApiError::EngineUnavailable)?;

    let mut voice: Option<String> = None;
    let mut params = EngineParams::default();
    let upload_dir = tempfile::tempdir()
        .map_err(|e| ApiError::InternalError(format!("Failed to create upload dir: {e}")))?;
    let mut source: Option<PathBuf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("voice") => {
                voice = Some(field.text().await.map_err(|e| {
                    ApiError::InvalidInput(format!("Unreadable voice part: {e}"))
                })?);
            }
            Some("params") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("Unreadable params part: {e}")))?;
                params = serde_json::from_str(&text)
                    .map_err(|e| ApiError::InvalidInput(format!("Invalid params JSON: {e}")))?;
            }
            Some("file") => {
                let ext = field
                    .file_name()
                    .and_then(|n| n.rsplit('.').next().map(str::to_string))
                    .unwrap_or_else(|| "wav".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("Unreadable file part: {e}")))?;
                let path = upload_dir.path().join(format!("source.{ext}"));
                std::fs::write(&path, &data)
                    .map_err(|e| ApiError::InternalError(format!("Failed to store upload: {e}")))?;
                source = Some(path);
            }
            _ => {}
        }
    }

    let source = source
        .ok_or_else(|| ApiError::InvalidInput("Missing 'file' part with source audio".to_string()))?;
    let (voice_id, entry) = state
        .library
        .resolve(voice.as_deref())
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    let target = state.voices_dir.join(&entry.reference);
    if !target.is_file() {
        return Err(ApiError::NotFound(format!(
            "Reference audio for voice '{voice_id}' is missing"
        )));
    }

    let wave = tokio::task::spawn_blocking(move || {
        let _uploads_guard = upload_dir;
        engine.convert(&source, &target, &params)
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("Task join error: {e}")))??;

    audio_response(wave)
}

#[derive(Serialize)]
pub struct VoiceInfo {
    pub id: String,
    pub reference: String,
    pub display_name: Option<String>,
    pub gender: Option<String>,
    pub quality: Option<String>,
}

pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.library.list())
}

pub async fn list_voices_detail(State(state): State<AppState>) -> Json<Vec<VoiceInfo>> {
    let mut out: Vec<VoiceInfo> = state
        .library
        .iter()
        .map(|(id, entry)| VoiceInfo {
            id: id.clone(),
            reference: entry.reference.clone(),
            display_name: entry.display_name.clone(),
            gender: entry.gender.clone(),
            quality: entry.quality.clone(),
        })
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    Json(out)
}

pub async fn health_check() -> &'static str {
    "ok"
}
