//! Segment descriptors and their resolution into ready-to-mix waveforms.
//!
//! Three kinds of source feed one timeline: files already on the server,
//! files uploaded with the request, and synthetic silence written as
//! `(500ms)` / `(1.5s)`. The resolver turns descriptors into decoded,
//! format-normalized waveforms at the working rate; it does no trimming and
//! makes no gap decisions.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::MixConfig;
use crate::decode;
use crate::error::{MixError, MixResult};
use crate::report::TrimInfo;
use crate::waveform::Waveform;

/// Inclusive bounds for explicit silence durations, in ms.
pub const MIN_SILENCE_MS: f64 = 50.0;
pub const MAX_SILENCE_MS: f64 = 10_000.0;

/// Marker prefix for upload references in the wire segment list.
const UPLOAD_PREFIX: &str = "upload:";

static SILENCE_NOTATION: OnceLock<Regex> = OnceLock::new();

fn silence_notation() -> &'static Regex {
    SILENCE_NOTATION.get_or_init(|| Regex::new(r"^\((\d+(?:\.\d+)?)(ms|s)\)$").unwrap())
}

/// Parse a silence notation like `(500ms)` or `(1.5s)` into milliseconds.
/// Returns `None` when the string is not silence notation at all; range
/// checking is the caller's job.
pub fn parse_silence_notation(s: &str) -> Option<f64> {
    let caps = silence_notation().captures(s)?;
    let value: f64 = caps[1].parse().ok()?;
    Some(match &caps[2] {
        "s" => value * 1000.0,
        _ => value,
    })
}

/// A caller-supplied timeline entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Relative path under the outputs root.
    ServerFile { path: String },
    /// Index into the request's ordered upload set.
    Upload { index: usize },
    /// Exact silence duration in milliseconds.
    Silence { duration_ms: f64 },
}

impl Segment {
    /// Parse one wire string: silence notation, an `upload:N` reference,
    /// or otherwise a server-relative filename.
    pub fn parse(raw: &str) -> MixResult<Segment> {
        if raw.is_empty() {
            return Err(MixError::validation("empty segment descriptor"));
        }

        if let Some(duration_ms) = parse_silence_notation(raw) {
            if !(MIN_SILENCE_MS..=MAX_SILENCE_MS).contains(&duration_ms) {
                return Err(MixError::validation(format!(
                    "silence duration {duration_ms}ms out of range \
                     [{MIN_SILENCE_MS}ms, {MAX_SILENCE_MS}ms] in '{raw}'"
                )));
            }
            return Ok(Segment::Silence { duration_ms });
        }

        // Malformed silence notation should fail loudly, not fall through
        // to a file lookup that can never succeed.
        if raw.starts_with('(') && raw.ends_with(')') {
            return Err(MixError::validation(format!(
                "malformed silence notation '{raw}', expected e.g. (500ms) or (1.5s)"
            )));
        }

        if let Some(rest) = raw.strip_prefix(UPLOAD_PREFIX) {
            let index: usize = rest.parse().map_err(|_| {
                MixError::validation(format!("malformed upload reference '{raw}'"))
            })?;
            return Ok(Segment::Upload { index });
        }

        Ok(Segment::ServerFile {
            path: raw.to_string(),
        })
    }

    /// Parse a whole wire segment list.
    pub fn parse_list(specs: &[String]) -> MixResult<Vec<Segment>> {
        specs.iter().map(|s| Segment::parse(s)).collect()
    }

    pub fn is_silence(&self) -> bool {
        matches!(self, Segment::Silence { .. })
    }

    pub fn is_audio(&self) -> bool {
        !self.is_silence()
    }

    /// Human-readable label for error messages and logs.
    pub fn label(&self) -> String {
        match self {
            Segment::ServerFile { path } => path.clone(),
            Segment::Upload { index } => format!("upload #{index}"),
            Segment::Silence { duration_ms } => format!("({duration_ms}ms)"),
        }
    }
}

/// A resolved segment: the originating descriptor plus its decoded audio.
/// Lives for one mixer run only; never cached or shared.
#[derive(Debug, Clone)]
pub struct LoadedSegment {
    pub origin: Segment,
    pub wave: Waveform,
    pub trim: Option<TrimInfo>,
}

impl LoadedSegment {
    pub fn new(origin: Segment, wave: Waveform) -> Self {
        Self {
            origin,
            wave,
            trim: None,
        }
    }
}

/// Turns descriptors into loaded waveforms.
pub struct SegmentResolver<'a> {
    config: &'a MixConfig,
}

impl<'a> SegmentResolver<'a> {
    pub fn new(config: &'a MixConfig) -> Self {
        Self { config }
    }

    /// Resolve the whole list in order. Any unresolvable segment fails the
    /// run with enough detail to identify it; no partial results escape.
    pub fn resolve(
        &self,
        segments: &[Segment],
        uploads: &[PathBuf],
    ) -> MixResult<Vec<LoadedSegment>> {
        segments
            .iter()
            .enumerate()
            .map(|(i, seg)| self.resolve_one(i, seg, uploads))
            .collect()
    }

    fn resolve_one(
        &self,
        index: usize,
        segment: &Segment,
        uploads: &[PathBuf],
    ) -> MixResult<LoadedSegment> {
        let sr = self.config.sample_rate;
        match segment {
            Segment::Silence { duration_ms } => Ok(LoadedSegment::new(
                segment.clone(),
                Waveform::silence(*duration_ms, sr),
            )),
            Segment::Upload { index: upload_idx } => {
                let path = uploads.get(*upload_idx).ok_or_else(|| {
                    MixError::validation(format!(
                        "segment {index} references upload #{upload_idx} \
                         but only {} upload(s) were provided",
                        uploads.len()
                    ))
                })?;
                let wave = self.load_audio(path, segment)?;
                Ok(LoadedSegment::new(segment.clone(), wave))
            }
            Segment::ServerFile { path } => {
                let full = self.server_path(index, path)?;
                if !full.is_file() {
                    return Err(MixError::not_found(format!(
                        "segment {index}: no such file '{path}'"
                    )));
                }
                let wave = self.load_audio(&full, segment)?;
                Ok(LoadedSegment::new(segment.clone(), wave))
            }
        }
    }

    fn load_audio(&self, path: &Path, segment: &Segment) -> MixResult<Waveform> {
        let wave = decode::load(path, self.config.sample_rate).map_err(|e| {
            MixError::processing(format!("failed to decode {}: {e:#}", segment.label()))
        })?;
        debug!(
            segment = %segment.label(),
            duration_ms = wave.duration_ms(),
            "segment resolved"
        );
        Ok(wave)
    }

    /// Join a caller-supplied relative path under the outputs root,
    /// rejecting traversal outside it.
    fn server_path(&self, index: usize, relative: &str) -> MixResult<PathBuf> {
        let rel = Path::new(relative);
        let escapes = rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(MixError::validation(format!(
                "segment {index}: path '{relative}' escapes the outputs root"
            )));
        }
        Ok(self.config.outputs_root.join(rel))
    }
}
