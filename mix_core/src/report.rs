//! Structured provenance for one mix run.
//!
//! The report is serialized verbatim into the API response and the metadata
//! sidecar, so field names here are part of the wire contract.

use serde::{Deserialize, Serialize};

/// What trimming did to a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimInfo {
    pub trimmed: bool,
    pub leading_removed_ms: f64,
    pub trailing_removed_ms: f64,
    pub original_duration_ms: f64,
    pub trimmed_duration_ms: f64,
}

/// One timeline entry. Each variant carries exactly the fields that exist
/// for it, so the serializer can match exhaustively instead of probing
/// optional keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentRecord {
    ServerFile {
        source: String,
        duration_seconds: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        trim: Option<TrimInfo>,
    },
    Upload {
        index: usize,
        duration_seconds: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        trim: Option<TrimInfo>,
    },
    Silence {
        duration_ms: f64,
    },
    NaturalPause {
        duration_ms: f64,
    },
}

impl SegmentRecord {
    pub fn duration_seconds(&self) -> f64 {
        match self {
            SegmentRecord::ServerFile {
                duration_seconds, ..
            }
            | SegmentRecord::Upload {
                duration_seconds, ..
            } => *duration_seconds,
            SegmentRecord::Silence { duration_ms }
            | SegmentRecord::NaturalPause { duration_ms } => duration_ms / 1000.0,
        }
    }
}

/// Aggregate trim statistics, present only when trimming was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimSummary {
    pub files_trimmed: usize,
    pub files_not_trimmed: usize,
    pub total_silence_removed_seconds: f64,
}

/// Everything a caller needs to audit what a run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub total_duration_seconds: f64,
    pub processing_time_seconds: f64,
    pub file_count: usize,
    pub silence_segments: usize,
    pub natural_pauses: usize,
    pub crossfade_ms: f64,
    pub normalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_summary: Option<TrimSummary>,
    pub segments: Vec<SegmentRecord>,
}
