//! Output naming and the metadata sidecar.
//!
//! Filenames describe what the run did and stay collision-free under
//! concurrent requests: a timestamp for humans, a random suffix for
//! uniqueness. No locking needed because names never repeat.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::config::MixOptions;
use crate::error::{MixError, MixResult};
use crate::report::GenerationReport;

/// Build the output file stem, e.g. `mix_3seg_trim_x1.3_20260807_101530_a1b2c3`.
pub fn build_stem(segment_count: usize, options: &MixOptions) -> String {
    let mut parts = vec![format!("mix_{segment_count}seg")];
    if options.trim {
        parts.push("trim".to_string());
    }
    if options.speed_factor != 1.0 {
        parts.push(format!("x{}", options.speed_factor));
    }
    parts.push(Utc::now().format("%Y%m%d_%H%M%S").to_string());
    parts.push(random_suffix());
    parts.join("_")
}

fn random_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..6].to_string()
}

/// Effective parameters recorded alongside the audio, for audit and replay.
#[derive(Debug, Clone, Serialize)]
pub struct SidecarMeta<'a> {
    pub options: &'a MixOptions,
    /// Seed actually used for pause jitter, whether caller-fixed or drawn.
    pub seed: u64,
    /// Speed backend that produced the output, when one ran.
    pub speed_backend: Option<&'static str>,
}

/// Write `<stem>.json` next to the audio outputs. Same temp-then-rename
/// discipline as the audio files.
pub fn write_sidecar(
    out_dir: &Path,
    stem: &str,
    meta: &SidecarMeta<'_>,
    report: &GenerationReport,
) -> MixResult<PathBuf> {
    let body = json!({
        "created_at": Utc::now().to_rfc3339(),
        "options": meta.options,
        "seed": meta.seed,
        "speed_backend": meta.speed_backend,
        "report": report,
    });

    let final_path = out_dir.join(format!("{stem}.json"));
    let tmp_path = out_dir.join(format!(".{stem}.json.part"));

    let text = serde_json::to_string_pretty(&body)
        .map_err(|e| MixError::processing(format!("sidecar serialization failed: {e}")))?;
    std::fs::write(&tmp_path, text)
        .map_err(|e| MixError::processing(format!("sidecar write failed: {e}")))?;
    std::fs::rename(&tmp_path, &final_path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        MixError::processing(format!("failed to persist sidecar: {e}"))
    })?;

    Ok(final_path)
}
