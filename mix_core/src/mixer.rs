//! The mixing orchestrator.
//!
//! One `run()` drives the whole pipeline: resolve descriptors, trim,
//! normalize, speed-adjust, decide connective material pair by pair,
//! concatenate, export, report. Each run owns its segments and its temp
//! directory; nothing is shared between concurrent runs.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{MixConfig, MixOptions};
use crate::error::{MixError, MixResult};
use crate::export;
use crate::gap::{scan_mode, GapDecision, GapPolicy, RngJitter};
use crate::naming::{self, SidecarMeta};
use crate::normalize;
use crate::report::{GenerationReport, SegmentRecord, TrimSummary};
use crate::segment::{LoadedSegment, Segment, SegmentResolver};
use crate::silence::SilenceDetector;
use crate::speed::SpeedAdjuster;
use crate::waveform::Waveform;

/// Result of one successful run: the exported files plus the report.
#[derive(Debug)]
pub struct MixOutput {
    /// One output file per requested format, in request order.
    pub outputs: Vec<PathBuf>,
    /// JSON sidecar with the effective parameters and the report.
    pub sidecar: PathBuf,
    pub report: GenerationReport,
}

pub struct Mixer {
    config: MixConfig,
    detector: SilenceDetector,
    speed: SpeedAdjuster,
}

impl Mixer {
    /// Build a mixer, probing speed backend availability once.
    pub fn new(config: MixConfig) -> Self {
        let detector = SilenceDetector::new(config.silence_threshold_db, config.silence_margin_ms);
        let speed = SpeedAdjuster::probe(&config.backend_order, config.speed_range);
        Self {
            config,
            detector,
            speed,
        }
    }

    /// Build with an explicit speed adjuster; tests inject doubles here.
    pub fn with_speed(config: MixConfig, speed: SpeedAdjuster) -> Self {
        let detector = SilenceDetector::new(config.silence_threshold_db, config.silence_margin_ms);
        Self {
            config,
            detector,
            speed,
        }
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// Run the full pipeline over one segment list.
    ///
    /// Unresolvable input (missing file, bad upload index, malformed or
    /// out-of-range notation) aborts before anything is written. Trim,
    /// format and speed failures degrade to no-ops per segment and never
    /// abort the run.
    pub fn run(
        &self,
        segments: &[Segment],
        uploads: &[PathBuf],
        options: &MixOptions,
    ) -> MixResult<MixOutput> {
        let started = Instant::now();

        self.validate(segments, options)?;

        let resolver = SegmentResolver::new(&self.config);
        let mut loaded = resolver.resolve(segments, uploads)?;

        if options.trim {
            self.trim_segments(&mut loaded, options.trim_threshold_ms);
        }
        if options.normalize {
            for seg in loaded.iter_mut().filter(|s| s.origin.is_audio()) {
                normalize::normalize_levels(&mut seg.wave, self.config.target_dbfs);
            }
        }

        let mut speed_backend = None;
        if options.speed_factor != 1.0 {
            for seg in loaded.iter_mut().filter(|s| s.origin.is_audio()) {
                let wave = std::mem::replace(&mut seg.wave, Waveform::new(vec![], 0));
                let (stretched, backend) = self.speed.stretch(wave, options.speed_factor);
                seg.wave = stretched;
                if backend.is_some() {
                    speed_backend = backend;
                }
            }
        }

        let seed = options.seed.unwrap_or_else(rand::random);
        let mut jitter = RngJitter::seeded(seed);
        let mode = scan_mode(segments);
        let policy = GapPolicy {
            crossfade_ms: options.crossfade_ms,
            pause_duration_ms: options.pause_duration_ms,
            pause_variation_ms: options.pause_variation_ms,
        };

        let (combined, records, gap_ledger) =
            self.assemble(&loaded, mode, &policy, &mut jitter);

        if combined.is_empty() {
            return Err(MixError::processing(
                "assembled timeline contains no audio samples",
            ));
        }

        let report = self.build_report(
            &combined,
            &loaded,
            records,
            &gap_ledger,
            options,
            started.elapsed().as_secs_f64(),
        );

        let (outputs, sidecar) =
            self.export_all(&combined, loaded.len(), options, &report, seed, speed_backend)?;

        info!(
            outputs = outputs.len(),
            duration_seconds = report.total_duration_seconds,
            processing_seconds = report.processing_time_seconds,
            "mix complete"
        );

        Ok(MixOutput {
            outputs,
            sidecar,
            report,
        })
    }

    fn validate(&self, segments: &[Segment], options: &MixOptions) -> MixResult<()> {
        if segments.is_empty() {
            return Err(MixError::validation("segment list is empty"));
        }
        if segments.iter().all(Segment::is_silence) {
            return Err(MixError::validation(
                "segment list contains only silence; at least one audio segment is required",
            ));
        }
        if options.formats.is_empty() {
            return Err(MixError::validation("no export format requested"));
        }
        if !options.speed_factor.is_finite() || options.speed_factor <= 0.0 {
            return Err(MixError::validation(format!(
                "speed factor {} is not a positive number",
                options.speed_factor
            )));
        }
        Ok(())
    }

    /// Run silence detection on each audio segment and apply the trim when
    /// the recommendation exceeds the caller's threshold. Failures inside
    /// detection have already degraded to zero bounds by this point.
    fn trim_segments(&self, loaded: &mut [LoadedSegment], threshold_ms: f64) {
        let min_remain = self.config.min_segment_ms;
        for seg in loaded.iter_mut().filter(|s| s.origin.is_audio()) {
            let bounds = self.detector.detect_boundaries(&seg.wave);
            if bounds.total_ms() > threshold_ms {
                let (trimmed, info) = self.detector.apply_trim(&seg.wave, bounds, min_remain);
                debug!(
                    segment = %seg.origin.label(),
                    removed_ms = info.leading_removed_ms + info.trailing_removed_ms,
                    "trimmed segment"
                );
                seg.wave = trimmed;
                seg.trim = Some(info);
            } else {
                let duration = seg.wave.duration_ms();
                seg.trim = Some(crate::report::TrimInfo {
                    trimmed: false,
                    leading_removed_ms: 0.0,
                    trailing_removed_ms: 0.0,
                    original_duration_ms: duration,
                    trimmed_duration_ms: duration,
                });
            }
        }
    }

    /// Walk the timeline, deciding connective material for each adjacent
    /// pair and accumulating one combined buffer. Returns the buffer, the
    /// ordered record list, and the ledger of gap decisions taken.
    fn assemble(
        &self,
        loaded: &[LoadedSegment],
        mode: crate::gap::GapMode,
        policy: &GapPolicy,
        jitter: &mut RngJitter,
    ) -> (Vec<f32>, Vec<SegmentRecord>, Vec<GapDecision>) {
        let sr = self.config.sample_rate;
        let mut combined: Vec<f32> = Vec::new();
        let mut records: Vec<SegmentRecord> = Vec::new();
        let mut ledger: Vec<GapDecision> = Vec::new();
        let mut prev: Option<&Segment> = None;

        for seg in loaded {
            let decision = policy.decide(prev, &seg.origin, mode, jitter);

            match decision {
                GapDecision::NaturalPause(ms) => {
                    let gap = Waveform::silence(ms, sr);
                    combined.extend_from_slice(&gap.samples);
                    records.push(SegmentRecord::NaturalPause {
                        duration_ms: gap.duration_ms(),
                    });
                    ledger.push(decision);
                    combined.extend_from_slice(&seg.wave.samples);
                }
                GapDecision::Crossfade(ms) => {
                    crossfade_append(&mut combined, &seg.wave.samples, ms, sr);
                    ledger.push(decision);
                }
                GapDecision::ManualSilence(_) | GapDecision::None => {
                    combined.extend_from_slice(&seg.wave.samples);
                }
            }

            // An explicit silence segment is itself the connective material
            // at this boundary; tag it in the ledger as such.
            if seg.origin.is_silence() {
                ledger.push(GapDecision::ManualSilence(seg.wave.duration_ms()));
            }

            records.push(self.record_for(seg));
            prev = Some(&seg.origin);
        }

        (combined, records, ledger)
    }

    fn record_for(&self, seg: &LoadedSegment) -> SegmentRecord {
        match &seg.origin {
            Segment::ServerFile { path } => SegmentRecord::ServerFile {
                source: path.clone(),
                duration_seconds: seg.wave.duration_seconds(),
                trim: seg.trim,
            },
            Segment::Upload { index } => SegmentRecord::Upload {
                index: *index,
                duration_seconds: seg.wave.duration_seconds(),
                trim: seg.trim,
            },
            Segment::Silence { .. } => SegmentRecord::Silence {
                duration_ms: seg.wave.duration_ms(),
            },
        }
    }

    fn build_report(
        &self,
        combined: &[f32],
        loaded: &[LoadedSegment],
        records: Vec<SegmentRecord>,
        gap_ledger: &[GapDecision],
        options: &MixOptions,
        processing_time_seconds: f64,
    ) -> GenerationReport {
        let silence_segments = gap_ledger
            .iter()
            .filter(|d| matches!(d, GapDecision::ManualSilence(_)))
            .count();
        let natural_pauses = gap_ledger
            .iter()
            .filter(|d| matches!(d, GapDecision::NaturalPause(_)))
            .count();
        let file_count = loaded.iter().filter(|s| s.origin.is_audio()).count();

        let trim_summary = options.trim.then(|| {
            let mut summary = TrimSummary::default();
            for seg in loaded.iter().filter(|s| s.origin.is_audio()) {
                match &seg.trim {
                    Some(info) if info.trimmed => {
                        summary.files_trimmed += 1;
                        summary.total_silence_removed_seconds +=
                            (info.original_duration_ms - info.trimmed_duration_ms) / 1000.0;
                    }
                    _ => summary.files_not_trimmed += 1,
                }
            }
            summary
        });

        GenerationReport {
            total_duration_seconds: combined.len() as f64 / self.config.sample_rate as f64,
            processing_time_seconds,
            file_count,
            silence_segments,
            natural_pauses,
            crossfade_ms: options.crossfade_ms,
            normalized: options.normalize,
            trim_summary,
            segments: records,
        }
    }

    /// Export every requested format plus the sidecar. A failure rolls back
    /// any output already persisted for this run, so callers never observe
    /// a partial set.
    fn export_all(
        &self,
        combined: &[f32],
        segment_count: usize,
        options: &MixOptions,
        report: &GenerationReport,
        seed: u64,
        speed_backend: Option<&'static str>,
    ) -> MixResult<(Vec<PathBuf>, PathBuf)> {
        let wave = Waveform::new(combined.to_vec(), self.config.sample_rate);
        let out_dir = &self.config.outputs_root;
        std::fs::create_dir_all(out_dir).map_err(|e| {
            MixError::processing(format!(
                "failed to create output directory {}: {e}",
                out_dir.display()
            ))
        })?;

        let workdir = tempfile::tempdir()
            .map_err(|e| MixError::processing(format!("failed to create temp dir: {e}")))?;
        let master = workdir.path().join("master.wav");
        export::write_wav(&master, &wave)?;

        let stem = naming::build_stem(segment_count, options);
        let mut outputs: Vec<PathBuf> = Vec::new();
        for format in &options.formats {
            match export::export_format(&wave, &master, out_dir, &stem, *format) {
                Ok(path) => outputs.push(path),
                Err(e) => {
                    rollback(&outputs);
                    return Err(e);
                }
            }
        }

        let meta = SidecarMeta {
            options,
            seed,
            speed_backend,
        };
        let sidecar = match naming::write_sidecar(out_dir, &stem, &meta, report) {
            Ok(path) => path,
            Err(e) => {
                rollback(&outputs);
                return Err(e);
            }
        };

        Ok((outputs, sidecar))
    }
}

/// Overlap-append `incoming` onto `combined` with linear ramps over the
/// crossfade window. The window shrinks to whatever both sides can afford.
fn crossfade_append(combined: &mut Vec<f32>, incoming: &[f32], crossfade_ms: f64, sr: u32) {
    let requested = (crossfade_ms / 1000.0 * sr as f64).round() as usize;
    let n = requested.min(combined.len()).min(incoming.len());

    if n == 0 {
        combined.extend_from_slice(incoming);
        return;
    }

    let base = combined.len() - n;
    for k in 0..n {
        let t = (k + 1) as f32 / (n + 1) as f32;
        combined[base + k] = combined[base + k] * (1.0 - t) + incoming[k] * t;
    }
    combined.extend_from_slice(&incoming[n..]);
}

fn rollback(outputs: &[PathBuf]) {
    for path in outputs {
        if std::fs::remove_file(path).is_err() {
            warn!(path = %path.display(), "failed to roll back output file");
        }
    }
}

/// Parse wire strings into segments. Convenience for callers that hold the
/// raw request list.
pub fn parse_segments(specs: &[String]) -> MixResult<Vec<Segment>> {
    Segment::parse_list(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossfade_append_overlaps() {
        let mut combined = vec![1.0f32; 100];
        let incoming = vec![0.0f32; 100];
        // 1ms at 10kHz = 10 samples of overlap
        crossfade_append(&mut combined, &incoming, 1.0, 10_000);
        assert_eq!(combined.len(), 190);
        // Ramp is monotonic across the overlap window
        let window = &combined[90..100];
        for pair in window.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn test_crossfade_append_empty_base_degrades_to_concat() {
        let mut combined: Vec<f32> = Vec::new();
        crossfade_append(&mut combined, &[0.5; 10], 100.0, 44100);
        assert_eq!(combined.len(), 10);
    }

    #[test]
    fn test_crossfade_window_clamped_to_shorter_side() {
        let mut combined = vec![1.0f32; 5];
        crossfade_append(&mut combined, &[0.0; 100], 1000.0, 44100);
        // Overlap capped at 5 samples
        assert_eq!(combined.len(), 100);
    }
}
