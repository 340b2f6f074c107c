//! Leading/trailing silence boundary detection.
//!
//! A plain energy scan: the waveform is split into fixed frames, each
//! frame's RMS level is compared against a dBFS threshold, and the span
//! between the first and last frames above threshold is considered content.
//! The detector only recommends trim amounts; applying them is the mixer's
//! call.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::report::TrimInfo;
use crate::waveform::Waveform;

/// Analysis frame length in samples.
const FRAME_SIZE: usize = 2048;

/// Hop between analysis frames in samples.
const HOP_SIZE: usize = 512;

/// Recommended trim amounts for one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SilenceBounds {
    pub leading_ms: f64,
    pub trailing_ms: f64,
}

impl SilenceBounds {
    pub fn total_ms(&self) -> f64 {
        self.leading_ms + self.trailing_ms
    }
}

#[derive(Debug, Clone)]
pub struct SilenceDetector {
    threshold_db: f32,
    margin_ms: f64,
}

impl SilenceDetector {
    pub fn new(threshold_db: f32, margin_ms: f64) -> Self {
        Self {
            threshold_db,
            margin_ms,
        }
    }

    /// Recommend how much leading/trailing silence could be removed.
    ///
    /// All-silence input returns zero bounds: a file is never trimmed down
    /// to nothing, it is passed through with a warning instead. A safety
    /// margin is subtracted from each detected boundary so onsets and decay
    /// tails survive the cut.
    pub fn detect_boundaries(&self, wave: &Waveform) -> SilenceBounds {
        if wave.is_empty() {
            warn!("silence detection on empty waveform, skipping");
            return SilenceBounds::default();
        }

        let samples = &wave.samples;
        let mut first_loud: Option<usize> = None;
        let mut last_loud_end: usize = 0;

        let mut start = 0usize;
        while start < samples.len() {
            let end = (start + FRAME_SIZE).min(samples.len());
            if frame_dbfs(&samples[start..end]) > self.threshold_db {
                if first_loud.is_none() {
                    first_loud = Some(start);
                }
                last_loud_end = end;
            }
            start += HOP_SIZE;
        }

        let Some(first_loud) = first_loud else {
            warn!(
                duration_ms = wave.duration_ms(),
                "no content above threshold, leaving segment untouched"
            );
            return SilenceBounds::default();
        };

        let sr = wave.sample_rate as f64;
        let leading = first_loud as f64 / sr * 1000.0;
        let trailing = (samples.len() - last_loud_end) as f64 / sr * 1000.0;

        SilenceBounds {
            leading_ms: (leading - self.margin_ms).max(0.0),
            trailing_ms: (trailing - self.margin_ms).max(0.0),
        }
    }

    /// Apply recommended bounds to a waveform, keeping at least
    /// `min_remain_ms` of audio no matter how aggressive the bounds are.
    ///
    /// Returns the trimmed waveform and the record of what was removed.
    pub fn apply_trim(
        &self,
        wave: &Waveform,
        bounds: SilenceBounds,
        min_remain_ms: f64,
    ) -> (Waveform, TrimInfo) {
        let sr = wave.sample_rate as f64;
        let original_ms = wave.duration_ms();
        let min_remain = min_remain_ms.min(original_ms);

        let mut leading_ms = bounds.leading_ms;
        let mut trailing_ms = bounds.trailing_ms;

        // Shrink the cuts, trailing side first, until enough audio remains.
        let excess = leading_ms + trailing_ms - (original_ms - min_remain);
        if excess > 0.0 {
            let from_trailing = excess.min(trailing_ms);
            trailing_ms -= from_trailing;
            leading_ms -= excess - from_trailing;
            leading_ms = leading_ms.max(0.0);
        }

        let lead_samples = (leading_ms / 1000.0 * sr).round() as usize;
        let trail_samples = (trailing_ms / 1000.0 * sr).round() as usize;
        let end = wave.len().saturating_sub(trail_samples).max(lead_samples);

        let trimmed = Waveform::new(wave.samples[lead_samples..end].to_vec(), wave.sample_rate);
        let info = TrimInfo {
            trimmed: lead_samples > 0 || trail_samples > 0,
            leading_removed_ms: leading_ms,
            trailing_removed_ms: trailing_ms,
            original_duration_ms: original_ms,
            trimmed_duration_ms: trimmed.duration_ms(),
        };
        (trimmed, info)
    }
}

fn frame_dbfs(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return -120.0;
    }
    let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / frame.len() as f64).sqrt() as f32;
    if rms <= 1e-6 {
        -120.0
    } else {
        20.0 * rms.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0.3 amplitude tone with the given silence padding, at 44.1 kHz.
    fn padded_tone(leading_ms: f64, tone_ms: f64, trailing_ms: f64) -> Waveform {
        let sr = 44100u32;
        let ms_to_n = |ms: f64| (ms / 1000.0 * sr as f64) as usize;
        let mut samples = vec![0.0f32; ms_to_n(leading_ms)];
        samples.extend(
            (0..ms_to_n(tone_ms))
                .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin() * 0.3),
        );
        samples.extend(vec![0.0f32; ms_to_n(trailing_ms)]);
        Waveform::new(samples, sr)
    }

    #[test]
    fn test_detects_leading_silence_with_margin() {
        let detector = SilenceDetector::new(-40.0, 50.0);
        let wave = padded_tone(800.0, 1000.0, 0.0);
        let bounds = detector.detect_boundaries(&wave);
        // 800ms detected minus 50ms margin, frame-resolution slack
        assert!((bounds.leading_ms - 750.0).abs() < 60.0);
        assert!(bounds.trailing_ms < 60.0);
    }

    #[test]
    fn test_detects_both_sides() {
        let detector = SilenceDetector::new(-40.0, 50.0);
        let wave = padded_tone(500.0, 1000.0, 300.0);
        let bounds = detector.detect_boundaries(&wave);
        assert!((bounds.leading_ms - 450.0).abs() < 60.0);
        assert!((bounds.trailing_ms - 250.0).abs() < 60.0);
    }

    #[test]
    fn test_all_silence_returns_zero_bounds() {
        let detector = SilenceDetector::new(-40.0, 50.0);
        let wave = Waveform::silence(2000.0, 44100);
        assert_eq!(detector.detect_boundaries(&wave), SilenceBounds::default());
    }

    #[test]
    fn test_no_silence_returns_zero_bounds() {
        let detector = SilenceDetector::new(-40.0, 50.0);
        let wave = padded_tone(0.0, 500.0, 0.0);
        let bounds = detector.detect_boundaries(&wave);
        assert!(bounds.leading_ms < 60.0);
        assert!(bounds.trailing_ms < 60.0);
    }

    #[test]
    fn test_empty_waveform() {
        let detector = SilenceDetector::new(-40.0, 50.0);
        let wave = Waveform::new(vec![], 44100);
        assert_eq!(detector.detect_boundaries(&wave), SilenceBounds::default());
    }

    #[test]
    fn test_apply_trim_removes_requested_amount() {
        let detector = SilenceDetector::new(-40.0, 50.0);
        let wave = padded_tone(800.0, 1000.0, 0.0);
        let bounds = SilenceBounds {
            leading_ms: 750.0,
            trailing_ms: 0.0,
        };
        let (trimmed, info) = detector.apply_trim(&wave, bounds, 100.0);
        assert!(info.trimmed);
        assert!((trimmed.duration_ms() - 1050.0).abs() < 2.0);
        assert!((info.leading_removed_ms - 750.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_trim_never_below_min_remain() {
        let detector = SilenceDetector::new(-40.0, 50.0);
        let wave = padded_tone(100.0, 100.0, 100.0);
        // Absurdly aggressive bounds that would leave nothing
        let bounds = SilenceBounds {
            leading_ms: 200.0,
            trailing_ms: 200.0,
        };
        let (trimmed, _) = detector.apply_trim(&wave, bounds, 100.0);
        assert!(trimmed.duration_ms() >= 100.0 - 1.0);
    }
}
