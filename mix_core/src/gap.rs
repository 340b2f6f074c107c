//! Connective material between adjacent segments.
//!
//! A run is either in manual-silence mode (the caller placed explicit
//! silence somewhere in the list) or natural-pause mode (no explicit
//! silence anywhere); the two never mix within one run. The mode is fixed
//! by a single scan before the pairwise walk starts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::segment::Segment;

/// What goes between one pair of adjacent segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GapDecision {
    /// Direct concatenation.
    None,
    /// Explicit caller-requested silence occupies this boundary.
    ManualSilence(f64),
    /// Randomized pause inserted between two audio segments.
    NaturalPause(f64),
    /// Adjacent audio segments overlap by this many ms.
    Crossfade(f64),
}

/// Gap behavior for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapMode {
    /// Explicit silence appears in the list; natural pauses are disabled.
    Manual,
    /// No explicit silence; eligible pairs may get randomized pauses.
    Natural,
}

/// Decide the mode once, up front, from the full segment list.
pub fn scan_mode(segments: &[Segment]) -> GapMode {
    if segments.iter().any(Segment::is_silence) {
        GapMode::Manual
    } else {
        GapMode::Natural
    }
}

/// Injected randomness source for pause jitter, so tests can pin it.
pub trait PauseJitter {
    fn uniform_range(&mut self, lo: f64, hi: f64) -> f64;
}

/// Production jitter source backed by a seedable RNG. The seed is recorded
/// in the run's metadata, so the audio's randomness is reproducible after
/// the fact.
pub struct RngJitter {
    rng: StdRng,
}

impl RngJitter {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PauseJitter for RngJitter {
    fn uniform_range(&mut self, lo: f64, hi: f64) -> f64 {
        if lo >= hi {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }
}

/// Fixed jitter source; every draw returns the same offset.
pub struct FixedJitter(pub f64);

impl PauseJitter for FixedJitter {
    fn uniform_range(&mut self, _lo: f64, _hi: f64) -> f64 {
        self.0
    }
}

/// Natural pauses never shrink below this, whatever the jitter says.
const MIN_PAUSE_MS: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct GapPolicy {
    pub crossfade_ms: f64,
    pub pause_duration_ms: f64,
    pub pause_variation_ms: f64,
}

impl GapPolicy {
    /// Decide what belongs between `prev` and `curr`.
    ///
    /// Rules, in priority order: a silence segment on either side is its
    /// own gap (never double-insert); crossfade applies between audio
    /// pairs when configured, and beats a natural pause when both would
    /// apply; natural pauses only exist in natural mode, drawn fresh per
    /// gap; otherwise the segments join directly.
    pub fn decide(
        &self,
        prev: Option<&Segment>,
        curr: &Segment,
        mode: GapMode,
        jitter: &mut dyn PauseJitter,
    ) -> GapDecision {
        let Some(prev) = prev else {
            return GapDecision::None;
        };
        if curr.is_silence() || prev.is_silence() {
            return GapDecision::None;
        }

        if self.crossfade_ms > 0.0 {
            return GapDecision::Crossfade(self.crossfade_ms);
        }

        if mode == GapMode::Natural && self.pause_duration_ms > 0.0 {
            let offset =
                jitter.uniform_range(-self.pause_variation_ms, self.pause_variation_ms);
            let actual = (self.pause_duration_ms + offset).max(MIN_PAUSE_MS);
            return GapDecision::NaturalPause(actual);
        }

        GapDecision::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(name: &str) -> Segment {
        Segment::ServerFile {
            path: name.to_string(),
        }
    }

    fn silence(ms: f64) -> Segment {
        Segment::Silence { duration_ms: ms }
    }

    fn policy(crossfade: f64, pause: f64, variation: f64) -> GapPolicy {
        GapPolicy {
            crossfade_ms: crossfade,
            pause_duration_ms: pause,
            pause_variation_ms: variation,
        }
    }

    #[test]
    fn test_scan_mode() {
        assert_eq!(scan_mode(&[audio("a"), silence(500.0)]), GapMode::Manual);
        assert_eq!(scan_mode(&[audio("a"), audio("b")]), GapMode::Natural);
        assert_eq!(scan_mode(&[]), GapMode::Natural);
    }

    #[test]
    fn test_first_segment_gets_no_gap() {
        let p = policy(0.0, 600.0, 0.0);
        let mut j = FixedJitter(0.0);
        assert_eq!(
            p.decide(None, &audio("a"), GapMode::Natural, &mut j),
            GapDecision::None
        );
    }

    #[test]
    fn test_silence_neighbor_suppresses_gap() {
        let p = policy(100.0, 600.0, 0.0);
        let mut j = FixedJitter(0.0);
        // before the silence
        assert_eq!(
            p.decide(Some(&audio("a")), &silence(500.0), GapMode::Manual, &mut j),
            GapDecision::None
        );
        // after the silence
        assert_eq!(
            p.decide(Some(&silence(500.0)), &audio("b"), GapMode::Manual, &mut j),
            GapDecision::None
        );
    }

    #[test]
    fn test_manual_mode_never_inserts_natural_pause() {
        let p = policy(0.0, 600.0, 200.0);
        let mut j = FixedJitter(0.0);
        assert_eq!(
            p.decide(Some(&audio("a")), &audio("b"), GapMode::Manual, &mut j),
            GapDecision::None
        );
    }

    #[test]
    fn test_manual_mode_crossfade_between_audio() {
        let p = policy(80.0, 0.0, 0.0);
        let mut j = FixedJitter(0.0);
        assert_eq!(
            p.decide(Some(&audio("a")), &audio("b"), GapMode::Manual, &mut j),
            GapDecision::Crossfade(80.0)
        );
    }

    #[test]
    fn test_natural_mode_pause_with_jitter() {
        let p = policy(0.0, 600.0, 200.0);
        let mut j = FixedJitter(150.0);
        assert_eq!(
            p.decide(Some(&audio("a")), &audio("b"), GapMode::Natural, &mut j),
            GapDecision::NaturalPause(750.0)
        );
    }

    #[test]
    fn test_natural_pause_floored_at_minimum() {
        let p = policy(0.0, 60.0, 50.0);
        let mut j = FixedJitter(-50.0);
        assert_eq!(
            p.decide(Some(&audio("a")), &audio("b"), GapMode::Natural, &mut j),
            GapDecision::NaturalPause(MIN_PAUSE_MS)
        );
    }

    #[test]
    fn test_crossfade_beats_natural_pause() {
        let p = policy(80.0, 600.0, 200.0);
        let mut j = FixedJitter(0.0);
        assert_eq!(
            p.decide(Some(&audio("a")), &audio("b"), GapMode::Natural, &mut j),
            GapDecision::Crossfade(80.0)
        );
    }

    #[test]
    fn test_rng_jitter_stays_in_range() {
        let mut j = RngJitter::seeded(42);
        for _ in 0..1000 {
            let v = j.uniform_range(-200.0, 200.0);
            assert!((-200.0..=200.0).contains(&v));
        }
    }

    #[test]
    fn test_rng_jitter_is_reproducible() {
        let mut a = RngJitter::seeded(7);
        let mut b = RngJitter::seeded(7);
        for _ in 0..100 {
            assert_eq!(a.uniform_range(0.0, 1.0), b.uniform_range(0.0, 1.0));
        }
    }
}
