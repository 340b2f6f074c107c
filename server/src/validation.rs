use mix_core::config::ExportFormat;

use crate::error::ApiError;
use crate::handlers::MixRequest;

/// Maximum text length for TTS requests
const MAX_TEXT_LENGTH: usize = 5000;
/// Maximum number of segments in one mix request
const MAX_SEGMENTS: usize = 64;
/// Sanity bounds for the requested speed factor; the core clamps further
const SPEED_BOUNDS: (f64, f64) = (0.1, 10.0);

/// Validate a mix request before any pipeline work starts.
pub fn validate_mix_request(req: &MixRequest) -> Result<(), ApiError> {
    if req.segments.is_empty() {
        return Err(ApiError::InvalidInput(
            "Segment list cannot be empty".to_string(),
        ));
    }
    if req.segments.len() > MAX_SEGMENTS {
        return Err(ApiError::InvalidInput(format!(
            "Too many segments (max {})",
            MAX_SEGMENTS
        )));
    }

    if let Some(ref formats) = req.formats {
        if formats.is_empty() {
            return Err(ApiError::InvalidInput(
                "Format list cannot be empty".to_string(),
            ));
        }
        for f in formats {
            if ExportFormat::from_str(f).is_none() {
                return Err(ApiError::InvalidInput(format!(
                    "Unsupported export format: {} (expected wav, mp3 or flac)",
                    f
                )));
            }
        }
    }

    if let Some(speed) = req.speed_factor {
        if !speed.is_finite() || speed < SPEED_BOUNDS.0 || speed > SPEED_BOUNDS.1 {
            return Err(ApiError::InvalidInput(format!(
                "Speed factor {} out of bounds [{}, {}]",
                speed, SPEED_BOUNDS.0, SPEED_BOUNDS.1
            )));
        }
    }

    for opt in [
        req.trim_threshold_ms,
        req.crossfade_ms,
        req.pause_duration_ms,
        req.pause_variation_ms,
    ]
    .into_iter()
    .flatten()
    {
        if !opt.is_finite() || opt < 0.0 {
            return Err(ApiError::InvalidInput(
                "Durations must be non-negative numbers".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate TTS request
pub fn validate_tts_request(text: &str) -> Result<(), ApiError> {
    if text.is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.len() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request(segments: Vec<&str>) -> MixRequest {
        MixRequest {
            segments: segments.into_iter().map(|s| s.to_string()).collect(),
            formats: None,
            trim: None,
            trim_threshold_ms: None,
            normalize: None,
            crossfade_ms: None,
            pause_duration_ms: None,
            pause_variation_ms: None,
            speed_factor: None,
            seed: None,
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(validate_mix_request(&base_request(vec!["a.wav", "(500ms)"])).is_ok());
    }

    #[test]
    fn test_empty_segments_rejected() {
        let result = validate_mix_request(&base_request(vec![]));
        assert!(result.is_err());
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("empty"));
        }
    }

    #[test]
    fn test_too_many_segments_rejected() {
        let many: Vec<&str> = std::iter::repeat("a.wav").take(65).collect();
        assert!(validate_mix_request(&base_request(many)).is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut req = base_request(vec!["a.wav"]);
        req.formats = Some(vec!["ogg".to_string()]);
        let result = validate_mix_request(&req);
        assert!(result.is_err());
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("ogg"));
        }
    }

    #[test]
    fn test_speed_bounds() {
        let mut req = base_request(vec!["a.wav"]);
        req.speed_factor = Some(0.01);
        assert!(validate_mix_request(&req).is_err());

        req.speed_factor = Some(f64::NAN);
        assert!(validate_mix_request(&req).is_err());

        req.speed_factor = Some(1.3);
        assert!(validate_mix_request(&req).is_ok());
    }

    #[test]
    fn test_negative_durations_rejected() {
        let mut req = base_request(vec!["a.wav"]);
        req.crossfade_ms = Some(-100.0);
        assert!(validate_mix_request(&req).is_err());
    }

    #[test]
    fn test_validate_tts_request() {
        assert!(validate_tts_request("Hello").is_ok());
        assert!(validate_tts_request("").is_err());
        let long_text = "a".repeat(6000);
        assert!(validate_tts_request(&long_text).is_err());
    }
}
