//! Common utilities for integration tests

use axum::Router;
use std::path::Path;

use mix_core::speed::{ResampleBackend, SpeedAdjuster};
use mix_core::{MixConfig, Mixer};
use server::config::ServerConfig;
use server::{build_router, AppState};
use voice_core::VoiceLibrary;
use tempfile::TempDir;

/// Create a test app over a private outputs root. The returned guard keeps
/// the directory alive for the duration of the test.
pub fn create_test_app() -> (Router, TempDir) {
    let outputs = tempfile::tempdir().expect("failed to create outputs dir");

    let config = ServerConfig {
        outputs_root: outputs.path().to_path_buf(),
        ..Default::default()
    };

    // Only the in-process resample backend, so tests never shell out
    let mix_config = MixConfig::default().with_outputs_root(outputs.path());
    let speed = SpeedAdjuster::with_backends(vec![Box::new(ResampleBackend)], (0.5, 2.0));
    let mixer = Mixer::with_speed(mix_config, speed);

    let state = AppState::new(mixer, VoiceLibrary::new(), None, config);
    (build_router(state), outputs)
}

/// Write a short 440 Hz tone into the outputs root.
pub fn write_fixture(dir: &Path, name: &str, tone_ms: f64) {
    let sr = 44100u32;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sr,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(dir.join(name), spec).unwrap();
    let n = (tone_ms / 1000.0 * sr as f64) as usize;
    for i in 0..n {
        let s = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin() * 0.3;
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

pub const BOUNDARY: &str = "voicemix-test-boundary";

/// Build a multipart/form-data body with a `request` JSON part and any
/// number of `file` parts.
pub fn multipart_body(request_json: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"request\"\r\n\r\n{request_json}\r\n"
        )
        .as_bytes(),
    );
    for (filename, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
