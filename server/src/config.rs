// Configuration constants for the server

use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    /// Root directory for stored segment sources and mix outputs.
    pub outputs_root: PathBuf,
    /// Voice library sidecar file.
    pub voices_path: PathBuf,
    /// Maximum multipart upload size, megabytes.
    pub upload_limit_mb: usize,
    /// External TTS/VC engine command; /tts and /convert return 503 without it.
    pub engine_command: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            rate_limit_per_minute: 60,
            request_timeout_secs: 120,
            cors_allowed_origins: None,
            outputs_root: PathBuf::from("outputs"),
            voices_path: PathBuf::from("voices/voices.json"),
            upload_limit_mb: 50,
            engine_command: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let rate_limit_per_minute = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.rate_limit_per_minute);

        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| origins.split(',').map(|s| s.trim().to_string()).collect());

        let outputs_root = std::env::var("OUTPUTS_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.outputs_root);

        let voices_path = std::env::var("VOICES_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.voices_path);

        let upload_limit_mb = std::env::var("UPLOAD_LIMIT_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.upload_limit_mb);

        let engine_command = std::env::var("ENGINE_COMMAND")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Self {
            port,
            rate_limit_per_minute,
            request_timeout_secs,
            cors_allowed_origins,
            outputs_root,
            voices_path,
            upload_limit_mb,
            engine_command,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory holding voice reference audio, next to the sidecar.
    pub fn voices_dir(&self) -> PathBuf {
        self.voices_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
