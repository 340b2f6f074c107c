//! REST adapter around the mixing engine and the voice library.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod validation;

use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use mix_core::Mixer;
use voice_core::{CommandEngine, VoiceLibrary};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub mixer: Arc<Mixer>,
    pub library: Arc<VoiceLibrary>,
    pub engine: Option<Arc<CommandEngine>>,
    pub voices_dir: PathBuf,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        mixer: Mixer,
        library: VoiceLibrary,
        engine: Option<CommandEngine>,
        config: ServerConfig,
    ) -> Self {
        Self {
            mixer: Arc::new(mixer),
            library: Arc::new(library),
            engine: engine.map(Arc::new),
            voices_dir: config.voices_dir(),
            request_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }
}

/// Build the application router. Cross-cutting middleware (trace, rate
/// limit, timeout, CORS) is layered on top by `main`, so tests can drive
/// these routes directly.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.upload_limit_mb * 1024 * 1024;

    let public_api = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        .route("/voices", get(handlers::list_voices))
        .route("/voices/detail", get(handlers::list_voices_detail))
        .route("/mix", post(handlers::mix_endpoint))
        .route("/tts", post(handlers::tts_endpoint))
        .route("/convert", post(handlers::convert_endpoint));

    let metrics_api = Router::new().route("/metrics", get(metrics::metrics_endpoint));

    let api = Router::new().merge(public_api).merge(metrics_api);

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
