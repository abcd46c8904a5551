use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::interview::transcribe::Transcriber;
use crate::llm::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    /// Outbound HTTP client for geolocation lookups.
    pub http: reqwest::Client,
    pub config: Config,
    /// Pluggable audio transcriber. Default: WhisperTranscriber.
    pub transcriber: Arc<dyn Transcriber>,
}
