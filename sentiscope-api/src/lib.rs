//! sentiscope-api library interface
//!
//! Exposes the router and state so integration tests can drive the service
//! without binding a socket.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{
    AiService, AuthService, DatasetService, DatasetSource, DatasetsServerClient, FileStorage,
    HuggingFaceClient, LanguageModel, OpenAiClient, SentimentClassifier, SentimentService,
    TesseractClient, TextExtractor, TokenService,
};

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// External services the application talks to
pub struct Backends {
    pub classifier: Arc<dyn SentimentClassifier>,
    /// `None` disables every language-model feature
    pub language_model: Option<Arc<dyn LanguageModel>>,
    pub ocr: Arc<dyn TextExtractor>,
    pub datasets: Arc<dyn DatasetSource>,
}

impl Backends {
    /// HTTP and CLI clients built from configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ApiError> {
        let classifier = HuggingFaceClient::new(
            config.huggingface_model_url.clone(),
            config.huggingface_api_key.clone(),
            config.classifier_interval,
        )?;

        let language_model: Option<Arc<dyn LanguageModel>> = match &config.openai_api_key {
            Some(key) => Some(Arc::new(OpenAiClient::new(
                config.openai_base_url.clone(),
                key.clone(),
                config.openai_model.clone(),
            )?)),
            None => None,
        };

        Ok(Self {
            classifier: Arc::new(classifier),
            language_model,
            ocr: Arc::new(TesseractClient::new(config.tesseract_binary.clone())),
            datasets: Arc::new(DatasetsServerClient::new(config.datasets_base_url.clone())?),
        })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<ServiceConfig>,
    pub auth: AuthService,
    pub sentiment: SentimentService,
    pub ai: AiService,
    pub ocr: Arc<dyn TextExtractor>,
    pub datasets: DatasetService,
    pub storage: FileStorage,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServiceConfig, backends: Backends) -> Self {
        let tokens = TokenService::new(
            &config.jwt_secret,
            &config.jwt_refresh_secret,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        );

        Self {
            auth: AuthService::new(db.clone(), tokens, config.bcrypt_cost),
            sentiment: SentimentService::new(backends.classifier),
            ai: AiService::new(backends.language_model),
            ocr: backends.ocr,
            datasets: DatasetService::new(backends.datasets, config.dataset_page_delay),
            storage: FileStorage::new(config.root.storage_dir()),
            config: Arc::new(config),
            db,
            startup_time: Utc::now(),
        }
    }
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => base
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(frontend_url, "Invalid frontend URL, allowing any origin");
            base.allow_origin(AllowOrigin::any())
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes as usize + MULTIPART_OVERHEAD_BYTES;
    let cors = cors_layer(&state.config.frontend_url);

    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::user_routes())
        .merge(api::analysis_routes())
        .merge(api::upload_routes())
        .merge(api::chat_routes())
        .merge(api::dataset_routes())
        .merge(api::file_routes())
        .fallback(api::route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
