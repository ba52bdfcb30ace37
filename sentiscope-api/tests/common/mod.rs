//! Shared harness for sentiscope-api integration tests
//!
//! Builds the real router over a temp-dir database with stub external
//! services, so no test reaches the network or needs tesseract installed.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use sentiscope_api::config::ServiceConfig;
use sentiscope_api::services::openai_client::CompletionRequest;
use sentiscope_api::services::sentiment::Sentiment;
use sentiscope_api::services::{DatasetSource, LanguageModel, SentimentClassifier, TextExtractor};
use sentiscope_api::services::ocr::OcrError;
use sentiscope_api::{build_router, ApiError, AppState, Backends};
use sentiscope_common::config::RootFolder;
use sentiscope_common::db::init_database;
use sentiscope_common::SentimentLabel;
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

/// love → positive, hate → negative, fail → error, anything else neutral
pub struct KeywordClassifier {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SentimentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Sentiment, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();

        if lower.contains("fail") {
            return Err(ApiError::service_unavailable(
                "Model is loading, please try again in a moment",
            ));
        }

        let (label, score) = if lower.contains("love") {
            (SentimentLabel::Positive, 0.9)
        } else if lower.contains("hate") {
            (SentimentLabel::Negative, 0.8)
        } else {
            (SentimentLabel::Neutral, 0.6)
        };
        Ok(Sentiment { label, score })
    }
}

/// JSON verdicts in JSON mode, a fixed sentence otherwise
pub struct StubModel;

pub const STUB_REPLY: &str = "Most customers are happy with delivery.";

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ApiError> {
        if request.json_mode {
            Ok(json!({
                "sentiment": "positive",
                "score": 0.8,
                "explanation": "Upbeat wording",
                "keyPhrases": ["great"],
                "comments": [
                    {"username": "@ana", "timestamp": "1h", "comment": "I love the colour"},
                    {"comment": "I hate the packaging"}
                ]
            })
            .to_string())
        } else {
            Ok(STUB_REPLY.to_string())
        }
    }
}

/// Returns the same text for every image
pub struct StubOcr(pub String);

#[async_trait]
impl TextExtractor for StubOcr {
    async fn extract_text(&self, image_path: &Path) -> Result<String, OcrError> {
        if !image_path.exists() {
            return Err(OcrError::FileNotFound(image_path.display().to_string()));
        }
        Ok(self.0.clone())
    }
}

/// In-memory dataset rows
pub struct StubDatasets(pub Vec<Map<String, Value>>);

#[async_trait]
impl DatasetSource for StubDatasets {
    async fn fetch_rows(
        &self,
        _dataset: &str,
        _config: &str,
        _split: &str,
        offset: usize,
        length: usize,
    ) -> Result<Vec<Map<String, Value>>, ApiError> {
        Ok(self.0.iter().skip(offset).take(length).cloned().collect())
    }

    async fn dataset_info(&self, dataset: &str) -> Result<Value, ApiError> {
        Ok(json!({"dataset_info": {"name": dataset}}))
    }
}

pub fn review_row(review: &str, rating: i64, product: &str) -> Map<String, Value> {
    match json!({"review": review, "rating": rating, "product_name": product}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub classifier_calls: Arc<AtomicUsize>,
    pub root: TempDir,
}

pub struct TestOptions {
    pub with_ai: bool,
    pub ocr_text: String,
    pub max_upload_bytes: u64,
    pub dataset_rows: Vec<Map<String, Value>>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            with_ai: false,
            ocr_text: "Great seller\nI hate the late shipping\nok".to_string(),
            max_upload_bytes: 1024 * 1024,
            dataset_rows: Vec::new(),
        }
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let root = tempfile::tempdir().unwrap();
        let folder = RootFolder::new(root.path());
        folder.ensure_directories().unwrap();

        let pool = init_database(&folder.database_path()).await.unwrap();

        let mut config = ServiceConfig::with_defaults(folder);
        config.jwt_secret = "test-access-secret".to_string();
        config.jwt_refresh_secret = "test-refresh-secret".to_string();
        config.bcrypt_cost = 4;
        config.max_upload_bytes = options.max_upload_bytes;
        config.classifier_interval = Duration::ZERO;
        config.deep_group_delay = Duration::ZERO;
        config.dataset_page_delay = Duration::ZERO;

        let classifier_calls = Arc::new(AtomicUsize::new(0));
        let backends = Backends {
            classifier: Arc::new(KeywordClassifier {
                calls: classifier_calls.clone(),
            }),
            language_model: options
                .with_ai
                .then(|| Arc::new(StubModel) as Arc<dyn LanguageModel>),
            ocr: Arc::new(StubOcr(options.ocr_text)),
            datasets: Arc::new(StubDatasets(options.dataset_rows)),
        };

        let state = AppState::new(pool.clone(), config, backends);

        Self {
            router: build_router(state),
            pool,
            classifier_calls,
            root,
        }
    }

    pub fn classifier_calls(&self) -> usize {
        self.classifier_calls.load(Ordering::SeqCst)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, token, None)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::DELETE, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request(Method::POST, uri, token, Some(body))).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(request(Method::PUT, uri, token, Some(body))).await
    }

    /// Raw body and content type of an authenticated GET
    pub async fn download(&self, uri: &str, token: &str) -> (StatusCode, Vec<u8>, String) {
        let response = self
            .router
            .clone()
            .oneshot(request(Method::GET, uri, Some(token), None))
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, bytes, content_type)
    }

    /// Register a user and return its access token
    pub async fn register(&self, email: &str, password: &str) -> String {
        let (status, json) = self
            .post(
                "/api/auth/register",
                None,
                json!({"email": email, "password": password, "firstName": "Test", "lastName": "User"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", json);
        json["data"]["accessToken"].as_str().unwrap().to_string()
    }

    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        file_name: &str,
        bytes: &[u8],
        fields: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let (content_type, body) = multipart_body(file_name, bytes, fields);
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Number of files left in the upload temp directory
    pub fn temp_upload_count(&self) -> usize {
        std::fs::read_dir(self.root.path().join("uploads"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn multipart_body(file_name: &str, bytes: &[u8], fields: &[(&str, &str)]) -> (String, Vec<u8>) {
    let boundary = "sentiscope-test-boundary";
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            boundary, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}
