//! Service configuration for sentiscope-api
//!
//! Each setting resolves CLI → environment → TOML → compiled default. The
//! environment accepts both `SENTISCOPE_*` names and the bare names used by
//! existing deployments (`HUGGINGFACE_API_KEY`, `JWT_SECRET`, `PORT`, ...).

use sentiscope_common::config::{env_non_empty, first_non_empty, RootFolder, TomlConfig};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_HUGGINGFACE_MODEL_URL: &str =
    "https://router.huggingface.co/hf-inference/models/tabularisai/multilingual-sentiment-analysis";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DATASETS_BASE_URL: &str = "https://datasets-server.huggingface.co";
pub const DEFAULT_TESSERACT_BINARY: &str = "tesseract";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 10;
pub const DEFAULT_CLASSIFIER_INTERVAL_MS: u64 = 100;
pub const DEFAULT_DEEP_GROUP_DELAY_MS: u64 = 1000;
pub const DEFAULT_DATASET_PAGE_DELAY_MS: u64 = 500;
pub const DEFAULT_ACCESS_TOKEN_HOURS: i64 = 24;
pub const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 7;
pub const DEFAULT_BCRYPT_COST: u32 = 10;
pub const DEFAULT_LOG_FILTER: &str = "sentiscope_api=info,sentiscope_common=info,tower_http=info";

/// Tracing filter used when `RUST_LOG` is unset: `[logging] level` or the default
pub fn log_filter_directive(toml: &TomlConfig) -> String {
    toml.logging
        .level
        .as_deref()
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER)
        .to_string()
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub frontend_url: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root: RootFolder,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub huggingface_api_key: Option<String>,
    pub huggingface_model_url: String,
    pub datasets_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub tesseract_binary: String,

    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub bcrypt_cost: u32,

    pub max_upload_bytes: u64,
    pub classifier_interval: Duration,
    pub deep_group_delay: Duration,
    pub dataset_page_delay: Duration,
}

impl ServiceConfig {
    /// Compiled defaults only; nothing is read from the environment
    ///
    /// Token secrets are random per process, so tokens do not survive a
    /// restart unless secrets are configured.
    pub fn with_defaults(root: RootFolder) -> Self {
        Self {
            root,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            huggingface_api_key: None,
            huggingface_model_url: DEFAULT_HUGGINGFACE_MODEL_URL.to_string(),
            datasets_base_url: DEFAULT_DATASETS_BASE_URL.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            tesseract_binary: DEFAULT_TESSERACT_BINARY.to_string(),
            jwt_secret: random_secret(),
            jwt_refresh_secret: random_secret(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_HOURS * 3600,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_DAYS * 24 * 3600,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            classifier_interval: Duration::from_millis(DEFAULT_CLASSIFIER_INTERVAL_MS),
            deep_group_delay: Duration::from_millis(DEFAULT_DEEP_GROUP_DELAY_MS),
            dataset_page_delay: Duration::from_millis(DEFAULT_DATASET_PAGE_DELAY_MS),
        }
    }

    /// Resolve every setting from CLI, environment, TOML and defaults
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig, root: RootFolder) -> Self {
        let mut config = Self::with_defaults(root);

        if let Some(host) = first_non_empty([
            cli.host.clone(),
            env_non_empty("SENTISCOPE_HOST"),
            toml.host.clone(),
        ]) {
            config.host = host;
        }

        config.port = cli
            .port
            .or_else(|| env_parse("SENTISCOPE_PORT"))
            .or_else(|| env_parse("PORT"))
            .or(toml.port)
            .unwrap_or(DEFAULT_PORT);

        if let Some(url) = first_non_empty([
            cli.frontend_url.clone(),
            env_non_empty("SENTISCOPE_FRONTEND_URL"),
            env_non_empty("FRONTEND_URL"),
            toml.frontend_url.clone(),
        ]) {
            config.frontend_url = url;
        }

        config.huggingface_api_key = first_non_empty([
            env_non_empty("SENTISCOPE_HUGGINGFACE_API_KEY"),
            env_non_empty("HUGGINGFACE_API_KEY"),
            toml.huggingface_api_key.clone(),
        ]);
        if let Some(url) = first_non_empty([
            env_non_empty("SENTISCOPE_HUGGINGFACE_MODEL_URL"),
            toml.huggingface_model_url.clone(),
        ]) {
            config.huggingface_model_url = url;
        }

        config.openai_api_key = first_non_empty([
            env_non_empty("SENTISCOPE_OPENAI_API_KEY"),
            env_non_empty("OPENAI_API_KEY"),
            toml.openai_api_key.clone(),
        ]);
        if let Some(url) = first_non_empty([
            env_non_empty("SENTISCOPE_OPENAI_BASE_URL"),
            toml.openai_base_url.clone(),
        ]) {
            config.openai_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = first_non_empty([
            env_non_empty("SENTISCOPE_OPENAI_MODEL"),
            toml.openai_model.clone(),
        ]) {
            config.openai_model = model;
        }

        if let Some(binary) = first_non_empty([
            env_non_empty("SENTISCOPE_TESSERACT"),
            toml.tesseract_binary.clone(),
        ]) {
            config.tesseract_binary = binary;
        }

        match first_non_empty([
            env_non_empty("SENTISCOPE_JWT_SECRET"),
            env_non_empty("JWT_SECRET"),
            toml.jwt_secret.clone(),
        ]) {
            Some(secret) => config.jwt_secret = secret,
            None => warn!("JWT secret not configured, using a random per-process secret"),
        }
        match first_non_empty([
            env_non_empty("SENTISCOPE_JWT_REFRESH_SECRET"),
            env_non_empty("JWT_REFRESH_SECRET"),
            toml.jwt_refresh_secret.clone(),
        ]) {
            Some(secret) => config.jwt_refresh_secret = secret,
            None => warn!("JWT refresh secret not configured, using a random per-process secret"),
        }

        if let Some(hours) = env_parse::<i64>("SENTISCOPE_JWT_EXPIRES_IN_HOURS").or(toml.jwt_expires_in_hours) {
            match token_ttl(hours, 3600) {
                Some(secs) => config.access_token_ttl_secs = secs,
                None => warn!("Ignoring out-of-range access token lifetime: {} hours", hours),
            }
        }
        if let Some(days) =
            env_parse::<i64>("SENTISCOPE_JWT_REFRESH_EXPIRES_IN_DAYS").or(toml.jwt_refresh_expires_in_days)
        {
            match token_ttl(days, 24 * 3600) {
                Some(secs) => config.refresh_token_ttl_secs = secs,
                None => warn!("Ignoring out-of-range refresh token lifetime: {} days", days),
            }
        }
        if let Some(cost) = env_parse::<u32>("SENTISCOPE_BCRYPT_COST") {
            config.bcrypt_cost = cost.clamp(4, 31);
        }

        if let Some(mb) = env_parse::<u64>("SENTISCOPE_MAX_UPLOAD_MB").or(toml.max_upload_mb) {
            match upload_bytes(mb) {
                Some(bytes) => config.max_upload_bytes = bytes,
                None => warn!("Ignoring out-of-range upload limit: {} MB", mb),
            }
        }
        if let Some(ms) = env_parse::<u64>("SENTISCOPE_CLASSIFIER_INTERVAL_MS").or(toml.classifier_interval_ms) {
            config.classifier_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("SENTISCOPE_DEEP_GROUP_DELAY_MS").or(toml.deep_group_delay_ms) {
            config.deep_group_delay = Duration::from_millis(ms);
        }

        config.log_summary();
        config
    }

    /// Upload limit in whole megabytes, for messages
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / (1024 * 1024)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn log_summary(&self) {
        info!("Listen address: {}", self.bind_address());
        info!("Frontend origin: {}", self.frontend_url);
        info!(
            "HuggingFace classifier: {}",
            if self.huggingface_api_key.is_some() { "configured" } else { "NOT configured" }
        );
        info!(
            "OpenAI ({}): {}",
            self.openai_model,
            if self.openai_api_key.is_some() { "configured" } else { "NOT configured (AI features disabled)" }
        );
        info!("Upload limit: {} MB", self.max_upload_mb());
    }
}

/// Largest accepted token lifetime, leaving room for `iat + ttl`
const MAX_TOKEN_TTL_SECS: i64 = i64::MAX / 2;

fn token_ttl(count: i64, unit_secs: i64) -> Option<i64> {
    count
        .max(1)
        .checked_mul(unit_secs)
        .filter(|secs| *secs <= MAX_TOKEN_TTL_SECS)
}

fn upload_bytes(mb: u64) -> Option<u64> {
    mb.max(1)
        .checked_mul(1024 * 1024)
        .filter(|bytes| usize::try_from(*bytes).map_or(false, |b| b <= usize::MAX / 2))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_non_empty(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable value for {}: {:?}", name, raw);
            None
        }
    }
}

fn random_secret() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}
