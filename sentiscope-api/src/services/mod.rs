//! Services for sentiscope-api
//!
//! External-service clients (HuggingFace inference and datasets, OpenAI,
//! Tesseract) sit behind traits so handlers and tests can swap them.

pub mod ai;
pub mod auth;
pub mod csv_ingest;
pub mod datasets;
pub mod deep_analysis;
pub mod huggingface_client;
pub mod keywords;
pub mod ocr;
pub mod openai_client;
pub mod pipeline;
pub mod sentiment;
pub mod storage;
pub mod tokens;
pub mod uploads;

pub use ai::AiService;
pub use auth::AuthService;
pub use datasets::{DatasetService, DatasetSource, DatasetsServerClient};
pub use huggingface_client::HuggingFaceClient;
pub use ocr::{TesseractClient, TextExtractor};
pub use openai_client::{LanguageModel, OpenAiClient};
pub use sentiment::{SentimentClassifier, SentimentService};
pub use storage::FileStorage;
pub use tokens::TokenService;
