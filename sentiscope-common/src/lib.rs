//! # SentiScope Common Library
//!
//! Shared code for the SentiScope services including:
//! - Database initialization, migrations and row models
//! - API response envelopes and pagination
//! - Configuration loading and root folder resolution
//! - Sentiment label vocabulary

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod sentiment;
pub mod time;

pub use error::{Error, Result};
pub use sentiment::SentimentLabel;
