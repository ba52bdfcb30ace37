//! Shared HTTP API types
//!
//! Pure data types and helpers with no HTTP framework dependency; the axum
//! service wraps them in extractors and responses.

pub mod pagination;
pub mod types;

pub use pagination::{calculate_pagination, Pagination, PageQuery};
pub use types::{ApiResponse, FieldError, Paginated};
