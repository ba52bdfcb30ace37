//! HTTP API handlers for sentiscope-api
//!
//! Every route under `/api` answers with the `{success, message, data}`
//! envelope; failures render through [`crate::ApiError`].

pub mod analysis;
pub mod auth;
pub mod chat;
pub mod datasets;
pub mod extract;
pub mod files;
pub mod health;
pub mod uploads;
pub mod users;

pub use analysis::analysis_routes;
pub use auth::auth_routes;
pub use chat::chat_routes;
pub use datasets::dataset_routes;
pub use extract::{AuthUser, JsonBody};
pub use files::file_routes;
pub use health::{health_routes, route_not_found};
pub use uploads::upload_routes;
pub use users::user_routes;
