//! Database queries for sentiscope-api

pub mod analyses;
pub mod chat_messages;
pub mod users;
