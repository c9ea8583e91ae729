//! Axum HTTP API server.
//!
//! This crate provides:
//! - Variation generation over `POST /api/v1/generate/video`
//! - Ad-copy drafting over `POST /api/v1/generate/text`
//! - Per-job progress as Server-Sent Events
//! - Reference-image upload and the local video mixer
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
