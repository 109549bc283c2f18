//! HTTP request/response logging middleware for axum services.
//!
//! Inbound traffic is observed by [`middleware::HttpLogger`], installed with
//! `axum::middleware::from_fn_with_state` or [`middleware::TrafficLogging::apply`].
//! Outbound calls made with `reqwest` go through [`middleware::OutboundLogger`].
//! Both emit one [`middleware::LogRecord`] per exchange to a
//! [`middleware::LogSink`], at a severity picked from the response status.

use std::sync::Arc;

pub mod app;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;

pub use error::{Error, Result};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
}
