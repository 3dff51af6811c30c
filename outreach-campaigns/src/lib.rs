//! outreach-campaigns library interface
//!
//! Exposes the router, state and services for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, SendError};

use axum::Router;
use chrono::{DateTime, Utc};
use outreach_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{
    EmailTransport, ListingDirectory, RenderError, SendExecutor, SendThrottle, TemplateRenderer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub executor: Arc<SendExecutor>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, executor: Arc<SendExecutor>) -> Self {
        Self {
            db,
            executor,
            startup_time: Utc::now(),
        }
    }

    /// Wire the renderer, throttle and executor from configuration
    pub fn from_config(
        db: SqlitePool,
        config: &TomlConfig,
        transport: Arc<dyn EmailTransport>,
    ) -> Result<Self, RenderError> {
        let renderer = TemplateRenderer::new(
            ListingDirectory::new(&config.site_url),
            &config.reply_to,
            config.demo_phone_number.clone(),
        )?;

        let executor = SendExecutor::new(
            db.clone(),
            transport,
            Arc::new(renderer),
            SendThrottle::new(config.send_delay_ms),
        );

        Ok(Self::new(db, Arc::new(executor)))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::campaign_routes())
        .merge(api::contact_routes())
        .merge(api::send_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
