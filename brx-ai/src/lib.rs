//! brx-ai library interface
//!
//! Respiratory-sound classification: audio preprocessing, feature
//! extraction, classifier inference, explanation generation and the HTTP API
//! on top of them.

pub mod api;
pub mod error;
pub mod extractors;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use brx_common::config::TomlConfig;
use chrono::{DateTime, Utc};
use extractors::RespiratoryPipeline;
use services::{InsightEngine, PredictionEngine};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved bootstrap configuration
    pub config: Arc<TomlConfig>,
    /// Pipeline plus cached classifier
    pub engine: Arc<PredictionEngine>,
    pub insights: InsightEngine,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// State backed by the process-wide model cache
    pub fn new(config: TomlConfig) -> Self {
        let pipeline = RespiratoryPipeline::new(&config.pipeline);
        let engine = PredictionEngine::new(pipeline, config.paths.model_path.clone());
        let insights = InsightEngine::from_config(&config.explanation);
        Self::with_parts(config, engine, insights)
    }

    pub fn with_parts(config: TomlConfig, engine: PredictionEngine, insights: InsightEngine) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            insights,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(api::health_routes())
        .merge(api::predict_routes(&state.config.server))
        .merge(api::disease_routes())
        .merge(api::pipeline_routes())
        .merge(api::model_routes())
        .method_not_allowed_fallback(api::method_not_allowed);

    Router::new()
        .nest("/api", api)
        .fallback(api::not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
