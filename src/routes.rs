use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::error;

use crate::aggregator::{Aggregator, PipelineError};
use crate::store::SnapshotStore;

pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub store: Arc<SnapshotStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/update-news", get(update_news))
        .route("/api/news", get(stored_news))
        .route("/health", get(health))
        .with_state(state)
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(PipelineError::NoData) = self.0.downcast_ref::<PipelineError>() {
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "No stories found");
        }

        error!("Request failed: {:#}", self.0);
        json_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("Error: {}", self.0))
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

/// Runs the whole pipeline for this request. The stored file is not touched.
pub async fn update_news(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let news = state.aggregator.run().await?;
    let snapshot = state.store.assemble(news, state.aggregator.registry()).await;
    Ok(Json(snapshot))
}

pub async fn stored_news(State(state): State<Arc<AppState>>) -> Response {
    match state.store.load().await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "No snapshot available"),
    }
}

pub async fn health() -> &'static str {
    "OK"
}
