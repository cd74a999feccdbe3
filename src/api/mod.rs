pub mod media;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: None,
        }
    }
}

/// Host API routes plus the mounted content handler / 宿主 API 路由与内容挂载
pub fn routes(state: Arc<AppState>) -> Router {
    let content = state.storage.serve().into_router();

    Router::new()
        .route("/api/health", get(media::health))
        .route("/api/media/upload", post(media::upload))
        .route("/api/media/exists", get(media::exists))
        .route("/api/media/delete", post(media::delete))
        .layer(DefaultBodyLimit::disable())
        .with_state(state.clone())
        .nest_service(&state.mount_path, content)
}
