//! Serve stored objects over HTTP / 通过 HTTP 提供已存储对象

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::TryStreamExt;
use thiserror::Error;

use crate::storage::{ObjectStoreClient, StorageError};
use super::mime::content_type_for;
use super::url_path::decode_component;
use super::SERVE_CACHE_CONTROL;

/// Error handed to the next stage; the handler writes nothing itself
/// 交给下一层处理的错误，处理器本身不写响应
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("File not found")]
    NotFound,

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ServeError {
    fn from(err: StorageError) -> Self {
        if err.is_not_found() {
            ServeError::NotFound
        } else {
            ServeError::Storage(err)
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        match self {
            ServeError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ServeError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Request handler returned by `serve()` / serve() 返回的请求处理器
#[derive(Clone)]
pub struct ServeHandler {
    client: Arc<dyn ObjectStoreClient>,
}

impl ServeHandler {
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self { client }
    }

    /// Handle a request path (relative to the mount point) / 处理请求路径
    pub async fn handle(&self, request_path: &str) -> Result<Response, ServeError> {
        // 1. 去掉开头的斜杠得到对象键
        let key = request_key(request_path);

        // 2. 检查对象是否存在
        let exists = self.client.exists(&key).await.map_err(|e| {
            tracing::error!("Serve error for {}: {}", key, e);
            ServeError::from(e)
        })?;
        tracing::debug!("File exists in GCS: {} -> {}", key, exists);

        if !exists {
            tracing::info!("File not found in GCS: {}", key);
            return Err(ServeError::NotFound);
        }

        // 3. 打开读取流，打开时的 404 同样视为不存在
        let stream = self.client.open_read(&key).await.map_err(|e| {
            tracing::error!("Error reading {}: {}", key, e);
            ServeError::from(e)
        })?;

        // 4. 读取过程中的错误记录后随响应体传递
        let log_key = key.clone();
        let stream = stream.inspect_err(move |e| tracing::error!("Error reading {}: {}", log_key, e));

        let mut response = Body::from_stream(stream).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&key)));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(SERVE_CACHE_CONTROL));
        Ok(response)
    }

    /// axum router; mount it with `nest_service` / 挂载用路由
    pub fn into_router(self) -> Router {
        Router::new()
            .route("/*key", get(serve_object))
            .with_state(self)
    }
}

async fn serve_object(State(handler): State<ServeHandler>, uri: Uri) -> Result<Response, ServeError> {
    handler.handle(uri.path()).await
}

/// Request path -> object key / 请求路径转对象键
fn request_key(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    decode_component(trimmed).unwrap_or_else(|| trimmed.to_string())
}
