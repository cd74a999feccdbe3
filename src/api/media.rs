//! Host media endpoints / 宿主媒体接口

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use gcs_media_storage::adapter::UploadFile;

use super::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ExistsQuery {
    pub name: String,
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub url: String,
}

/// GET /api/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "code": 200,
        "message": "ok",
        "data": {
            "version": env!("CARGO_PKG_VERSION"),
            "build_time": env!("BUILD_TIME"),
        }
    }))
}

/// POST /api/media/upload - 上传文件到存储桶
///
/// multipart 字段：`file`（必需），`dir`（可选，默认按年月分目录）
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResult>>, StatusCode> {
    let mut target_dir: Option<String> = None;
    let mut received: Option<(String, tempfile::NamedTempFile)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "dir" => target_dir = Some(field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?),
            "file" => {
                let file_name = base_name(field.file_name().unwrap_or("unknown"));
                let temp = tempfile::NamedTempFile::new().map_err(|e| {
                    tracing::error!("Failed to create temp file: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;

                // 流式写入临时文件
                let mut out = tokio::fs::File::create(temp.path())
                    .await
                    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
                while let Some(chunk) = field.chunk().await.map_err(|_| StatusCode::BAD_REQUEST)? {
                    out.write_all(&chunk).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
                }
                out.flush().await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

                received = Some((file_name, temp));
            }
            _ => {}
        }
    }

    let (name, temp) = received.ok_or(StatusCode::BAD_REQUEST)?;
    let file = UploadFile {
        name,
        path: temp.path().to_path_buf(),
    };

    match state.storage.save(&file, target_dir.as_deref()).await {
        Ok(url) => Ok(Json(ApiResponse::success(UploadResult { url }))),
        Err(e) => Ok(Json(ApiResponse::error(500, &e.to_string()))),
    }
}

/// GET /api/media/exists?name=&dir=
pub async fn exists(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExistsQuery>,
) -> Json<ApiResponse<Value>> {
    match state.storage.exists(&query.name, query.dir.as_deref()).await {
        Ok(exists) => Json(ApiResponse::success(json!({ "exists": exists }))),
        Err(e) => Json(ApiResponse::error(500, &e.to_string())),
    }
}

/// POST /api/media/delete - 按公开链接删除
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteRequest>,
) -> Json<ApiResponse<Value>> {
    let path = state.storage.url_to_path(&req.url);
    match state.storage.delete(&path, None).await {
        Ok(()) => Json(ApiResponse::success(json!({ "path": path }))),
        Err(e) => Json(ApiResponse::error(500, &e.to_string())),
    }
}

/// 客户端文件名只保留最后一段
fn base_name(file_name: &str) -> String {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
