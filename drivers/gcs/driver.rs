//! GCS 客户端核心实现（JSON API）
//!
//! 设计原则：
//! - 每个操作一次请求（可续传上传为两次），不重试
//! - 下载为流式读取，不落盘
//! - 小文件 multipart 一次上传，大文件走可续传会话并流式发送

use std::path::Path;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, Body, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use crate::config::StorageConfig;
use crate::storage::{ObjectStoreClient, ObjectStream, StorageError, UploadOptions, UploadedObject};
use super::auth::{ServiceAccountKey, TokenProvider};

/// GCS API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Files above this size always use a resumable session / 超过此大小强制使用可续传上传
pub const MULTIPART_MAX_SIZE: u64 = 8 * 1024 * 1024;

/// 流式上传读取块大小
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// 对象元数据响应（只取需要的字段）
#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
}

/// GCS 客户端
pub struct GcsClient {
    project_id: String,
    bucket: String,
    endpoint: String,
    http: Client,
    auth: TokenProvider,
    multipart_max_size: u64,
}

impl GcsClient {
    /// 创建客户端（官方端点）
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        Self::with_endpoint(config, DEFAULT_ENDPOINT)
    }

    /// 创建客户端（自定义端点，例如模拟器）
    pub fn with_endpoint(config: &StorageConfig, endpoint: &str) -> Result<Self, StorageError> {
        config.validate()?;

        let http = Client::new();
        let auth = match &config.key_filename {
            Some(path) => TokenProvider::service_account(ServiceAccountKey::from_file(path)?, http.clone()),
            None => TokenProvider::anonymous(http.clone()),
        };

        tracing::info!(
            "GCS client ready: project={}, bucket={}, endpoint={}, anonymous={}",
            config.project_id,
            config.bucket_name,
            endpoint,
            auth.is_anonymous()
        );

        Ok(Self {
            project_id: config.project_id.clone(),
            bucket: config.bucket_name.clone(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
            auth,
            multipart_max_size: MULTIPART_MAX_SIZE,
        })
    }

    /// 调整 multipart 上传的大小上限
    pub fn with_multipart_max_size(mut self, size: u64) -> Self {
        self.multipart_max_size = size;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// 对象元数据 URL，键整体编码（/ 编码为 %2F）
    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(key)
        )
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.endpoint, urlencoding::encode(&self.bucket))
    }

    /// 附加访问令牌
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, StorageError> {
        Ok(match self.auth.bearer().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    fn upload_query(kind: &str, options: &UploadOptions) -> Vec<(&'static str, String)> {
        let mut query = vec![("uploadType", kind.to_string())];
        if options.public {
            query.push(("predefinedAcl", "publicRead".to_string()));
        }
        query
    }

    /// 单次 multipart/related 上传（仅用于小文件）
    async fn upload_multipart(&self, source: &Path, options: &UploadOptions, content_type: &str) -> Result<Response, StorageError> {
        let data = tokio::fs::read(source).await?;
        let boundary = format!("gcs-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &object_metadata(options, content_type), content_type, &data);

        let request = self
            .http
            .post(self.upload_url())
            .query(&Self::upload_query("multipart", options))
            .header(header::CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
            .body(body);

        let response = self.authorize(request).await?.send().await?;
        check_response(response, &options.destination).await
    }

    /// 可续传上传：先创建会话，再流式 PUT 文件内容
    async fn upload_resumable(&self, source: &Path, size: u64, options: &UploadOptions, content_type: &str) -> Result<Response, StorageError> {
        let file = tokio::fs::File::open(source).await?;

        let request = self
            .http
            .post(self.upload_url())
            .query(&Self::upload_query("resumable", options))
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&object_metadata(options, content_type));

        let response = self.authorize(request).await?.send().await?;
        let response = check_response(response, &options.destination).await?;

        let session_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| StorageError::Api {
                status: response.status().as_u16(),
                message: "resumable upload session has no Location header".to_string(),
            })?;

        tracing::debug!("GCS resumable session created: key={}", options.destination);

        let body = Body::wrap_stream(ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE));
        let response = self
            .http
            .put(&session_url)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, size.to_string())
            .body(body)
            .send()
            .await?;
        check_response(response, &options.destination).await
    }
}

/// Object metadata sent with uploads / 上传时附带的对象元数据
fn object_metadata(options: &UploadOptions, content_type: &str) -> Value {
    json!({
        "name": options.destination,
        "cacheControl": options.cache_control,
        "contentType": content_type,
    })
}

/// 构建 multipart/related 请求体
fn multipart_body(boundary: &str, metadata: &Value, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// 将非 2xx 响应转换为错误，404 转换为 NotFound
async fn check_response(response: Response, key: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound(key.to_string()));
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api { status: status.as_u16(), message })
}

#[async_trait]
impl ObjectStoreClient for GcsClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, source: &Path, options: &UploadOptions) -> Result<UploadedObject, StorageError> {
        let size = tokio::fs::metadata(source).await?.len();
        let content_type = mime_guess::from_path(&options.destination).first_or_octet_stream();
        let resumable = options.resumable || size > self.multipart_max_size;

        tracing::debug!(
            "GCS upload: {:?} -> {} ({} bytes, resumable={})",
            source,
            options.destination,
            size,
            resumable
        );

        let response = if resumable {
            self.upload_resumable(source, size, options, content_type.as_ref()).await?
        } else {
            self.upload_multipart(source, options, content_type.as_ref()).await?
        };

        let resource: ObjectResource = response.json().await?;
        Ok(UploadedObject {
            public_url: self.public_url(&resource.name),
            key: resource.name,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let request = self.http.get(self.object_url(key)).query(&[("fields", "name")]);
        let response = self.authorize(request).await?.send().await?;

        match check_response(response, key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn open_read(&self, key: &str) -> Result<ObjectStream, StorageError> {
        let request = self.http.get(self.object_url(key)).query(&[("alt", "media")]);
        let response = self.authorize(request).await?.send().await?;
        let response = check_response(response, key).await?;

        Ok(response.bytes_stream().map_err(StorageError::from).boxed())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let request = self.http.delete(self.object_url(key));
        let response = self.authorize(request).await?.send().await?;
        check_response(response, key).await?;
        Ok(())
    }
}
