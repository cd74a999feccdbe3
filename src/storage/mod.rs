//! Object store capability / 对象存储能力
//!
//! 只提供原语（upload, exists, open_read, delete），路径计算与错误策略由 adapter 负责。
//! Only primitive operations live here; key building and error policies belong to the adapter.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Object byte stream / 对象字节流
pub type ObjectStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Storage error (wraps the underlying client failure) / 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object store returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid storage config: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether this error means the object is absent / 是否表示对象不存在
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Api { status, .. } => *status == 404,
            StorageError::Http(e) => e.status().map(|s| s.as_u16() == 404).unwrap_or(false),
            _ => false,
        }
    }
}

/// Upload options / 上传选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// Destination key in the bucket / 目标对象键
    pub destination: String,
    /// Resumable (session) upload / 断点续传上传
    pub resumable: bool,
    /// Publicly readable / 公开可读
    pub public: bool,
    /// Cache-Control metadata / 缓存控制元数据
    pub cache_control: String,
}

/// Handle of an uploaded object / 已上传对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    pub key: String,
    pub public_url: String,
}

/// Object store client interface (one bucket, one credential) / 对象存储客户端接口
///
/// Implementations must be safe for concurrent use on distinct keys.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Bucket name / 存储桶名称
    fn bucket(&self) -> &str;

    /// Public hostname used in public URLs / 公开访问域名
    fn public_host(&self) -> &str {
        PUBLIC_HOST
    }

    /// Public URL of a key / 对象公开链接
    fn public_url(&self, key: &str) -> String {
        public_url(self.public_host(), self.bucket(), key)
    }

    /// Upload a local file / 上传本地文件
    async fn upload(&self, source: &Path, options: &UploadOptions) -> Result<UploadedObject, StorageError>;

    /// Check whether a key exists / 检查对象是否存在
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Open a read stream; a missing object fails with `NotFound` / 打开读取流
    async fn open_read(&self, key: &str) -> Result<ObjectStream, StorageError>;

    /// Delete a key / 删除对象
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// GCS public hostname / GCS 公开域名
pub const PUBLIC_HOST: &str = "storage.googleapis.com";

/// Build `https://<host>/<bucket>/<key>` with every key segment percent-encoded
/// 构建公开链接，逐段编码
pub fn public_url(host: &str, bucket: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("https://{}/{}/{}", host, bucket, encoded.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_keeps_separators() {
        assert_eq!(
            public_url(PUBLIC_HOST, "my-bucket", "2024/03/photo.jpg"),
            "https://storage.googleapis.com/my-bucket/2024/03/photo.jpg"
        );
        assert_eq!(
            public_url(PUBLIC_HOST, "b", "2024/03/my photo#1.jpg"),
            "https://storage.googleapis.com/b/2024/03/my%20photo%231.jpg"
        );
    }

    #[test]
    fn test_not_found_detection() {
        assert!(StorageError::NotFound("a".into()).is_not_found());
        assert!(StorageError::Api { status: 404, message: String::new() }.is_not_found());
        assert!(!StorageError::Api { status: 500, message: String::new() }.is_not_found());
        assert!(!StorageError::Auth("denied".into()).is_not_found());
    }
}
