//! Storage adapter (host contract implementation) / 存储适配器
//!
//! 设计原则：
//! - 无状态：每次调用只依赖注入的客户端与时钟
//! - 保存失败向上传播，删除失败只记录警告
//! - 不重试、不超时

pub mod mime;
pub mod serve;
pub mod url_path;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::StorageConfig;
use crate::storage::{ObjectStoreClient, ObjectStream, StorageError, UploadOptions};
use crate::utils::{join_key, normalize_slashes};

pub use serve::{ServeError, ServeHandler};
pub use url_path::UrlResolver;

/// Cache-Control for saved and served objects (31 days) / 缓存控制（31天）
pub const SAVE_CACHE_CONTROL: &str = "public, max-age=2678400";
pub const SERVE_CACHE_CONTROL: &str = SAVE_CACHE_CONTROL;

/// How an operation treats client failures / 错误处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log, then return the error / 记录后返回错误
    Propagate,
    /// Log a warning, then report success / 记录警告后视为成功
    Swallow,
}

impl ErrorPolicy {
    pub fn apply<T: Default>(self, operation: &str, key: &str, result: Result<T, StorageError>) -> Result<T, StorageError> {
        match (self, result) {
            (_, Ok(value)) => Ok(value),
            (ErrorPolicy::Propagate, Err(e)) => {
                tracing::error!("{} error for {}: {}", operation, key, e);
                Err(e)
            }
            (ErrorPolicy::Swallow, Err(e)) => {
                tracing::warn!("{} failed for {}: {}", operation, key, e);
                Ok(T::default())
            }
        }
    }
}

pub const SAVE_POLICY: ErrorPolicy = ErrorPolicy::Propagate;
pub const DELETE_POLICY: ErrorPolicy = ErrorPolicy::Swallow;

/// File handed over by the host for saving / 宿主提交保存的文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    /// Original file name / 原始文件名
    pub name: String,
    /// Local source path / 本地源文件路径
    pub path: PathBuf,
}

/// Options for `read` / 读取选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    pub path: String,
}

/// Contract the host content-management system invokes / 宿主调用的存储接口
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Upload a file, return its public URL / 上传并返回公开链接
    async fn save(&self, file: &UploadFile, target_dir: Option<&str>) -> Result<String, StorageError>;

    /// A missing object is `Ok(false)` / 对象不存在时返回 false
    async fn exists(&self, file_name: &str, target_dir: Option<&str>) -> Result<bool, StorageError>;

    /// Request handler for stored content / 内容访问处理器
    fn serve(&self) -> ServeHandler;

    /// Best effort; always `Ok` / 尽力删除，总是返回 Ok
    async fn delete(&self, file_name: &str, target_dir: Option<&str>) -> Result<(), StorageError>;

    /// Lazy byte stream; failures arrive as stream items / 惰性字节流
    fn read(&self, options: &ReadOptions) -> ObjectStream;

    fn url_to_path(&self, url: &str) -> String;

    fn get_target_dir(&self, base_dir: &str) -> String;
}

/// GCS-backed storage adapter / GCS 存储适配器
pub struct StorageAdapter {
    client: Arc<dyn ObjectStoreClient>,
    clock: Arc<dyn Clock>,
    urls: UrlResolver,
}

impl StorageAdapter {
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self::with_clock(client, Arc::new(SystemClock))
    }

    pub fn with_clock(client: Arc<dyn ObjectStoreClient>, clock: Arc<dyn Clock>) -> Self {
        let urls = UrlResolver::new(client.public_host());
        Self { client, clock, urls }
    }

    /// Build the adapter with a GCS client / 使用 GCS 客户端创建
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        Ok(Self::new(crate::drivers::build_client(config)?))
    }

    fn object_key(file_name: &str, target_dir: Option<&str>) -> String {
        join_key(&[target_dir.unwrap_or(""), file_name])
    }
}

#[async_trait]
impl MediaStorage for StorageAdapter {
    async fn save(&self, file: &UploadFile, target_dir: Option<&str>) -> Result<String, StorageError> {
        let target_dir = match target_dir {
            Some(dir) if !dir.is_empty() => dir.to_string(),
            _ => self.get_target_dir(""),
        };
        let key = Self::object_key(&file.name, Some(&target_dir));

        let options = UploadOptions {
            destination: key.clone(),
            resumable: false,
            public: true,
            cache_control: SAVE_CACHE_CONTROL.to_string(),
        };

        let result = self.client.upload(&file.path, &options).await.map(|o| o.public_url);
        if let Ok(ref url) = result {
            tracing::info!("Saved {:?} -> {}", file.path, url);
        }
        SAVE_POLICY.apply("Save", &key, result)
    }

    async fn exists(&self, file_name: &str, target_dir: Option<&str>) -> Result<bool, StorageError> {
        let key = Self::object_key(file_name, target_dir);
        match self.client.exists(&key).await {
            Ok(exists) => Ok(exists),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn serve(&self) -> ServeHandler {
        ServeHandler::new(self.client.clone())
    }

    async fn delete(&self, file_name: &str, target_dir: Option<&str>) -> Result<(), StorageError> {
        let key = Self::object_key(file_name, target_dir);
        let result = self.client.delete(&key).await;
        if result.is_ok() {
            tracing::info!("Deleted {}", key);
        }
        DELETE_POLICY.apply("Delete", &key, result)
    }

    fn read(&self, options: &ReadOptions) -> ObjectStream {
        let key = normalize_slashes(&options.path);
        let client = self.client.clone();

        stream::once(async move {
            client.open_read(&key).await.map_err(|e| {
                tracing::error!("Read error for {}: {}", key, e);
                e
            })
        })
        .try_flatten()
        .boxed()
    }

    fn url_to_path(&self, url: &str) -> String {
        self.urls.resolve(url)
    }

    fn get_target_dir(&self, base_dir: &str) -> String {
        let now = self.clock.now();
        join_key(&[base_dir, &now.year().to_string(), &format!("{:02}", now.month())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use bytes::Bytes;
    use futures::TryStreamExt;

    use crate::clock::FixedClock;
    use crate::drivers::memory::MemoryObjectStore;
    use crate::storage::UploadedObject;

    fn adapter_on(year: i32, month: u32, day: u32) -> (Arc<MemoryObjectStore>, StorageAdapter) {
        let store = Arc::new(MemoryObjectStore::new("media"));
        let clock = Arc::new(FixedClock::on(year, month, day).unwrap());
        (store.clone(), StorageAdapter::with_clock(store, clock))
    }

    fn local_file(dir: &Path, name: &str, content: &[u8]) -> UploadFile {
        let path = dir.join("upload.tmp");
        std::fs::write(&path, content).unwrap();
        UploadFile { name: name.to_string(), path }
    }

    /// 所有操作都返回服务端错误
    struct BrokenStore;

    #[async_trait]
    impl ObjectStoreClient for BrokenStore {
        fn bucket(&self) -> &str {
            "broken"
        }

        async fn upload(&self, _source: &Path, _options: &UploadOptions) -> Result<UploadedObject, StorageError> {
            Err(StorageError::Api { status: 503, message: "unavailable".to_string() })
        }

        async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
            Err(StorageError::Api { status: 503, message: "unavailable".to_string() })
        }

        async fn open_read(&self, _key: &str) -> Result<ObjectStream, StorageError> {
            Err(StorageError::Api { status: 503, message: "unavailable".to_string() })
        }

        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Api { status: 503, message: "unavailable".to_string() })
        }
    }

    #[test]
    fn test_get_target_dir_uses_clock() {
        let (_, adapter) = adapter_on(2024, 3, 15);
        assert_eq!(adapter.get_target_dir(""), "2024/03");
        assert_eq!(adapter.get_target_dir("content/images"), "content/images/2024/03");

        let (_, adapter) = adapter_on(2024, 11, 1);
        assert_eq!(adapter.get_target_dir(""), "2024/11");
    }

    #[tokio::test]
    async fn test_save_exists_delete_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (store, adapter) = adapter_on(2024, 3, 15);
        let file = local_file(dir.path(), "photo.jpg", b"jpeg");

        let url = adapter.save(&file, Some("2023/12")).await.unwrap();
        assert_eq!(url, "https://storage.googleapis.com/media/2023/12/photo.jpg");
        assert!(adapter.exists("photo.jpg", Some("2023/12")).await.unwrap());

        let stored = store.get("2023/12/photo.jpg").await.unwrap();
        assert_eq!(stored.cache_control, SAVE_CACHE_CONTROL);
        assert!(stored.public);

        adapter.delete("photo.jpg", Some("2023/12")).await.unwrap();
        assert!(!adapter.exists("photo.jpg", Some("2023/12")).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_defaults_to_dated_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (store, adapter) = adapter_on(2024, 3, 15);

        let url = adapter.save(&local_file(dir.path(), "a.png", b"png"), None).await.unwrap();
        assert_eq!(url, "https://storage.googleapis.com/media/2024/03/a.png");

        adapter.save(&local_file(dir.path(), "b.png", b"png"), Some("")).await.unwrap();
        assert_eq!(store.keys().await, vec!["2024/03/a.png", "2024/03/b.png"]);
    }

    #[tokio::test]
    async fn test_save_normalizes_backslashes() {
        let dir = tempfile::tempdir().unwrap();
        let (store, adapter) = adapter_on(2024, 3, 15);

        adapter.save(&local_file(dir.path(), "x.txt", b"x"), Some("2024\\03")).await.unwrap();
        assert_eq!(store.keys().await, vec!["2024/03/x.txt"]);
        assert!(adapter.exists("x.txt", Some("2024\\03")).await.unwrap());
    }

    #[tokio::test]
    async fn test_public_url_roundtrips_to_key() {
        let dir = tempfile::tempdir().unwrap();
        let (store, adapter) = adapter_on(2024, 3, 15);
        let names = ["photo.jpg", "my photo (1).jpg", "naïve café.png", "100%.png", "a+b&c=d.txt", "#hash?.gif"];

        for name in names {
            for target in [None, Some("nested/deep/dir")] {
                let url = adapter.save(&local_file(dir.path(), name, b"data"), target).await.unwrap();
                let key = adapter.url_to_path(&url);
                assert!(store.get(&key).await.is_some(), "{} -> {} did not round-trip", url, key);
                assert!(key.ends_with(name));
            }
        }
    }

    #[tokio::test]
    async fn test_save_failure_propagates() {
        let (_, adapter) = adapter_on(2024, 3, 15);
        let missing = UploadFile { name: "a.jpg".to_string(), path: PathBuf::from("/no/such/upload.tmp") };
        assert!(matches!(adapter.save(&missing, None).await, Err(StorageError::Io(_))));

        let broken = StorageAdapter::new(Arc::new(BrokenStore));
        let dir = tempfile::tempdir().unwrap();
        let err = broken.save(&local_file(dir.path(), "a.jpg", b"a"), None).await.unwrap_err();
        assert!(matches!(err, StorageError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_delete_swallows_errors() {
        let (store, adapter) = adapter_on(2024, 3, 15);
        store.insert("keep.txt", Bytes::from_static(b"k"), SAVE_CACHE_CONTROL).await;

        assert!(adapter.delete("missing.txt", None).await.is_ok());
        assert_eq!(store.keys().await, vec!["keep.txt"]);

        let broken = StorageAdapter::new(Arc::new(BrokenStore));
        assert!(broken.delete("a.txt", Some("2024/03")).await.is_ok());
    }

    #[tokio::test]
    async fn test_exists_propagates_other_errors() {
        let broken = StorageAdapter::new(Arc::new(BrokenStore));
        assert!(broken.exists("a.txt", None).await.is_err());
    }

    #[tokio::test]
    async fn test_read_streams_bytes() {
        let (store, adapter) = adapter_on(2024, 3, 15);
        store.insert("2024/03/notes.txt", Bytes::from_static(b"hello"), SAVE_CACHE_CONTROL).await;

        let chunks: Vec<Bytes> = adapter
            .read(&ReadOptions { path: "2024\\03\\notes.txt".to_string() })
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"hello");
    }

    #[tokio::test]
    async fn test_read_errors_arrive_in_stream() {
        let (_, adapter) = adapter_on(2024, 3, 15);
        let mut stream = adapter.read(&ReadOptions { path: "missing.txt".to_string() });
        let first = stream.next().await.unwrap();
        assert!(first.unwrap_err().is_not_found());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_error_policies() {
        let swallowed: Result<(), StorageError> =
            DELETE_POLICY.apply("Delete", "k", Err(StorageError::NotFound("k".to_string())));
        assert!(swallowed.is_ok());

        let propagated: Result<String, StorageError> =
            SAVE_POLICY.apply("Save", "k", Err(StorageError::NotFound("k".to_string())));
        assert!(propagated.is_err());
    }
}
