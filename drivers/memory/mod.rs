//! 内存对象存储（测试与本地开发）
//! In-process object store for tests and local development

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;

use crate::storage::{ObjectStoreClient, ObjectStream, StorageError, UploadOptions, UploadedObject};

/// 读取流分块大小
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Stored object snapshot / 已存储对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    pub data: Bytes,
    pub cache_control: String,
    pub public: bool,
}

/// 内存对象存储
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<HashMap<String, MemoryObject>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// 直接写入对象（不经过本地文件）
    pub async fn insert(&self, key: &str, data: impl Into<Bytes>, cache_control: &str) {
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            MemoryObject {
                data: data.into(),
                cache_control: cache_control.to_string(),
                public: true,
            },
        );
    }

    /// 获取对象快照
    pub async fn get(&self, key: &str) -> Option<MemoryObject> {
        self.objects.read().await.get(key).cloned()
    }

    /// 所有对象键（已排序）
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(&self, source: &Path, options: &UploadOptions) -> Result<UploadedObject, StorageError> {
        let data = tokio::fs::read(source).await?;

        tracing::debug!("Memory upload: {:?} -> {} ({} bytes)", source, options.destination, data.len());

        let mut objects = self.objects.write().await;
        objects.insert(
            options.destination.clone(),
            MemoryObject {
                data: Bytes::from(data),
                cache_control: options.cache_control.clone(),
                public: options.public,
            },
        );

        Ok(UploadedObject {
            key: options.destination.clone(),
            public_url: self.public_url(&options.destination),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn open_read(&self, key: &str) -> Result<ObjectStream, StorageError> {
        let data = self
            .objects
            .read()
            .await
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let chunks: Vec<Result<Bytes, StorageError>> = (0..data.len())
            .step_by(READ_CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + READ_CHUNK_SIZE).min(data.len()))))
            .collect();

        Ok(stream::iter(chunks).boxed())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }
}
