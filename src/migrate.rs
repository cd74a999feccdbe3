//! Local content -> bucket migration / 本地内容迁移到存储桶
//!
//! 逐个分类遍历本地目录，按顺序上传每个文件。
//! 单个文件失败只记录，不中断整个任务。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::config::{ContentCategory, MigrationConfig};
use crate::storage::{ObjectStoreClient, UploadOptions};
use crate::utils::join_key;

/// One failed file / 单个失败文件
#[derive(Debug, Clone, Serialize)]
pub struct MigrationFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Migration summary / 迁移结果汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    /// Files an upload was attempted for / 尝试上传的文件数
    pub attempted: usize,
    /// Object keys uploaded / 成功上传的对象键
    pub uploaded: Vec<String>,
    pub failed: Vec<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Migrator {
    client: Arc<dyn ObjectStoreClient>,
    config: MigrationConfig,
}

impl Migrator {
    pub fn new(client: Arc<dyn ObjectStoreClient>, config: MigrationConfig) -> Self {
        Self { client, config }
    }

    /// Migrate every category in order / 依次迁移所有分类
    pub async fn run(&self) -> MigrationReport {
        let mut report = MigrationReport::default();

        for category in &self.config.categories {
            self.migrate_category(category, &mut report).await;
        }

        tracing::info!(
            "Migration finished: {} attempted, {} uploaded, {} failed",
            report.attempted,
            report.uploaded.len(),
            report.failed.len()
        );
        report
    }

    async fn migrate_category(&self, category: &ContentCategory, report: &mut MigrationReport) {
        if !category.path.is_dir() {
            tracing::warn!("Skipping {}: directory {:?} not found", category.name, category.path);
            return;
        }

        tracing::info!("Migrating category {} from {:?}", category.name, category.path);

        for entry in list_files(&category.path) {
            let file = match entry {
                Ok(file) => file,
                Err(failure) => {
                    tracing::error!("✗ Failed: {:?} ({})", failure.path, failure.error);
                    report.failed.push(failure);
                    continue;
                }
            };
            let Some(key) = relative_key(&category.path, &file) else {
                continue;
            };
            report.attempted += 1;

            tracing::info!("Migrating: {:?} -> {}", file, key);
            let options = UploadOptions {
                destination: key.clone(),
                resumable: false,
                public: true,
                cache_control: self.config.cache_control.clone(),
            };

            match self.client.upload(&file, &options).await {
                Ok(_) => {
                    tracing::info!("✓ Success: {}", key);
                    report.uploaded.push(key);
                }
                Err(e) => {
                    tracing::error!("✗ Failed: {:?} ({})", file, e);
                    report.failed.push(MigrationFailure {
                        path: file,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Regular files under `root`, sorted by name / 目录下所有普通文件（按名称排序）
///
/// 跳过以 `.` 开头的文件和目录；符号链接按目标处理，无法访问的条目作为失败返回
fn list_files(root: &Path) -> Vec<Result<PathBuf, MigrationFailure>> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_file() => Some(Ok(e.into_path())),
            Ok(_) => None,
            Err(e) => Some(Err(MigrationFailure {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
                error: e.to_string(),
            })),
        })
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Object key: path relative to the category root, `/`-joined
fn relative_key(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    Some(join_key(&refs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::config::StorageConfig;
    use crate::drivers::memory::MemoryObjectStore;
    use crate::storage::{ObjectStream, StorageError, UploadedObject};

    /// 指定键上传失败，其余委托给内存存储
    struct FlakyStore {
        inner: MemoryObjectStore,
        fail_key: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStoreClient for FlakyStore {
        fn bucket(&self) -> &str {
            self.inner.bucket()
        }

        async fn upload(&self, source: &Path, options: &UploadOptions) -> Result<UploadedObject, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if options.destination == self.fail_key {
                return Err(StorageError::Api { status: 500, message: "boom".to_string() });
            }
            self.inner.upload(source, options).await
        }

        async fn exists(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.exists(key).await
        }

        async fn open_read(&self, key: &str) -> Result<ObjectStream, StorageError> {
            self.inner.open_read(key).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn config_for(categories: Vec<ContentCategory>) -> MigrationConfig {
        MigrationConfig {
            storage: StorageConfig::default(),
            categories,
            cache_control: "public, max-age=31536000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_keys_are_relative_to_category() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("content/images");
        write(&images, "2024/03/a.png", "a");
        write(&images, "logo.svg", "svg");

        let store = Arc::new(MemoryObjectStore::new("media"));
        let migrator = Migrator::new(store.clone(), config_for(vec![ContentCategory::new("images", &images)]));
        let report = migrator.run().await;

        assert!(report.is_success());
        assert_eq!(report.attempted, 2);
        assert_eq!(store.keys().await, vec!["2024/03/a.png", "logo.svg"]);

        let object = store.get("logo.svg").await.unwrap();
        assert_eq!(object.cache_control, "public, max-age=31536000");
        assert!(object.public);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_migration() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("content/files");
        for name in ["a.txt", "b.txt", "c.txt", "d/e.txt"] {
            write(&files, name, name);
        }

        let store = Arc::new(FlakyStore {
            inner: MemoryObjectStore::new("media"),
            fail_key: "b.txt".to_string(),
            calls: AtomicUsize::new(0),
        });
        let migrator = Migrator::new(store.clone(), config_for(vec![ContentCategory::new("files", &files)]));
        let report = migrator.run().await;

        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.attempted, 4);
        assert_eq!(report.uploaded, vec!["a.txt", "c.txt", "d/e.txt"]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("b.txt"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_hidden_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("content/images");
        write(&images, ".DS_Store", "junk");
        write(&images, ".thumbs/a.png", "thumb");
        write(&images, "b.png", "b");

        let store = Arc::new(MemoryObjectStore::new("media"));
        let report = Migrator::new(store.clone(), config_for(vec![ContentCategory::new("images", &images)]))
            .run()
            .await;

        assert_eq!(report.attempted, 1);
        assert_eq!(store.keys().await, vec!["b.png"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("content/files");
        write(&files, "ok.txt", "ok");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), files.join("dangling.txt")).unwrap();

        let store = Arc::new(MemoryObjectStore::new("media"));
        let report = Migrator::new(store.clone(), config_for(vec![ContentCategory::new("files", &files)]))
            .run()
            .await;

        assert_eq!(report.uploaded, vec!["ok.txt"]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("dangling.txt"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_missing_category_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("content/media");
        write(&media, "clip.mp4", "mp4");

        let store = Arc::new(MemoryObjectStore::new("media"));
        let categories = vec![
            ContentCategory::new("images", dir.path().join("content/images")),
            ContentCategory::new("media", &media),
        ];
        let report = Migrator::new(store.clone(), config_for(categories)).run().await;

        assert_eq!(report.attempted, 1);
        assert_eq!(store.keys().await, vec!["clip.mp4"]);
    }
}
