//! Application configuration module / 应用配置模块
//!
//! Host server reads config.json, the migration job reads migration.json.
//! Creates a default config file on first run / 首次运行时创建默认配置文件

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::storage::StorageError;

/// Object storage configuration / 对象存储配置
///
/// Also accepts camelCase keys (`projectId`, `keyFilename`, `bucketName`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// GCP project ID / 项目ID
    #[serde(alias = "projectId")]
    pub project_id: String,
    /// Service account key file; None means anonymous requests / 服务账号密钥文件
    #[serde(alias = "keyFilename", default, skip_serializing_if = "Option::is_none")]
    pub key_filename: Option<PathBuf>,
    /// Bucket name / 存储桶名称
    #[serde(alias = "bucketName")]
    pub bucket_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            project_id: "your-project-id".to_string(),
            key_filename: Some(PathBuf::from("path/to/your/credentials.json")),
            bucket_name: "your-bucket-name".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.bucket_name.trim().is_empty() {
            return Err(StorageError::Config("bucket_name is empty".to_string()));
        }
        if self.bucket_name.contains('/') {
            return Err(StorageError::Config(format!("invalid bucket name: {}", self.bucket_name)));
        }
        Ok(())
    }
}

/// Application configuration (host server) / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Storage configuration / 存储配置
    pub storage: StorageConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
    /// URL prefix the stored content is served under / 内容访问前缀
    pub mount_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2368,
            mount_path: "/content/images".to_string(),
        }
    }
}

impl AppConfig {
    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Local content category (name -> local directory) / 本地内容分类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCategory {
    pub name: String,
    pub path: PathBuf,
}

impl ContentCategory {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self { name: name.to_string(), path: path.into() }
    }
}

/// Migration job configuration / 迁移任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub storage: StorageConfig,
    /// Categories, migrated in order / 按顺序迁移的分类
    pub categories: Vec<ContentCategory>,
    /// Cache-Control for migrated objects / 迁移对象的缓存控制
    #[serde(default = "default_migration_cache_control")]
    pub cache_control: String,
}

fn default_migration_cache_control() -> String {
    "public, max-age=31536000".to_string()
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            categories: vec![
                ContentCategory::new("images", "content/images"),
                ContentCategory::new("media", "content/media"),
                ContentCategory::new("files", "content/files"),
            ],
            cache_control: default_migration_cache_control(),
        }
    }
}

/// Resolve config file path: env override, else file in current dir / 获取配置文件路径
pub fn get_config_path(env_var: &str, file_name: &str) -> PathBuf {
    if let Ok(path) = std::env::var(env_var) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(file_name)
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_or_create<T>(config_path: &Path) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        let config: T = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", config_path))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = T::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config<T: Serialize>(config_path: &Path, config: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config file {:?}", config_path))?;

    Ok(())
}
