// Driver package / 驱动包
pub mod gcs;
pub mod memory;

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::storage::{ObjectStoreClient, StorageError};

/// Build the object store client for a storage config / 根据配置创建对象存储客户端
pub fn build_client(config: &StorageConfig) -> Result<Arc<dyn ObjectStoreClient>, StorageError> {
    let client = gcs::GcsClient::new(config)?;
    Ok(Arc::new(client))
}
