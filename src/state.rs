use std::sync::Arc;

use gcs_media_storage::adapter::MediaStorage;

/// Shared host state / 宿主共享状态
pub struct AppState {
    pub storage: Arc<dyn MediaStorage>,
    /// URL prefix the content router is nested under / 内容挂载前缀
    pub mount_path: String,
}
