use std::sync::Arc;

use anyhow::Context;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use gcs_media_storage::adapter::StorageAdapter;
use gcs_media_storage::config::{self, AppConfig};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gcs_media_storage=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("gcs-media-storage v{} (built {})", env!("CARGO_PKG_VERSION"), env!("BUILD_TIME"));

    // Load configuration / 加载配置
    let config_path = config::get_config_path("GCS_STORAGE_CONFIG", "config.json");
    let app_config: AppConfig = config::load_or_create(&config_path)?;
    app_config.storage.validate()?;
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);

    // 创建存储适配器
    let storage = StorageAdapter::from_config(&app_config.storage).context("Failed to create storage adapter")?;
    tracing::info!(
        "Using bucket {}, content served under {}",
        app_config.storage.bucket_name,
        app_config.server.mount_path
    );

    let state = Arc::new(AppState {
        storage: Arc::new(storage),
        mount_path: app_config.server.mount_path.clone(),
    });

    let app = api::routes(state).layer(TraceLayer::new_for_http());

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
