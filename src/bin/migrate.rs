//! One-shot migration of local content into the bucket / 一次性迁移本地内容到存储桶

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gcs_media_storage::config::{self, MigrationConfig};
use gcs_media_storage::drivers::gcs::GcsClient;
use gcs_media_storage::migrate::Migrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gcs_media_storage=info,migrate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let config_path = config::get_config_path("MIGRATION_CONFIG", "migration.json");
    let migration: MigrationConfig = config::load_or_create(&config_path)?;
    migration.storage.validate()?;

    let client = GcsClient::new(&migration.storage).context("Failed to create storage client")?;
    tracing::info!("Migrating into bucket {} (project {})", migration.storage.bucket_name, client.project_id());

    let report = Migrator::new(Arc::new(client), migration).run().await;

    for failure in &report.failed {
        tracing::warn!("Not migrated: {:?}: {}", failure.path, failure.error);
    }
    if report.is_success() {
        tracing::info!("Migration completed: {}/{} files uploaded", report.uploaded.len(), report.attempted);
    } else {
        tracing::warn!(
            "Migration completed with {} failures: {}/{} files uploaded",
            report.failed.len(),
            report.uploaded.len(),
            report.attempted
        );
    }

    Ok(())
}
