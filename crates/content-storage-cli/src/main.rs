mod commands;
mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use content_storage_core::{ObjectStore, Reconciler};
use content_storage_local::LocalStorage;
use content_storage_supabase::SupabaseStorage;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Config, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (stdout carries command output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    info!("Starting content-storage");
    info!("  Backend: {}", config.backend);
    info!("  Bucket: {}", config.bucket);

    let store = create_store(&config)?;
    let reconciler = create_reconciler(&config, store);

    let output = commands::execute(&reconciler, config.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Create the object store selected by the configuration.
fn create_store(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Supabase => {
            let url = config
                .supabase_url
                .clone()
                .context("--supabase-url (SUPABASE_URL) is required for the supabase backend")?;
            let key = config
                .supabase_service_key
                .clone()
                .context("--supabase-service-key (SUPABASE_SERVICE_ROLE_KEY) is required")?;
            Arc::new(SupabaseStorage::new(url, key, config.bucket.clone()))
        }
        StorageBackend::Local => {
            let dir = config.effective_local_storage_dir();
            info!("  Local storage dir: {}", dir.display());
            let storage = LocalStorage::new(dir);
            match &config.public_base_url {
                Some(base_url) => Arc::new(storage.with_base_url(base_url.clone())),
                None => Arc::new(storage),
            }
        }
    };

    Ok(store)
}

fn create_reconciler(config: &Config, store: Arc<dyn ObjectStore>) -> Reconciler {
    let mut reconciler = Reconciler::new(store);
    if let Some(secs) = config.orphan_grace_period_secs {
        info!("  Orphan grace period: {} secs", secs);
        reconciler = reconciler.with_orphan_grace_period(Duration::from_secs(secs));
    }
    reconciler
}
