//! Daemon wiring: construct the tiers once, inject them, run the server.

use std::sync::Arc;
use std::time::Duration;

use filedepot_server::{DepotServer, ServerConfig};
use filedepot_service::TransferService;
use filedepot_store::{LocalDiskTier, ObjectStoreTier, TieredStore};

use crate::config::Config;

/// Runs the daemon until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // Tiers are constructed once at startup and passed in explicitly;
    // nothing storage-related lives in globals.
    let object_tier = ObjectStoreTier::new(
        &config.object_store.endpoint,
        &config.object_store.bucket,
        config.object_store.token.as_deref(),
    )?;
    let disk_tier = LocalDiskTier::new(expand_path(&config.data_dir)).await?;

    let store = TieredStore::new(Arc::new(object_tier), Arc::new(disk_tier))
        .with_strict_mirror(config.strict_mirror)
        .with_op_timeout(Duration::from_secs(config.tier_op_timeout_secs));

    let service = TransferService::new(Arc::new(store))
        .with_chunk_size(config.chunk_size)
        .with_spool_threshold(config.spool_threshold);

    let server = DepotServer::new(
        ServerConfig {
            port: config.listen_port,
        },
        service,
    );

    // Graceful shutdown on ctrl-c.
    let shutdown_server = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown_server.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}

/// Expands a leading `~` to the user's home directory.
fn expand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_path_home_prefix() {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        assert_eq!(
            expand_path("~/.local/share/filedepot"),
            format!("{home}/.local/share/filedepot")
        );
    }

    #[test]
    fn expand_path_absolute_untouched() {
        assert_eq!(expand_path("/var/lib/filedepot"), "/var/lib/filedepot");
    }
}
