//! Periodic pass over every table's TTL setting, purging expired items
//! (§4.6's TTL contract extended to a background sweep rather than only a
//! lazy delete on `get_item`). Default interval: 5 minutes.

use crate::SweeperHandle;
use sql::SqlHandle;
use std::time::Duration;
use tokio::sync::oneshot;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub fn spawn(handle: SqlHandle, interval: Duration) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    tracing::debug!("ttl sweeper stopping");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(err) = run_once(&handle).await {
                        tracing::warn!(error = ?err, "ttl sweeper pass failed");
                    }
                }
            }
        }
    });

    SweeperHandle::new("ttl", shutdown_tx, join)
}

async fn run_once(handle: &SqlHandle) -> types::Result<()> {
    for table_name in engine::list_tables(handle).await? {
        let purged = engine::sweep_expired_items(handle, &table_name).await?;
        if purged > 0 {
            tracing::info!(table = %table_name, purged, "ttl sweeper purged expired items");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql::Dialect;
    use sqlx::any::AnyPoolOptions;

    async fn test_handle() -> SqlHandle {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().connect("sqlite::memory:").await.unwrap();
        SqlHandle::from_pool(pool, Dialect::Sqlite)
    }

    #[tokio::test]
    async fn spawn_and_stop_is_graceful() {
        let handle = test_handle().await;
        store::metadata_store::ensure_metadata_relation(&handle).await.unwrap();
        let sweeper = spawn(handle, Duration::from_secs(3600));
        sweeper.stop().await;
    }
}
