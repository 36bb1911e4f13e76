//! Periodic retention pass over every streaming-enabled table's change
//! records, deleting anything older than `STREAM_RECORD_MAX_AGE_SECS`
//! (§4.7). Default interval: 60 minutes — streams are read far more slowly
//! than items are written, so this doesn't need the TTL sweeper's cadence.

use crate::SweeperHandle;
use chrono::Utc;
use sql::SqlHandle;
use std::time::Duration;
use store::{metadata_store, relation_names, stream_dao};
use tokio::sync::oneshot;
use types::limits::STREAM_RECORD_MAX_AGE_SECS;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub fn spawn(handle: SqlHandle, interval: Duration) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    tracing::debug!("stream sweeper stopping");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(err) = run_once(&handle).await {
                        tracing::warn!(error = ?err, "stream sweeper pass failed");
                    }
                }
            }
        }
    });

    SweeperHandle::new("stream", shutdown_tx, join)
}

async fn run_once(handle: &SqlHandle) -> types::Result<()> {
    let cutoff = Utc::now().timestamp_millis() - STREAM_RECORD_MAX_AGE_SECS * 1000;
    for table in metadata_store::list_stream_enabled_tables(handle).await? {
        let relation = relation_names::stream_relation(&table.name);
        let deleted = stream_dao::delete_older_than(handle, &relation, cutoff).await?;
        if deleted > 0 {
            tracing::info!(table = %table.name, deleted, "stream sweeper trimmed aged change records");
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
        metadata_store::ensure_metadata_relation(&handle).await.unwrap();
        let sweeper = spawn(handle, Duration::from_secs(3600));
        sweeper.stop().await;
    }
}
