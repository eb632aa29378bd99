use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{info, warn};

use crate::store::{Store, StoreError};

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact the WAL if it has grown past `threshold` appends. Returns whether
/// a compaction ran.
pub async fn compact_if_needed(store: &Store, threshold: u64) -> Result<bool, StoreError> {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        return Ok(false);
    }
    store.compact_wal().await?;
    info!(
        "compacted WAL after {appends} appends ({} documents)",
        store.doc_count()
    );
    Ok(true)
}

/// Background task that keeps the WAL short. Stops once the store is dropped.
pub async fn run_compactor(store: Weak<Store>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else { break };
        if let Err(e) = compact_if_needed(&store, threshold).await {
            warn!("WAL compaction failed: {e}");
        }
    }
}

/// Spawn [`run_compactor`] for `store`.
pub fn spawn_compactor(store: &Arc<Store>, threshold: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_compactor(Arc::downgrade(store), threshold))
}
