use std::marker::PhantomData;
use std::sync::Weak;

use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::limits::SUBSCRIPTION_BUFFER;
use crate::notify::Change;

use super::{CollectionPath, Document, Filter, Store};

/// Live query over one collection.
///
/// Yields the full matching snapshot once on creation and again after every
/// commit touching the collection. Dropping the handle stops the listener.
pub struct Subscription<T> {
    rx: mpsc::Receiver<Vec<Document>>,
    task: JoinHandle<()>,
    collection: CollectionPath,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Subscription<T> {
    pub(super) fn spawn(
        store: Weak<Store>,
        changes: broadcast::Receiver<Change>,
        collection: CollectionPath,
        filter: Filter,
    ) -> Self {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(pump(store, changes, collection.clone(), filter, tx));
        Self {
            rx,
            task,
            collection,
            _marker: PhantomData,
        }
    }

    /// Next snapshot, or `None` once the store is gone. Documents that no
    /// longer decode as `T` are logged and skipped.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        let docs = self.rx.recv().await?;
        Some(
            docs.iter()
                .filter_map(|doc| match doc.decode() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!("listener on {} skipping document: {e}", self.collection);
                        None
                    }
                })
                .collect(),
        )
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn pump(
    store: Weak<Store>,
    mut changes: broadcast::Receiver<Change>,
    collection: CollectionPath,
    filter: Filter,
    tx: mpsc::Sender<Vec<Document>>,
) {
    loop {
        let Some(live) = store.upgrade() else { break };
        let snapshot = live.query(&collection, &filter);
        drop(live);

        metrics::counter!(crate::observability::LISTENER_DELIVERIES_TOTAL).increment(1);
        if tx.send(snapshot).await.is_err() {
            break;
        }

        match changes.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {
                // Coalesce a burst of commits into one snapshot.
                loop {
                    match changes.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("listener on {collection} stopped");
}
