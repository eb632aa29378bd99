//! Embedded document store: path-addressed JSON documents, equality
//! queries, optimistic multi-document transactions and live listeners,
//! made durable by the WAL.

mod document;
mod error;
mod path;
pub mod paths;
mod subscription;
#[cfg(test)]
mod tests;
mod transaction;

pub use document::{encode, fields, Document, Fields, Filter};
pub use error::StoreError;
pub use path::{CollectionPath, DocPath};
pub use subscription::Subscription;
pub use transaction::Transaction;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::{now_ms, Event, WriteOp};
use crate::notify::{Change, NotifyHub};
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = Vec<(Event, oneshot::Sender<io::Result<()>>)>;

/// Owns the WAL. Appends that queue up while a flush is in progress are
/// written together and share one fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };
        let mut batch: Pending = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        flush_batch(&mut wal, batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: Pending) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut result = Ok(());
    for (event, _) in &batch {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    if result.is_ok() {
        result = wal.flush_sync();
    }
    // A failed batch must not leave bytes that later frames would sit behind.
    if result.is_err() {
        if let Err(e) = wal.rollback() {
            tracing::error!("WAL rollback failed: {e}");
        }
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

struct Stored {
    version: u64,
    fields: Fields,
}

pub struct Store {
    docs: DashMap<DocPath, Stored>,
    /// Collection → member documents, for listing without a full scan.
    members: DashMap<CollectionPath, BTreeSet<DocPath>>,
    /// Sequence number of the last applied commit.
    seq: AtomicU64,
    commit_lock: Mutex<()>,
    wal_tx: mpsc::Sender<WalCommand>,
    notify: Arc<NotifyHub>,
}

fn decode_ops(writes: Vec<WriteOp>) -> io::Result<Vec<(DocPath, Option<Fields>)>> {
    let invalid = |e: String| io::Error::new(io::ErrorKind::InvalidData, e);
    writes
        .into_iter()
        .map(|op| match op {
            WriteOp::Put { path, fields } => {
                let path = DocPath::parse(&path).map_err(|e| invalid(e.to_string()))?;
                let fields: Fields =
                    serde_json::from_str(&fields).map_err(|e| invalid(format!("{path}: {e}")))?;
                Ok((path, Some(fields)))
            }
            WriteOp::Delete { path } => {
                let path = DocPath::parse(&path).map_err(|e| invalid(e.to_string()))?;
                Ok((path, None))
            }
        })
        .collect()
}

impl Store {
    /// Open the store, replaying `wal_path`, and start the WAL writer task.
    /// Must be called inside a tokio runtime.
    pub fn open(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            docs: DashMap::new(),
            members: DashMap::new(),
            seq: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            wal_tx,
            notify,
        };

        let mut seq = 0;
        for Event::Committed { writes, .. } in events {
            seq += 1;
            store.apply(seq, decode_ops(writes)?);
        }
        store.seq.store(seq, Ordering::Release);
        debug!("store opened at {}: {} documents, seq {seq}", wal_path.display(), store.docs.len());
        Ok(store)
    }

    pub fn notify(&self) -> &Arc<NotifyHub> {
        &self.notify
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    // ── Reads ────────────────────────────────────────────────

    pub fn get(&self, path: &DocPath) -> Option<Document> {
        self.docs.get(path).map(|d| Document {
            path: path.clone(),
            version: d.version,
            fields: d.fields.clone(),
        })
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &DocPath) -> Result<Option<T>, StoreError> {
        self.get(path).map(|d| d.decode()).transpose()
    }

    pub fn exists(&self, path: &DocPath) -> bool {
        self.docs.contains_key(path)
    }

    /// Every document in `collection`, ordered by path.
    pub fn list(&self, collection: &CollectionPath) -> Vec<Document> {
        self.query(collection, &Filter::all())
    }

    pub fn query(&self, collection: &CollectionPath, filter: &Filter) -> Vec<Document> {
        let paths: Vec<DocPath> = match self.members.get(collection) {
            Some(set) => set.iter().cloned().collect(),
            None => return Vec::new(),
        };
        self.collect_matching(paths, filter)
    }

    /// Query every collection whose last segment is `collection_id`.
    pub fn collection_group(&self, collection_id: &str, filter: &Filter) -> Vec<Document> {
        let mut paths: Vec<DocPath> = self
            .members
            .iter()
            .filter(|e| e.key().id() == collection_id)
            .flat_map(|e| e.value().iter().cloned().collect::<Vec<_>>())
            .collect();
        paths.sort();
        self.collect_matching(paths, filter)
    }

    fn collect_matching(&self, paths: Vec<DocPath>, filter: &Filter) -> Vec<Document> {
        paths
            .into_iter()
            .filter_map(|path| self.get(&path))
            .filter(|doc| filter.matches(&doc.fields))
            .collect()
    }

    // ── Writes ───────────────────────────────────────────────

    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Run `body` in a transaction, re-running it on conflict up to
    /// `MAX_TXN_ATTEMPTS` times. `body` must be free of side effects other
    /// than its transaction writes.
    pub async fn run_transaction<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut txn = self.begin();
            let out = body(&mut txn)?;
            match txn.commit().await {
                Ok(_) => return Ok(out),
                Err(StoreError::Conflict(path)) if attempt < MAX_TXN_ATTEMPTS => {
                    metrics::counter!(crate::observability::TXN_RETRIES_TOTAL).increment(1);
                    debug!("transaction attempt {attempt} conflicted on {path}, retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn set(&self, path: &DocPath, fields: Fields) -> Result<u64, StoreError> {
        let mut txn = self.begin();
        txn.set(path, fields);
        txn.commit().await
    }

    pub async fn set_record<T: Serialize>(&self, path: &DocPath, record: &T) -> Result<u64, StoreError> {
        self.set(path, encode(record)?).await
    }

    /// Merge fields into an existing document; `NotFound` if it is absent.
    pub async fn update(&self, path: &DocPath, changes: Fields) -> Result<(), StoreError> {
        self.run_transaction(|txn| txn.update(path, changes.clone()))
            .await
    }

    /// Delete a document. Deleting a missing document is not an error.
    pub async fn delete(&self, path: &DocPath) -> Result<u64, StoreError> {
        let mut txn = self.begin();
        txn.delete(path);
        txn.commit().await
    }

    pub(super) async fn commit_writes(
        &self,
        reads: HashMap<DocPath, u64>,
        writes: BTreeMap<DocPath, Option<Fields>>,
    ) -> Result<u64, StoreError> {
        if writes.is_empty() {
            return Ok(self.last_seq());
        }
        if writes.len() > MAX_WRITES_PER_COMMIT {
            return Err(StoreError::LimitExceeded("too many writes in one commit"));
        }
        let mut ops = Vec::with_capacity(writes.len());
        for (path, fields) in &writes {
            ops.push(match fields {
                Some(fields) => {
                    let json = serde_json::to_string(fields)?;
                    if json.len() > MAX_DOCUMENT_BYTES {
                        return Err(StoreError::LimitExceeded("document too large"));
                    }
                    WriteOp::Put {
                        path: path.to_string(),
                        fields: json,
                    }
                }
                None => WriteOp::Delete {
                    path: path.to_string(),
                },
            });
        }

        let _guard = self.commit_lock.lock().await;
        for (path, seen) in &reads {
            let current = self.docs.get(path).map_or(0, |d| d.version);
            if current != *seen {
                metrics::counter!(crate::observability::TXN_CONFLICTS_TOTAL).increment(1);
                return Err(StoreError::Conflict(path.clone()));
            }
        }

        let event = Event::Committed {
            txn_id: Ulid::new(),
            at: now_ms(),
            writes: ops,
        };
        self.wal_append(event).await?;

        let seq = self.last_seq() + 1;
        let mut touched: BTreeMap<CollectionPath, Vec<DocPath>> = BTreeMap::new();
        for path in writes.keys() {
            touched.entry(path.parent()).or_default().push(path.clone());
        }
        self.apply(seq, writes.into_iter().collect());
        self.seq.store(seq, Ordering::Release);

        for (collection, docs) in touched {
            self.notify.send(&collection, Change { seq, docs });
        }
        Ok(seq)
    }

    /// Apply decoded writes. Caller holds the commit lock, or is replaying.
    fn apply(&self, seq: u64, writes: Vec<(DocPath, Option<Fields>)>) {
        for (path, fields) in writes {
            let parent = path.parent();
            match fields {
                Some(fields) => {
                    self.members.entry(parent).or_default().insert(path.clone());
                    self.docs.insert(path, Stored { version: seq, fields });
                }
                None => {
                    self.docs.remove(&path);
                    if let Some(mut set) = self.members.get_mut(&parent) {
                        set.remove(&path);
                    }
                    self.members.remove_if(&parent, |_, set| set.is_empty());
                }
            }
        }
    }

    // ── Subscriptions ────────────────────────────────────────

    /// Listen to `collection`. The first snapshot arrives immediately.
    pub fn subscribe<T: DeserializeOwned>(
        self: &Arc<Self>,
        collection: CollectionPath,
        filter: Filter,
    ) -> Subscription<T> {
        let changes = self.notify.subscribe(&collection);
        Subscription::spawn(Arc::downgrade(self), changes, collection, filter)
    }

    // ── WAL ──────────────────────────────────────────────────

    async fn wal_append(&self, event: Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { event, response: tx })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    /// Rewrite the WAL as one put per live document.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let _guard = self.commit_lock.lock().await;

        let mut puts = Vec::with_capacity(self.docs.len());
        for entry in self.docs.iter() {
            puts.push(WriteOp::Put {
                path: entry.key().to_string(),
                fields: serde_json::to_string(&entry.value().fields)?,
            });
        }
        puts.sort_by(|a, b| a.path().cmp(b.path()));
        let at = now_ms();
        let events: Vec<Event> = puts
            .chunks(COMPACT_CHUNK)
            .map(|chunk| Event::Committed {
                txn_id: Ulid::new(),
                at,
                writes: chunk.to_vec(),
            })
            .collect();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
