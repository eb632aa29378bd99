use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::document::encode;
use super::{DocPath, Document, Fields, Store, StoreError};

/// Optimistic read-verify-write transaction.
///
/// Reads record the version they saw; writes are buffered. On commit every
/// recorded version must still be current, otherwise the whole transaction
/// fails with [`StoreError::Conflict`] and nothing is written. Reads see the
/// transaction's own buffered writes, and a path read twice returns the
/// snapshot from the first read.
pub struct Transaction<'a> {
    store: &'a Store,
    reads: HashMap<DocPath, Option<Document>>,
    writes: BTreeMap<DocPath, Option<Fields>>,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(store: &'a Store) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, path: &DocPath) -> Option<Document> {
        if let Some(pending) = self.writes.get(path) {
            return pending.clone().map(|fields| Document {
                path: path.clone(),
                version: self.read_version(path),
                fields,
            });
        }
        let store = self.store;
        self.reads
            .entry(path.clone())
            .or_insert_with(|| store.get(path))
            .clone()
    }

    fn read_version(&self, path: &DocPath) -> u64 {
        self.reads
            .get(path)
            .and_then(|seen| seen.as_ref())
            .map_or(0, |d| d.version)
    }

    pub fn require(&mut self, path: &DocPath) -> Result<Document, StoreError> {
        self.get(path).ok_or_else(|| StoreError::NotFound(path.clone()))
    }

    pub fn set(&mut self, path: &DocPath, fields: Fields) {
        self.writes.insert(path.clone(), Some(fields));
    }

    pub fn set_record<T: Serialize>(&mut self, path: &DocPath, record: &T) -> Result<(), StoreError> {
        self.set(path, encode(record)?);
        Ok(())
    }

    /// Fail with `AlreadyExists` instead of overwriting.
    pub fn create(&mut self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        if self.get(path).is_some() {
            return Err(StoreError::AlreadyExists(path.clone()));
        }
        self.set(path, fields);
        Ok(())
    }

    /// Merge `changes` into an existing document.
    pub fn update(&mut self, path: &DocPath, changes: Fields) -> Result<(), StoreError> {
        let mut fields = self.require(path)?.fields;
        fields.extend(changes);
        self.set(path, fields);
        Ok(())
    }

    pub fn delete(&mut self, path: &DocPath) {
        self.writes.insert(path.clone(), None);
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Commit atomically. Returns the commit's sequence number.
    pub async fn commit(self) -> Result<u64, StoreError> {
        let reads = self
            .reads
            .into_iter()
            .map(|(path, seen)| (path, seen.map_or(0, |d| d.version)))
            .collect();
        self.store.commit_writes(reads, self.writes).await
    }
}
