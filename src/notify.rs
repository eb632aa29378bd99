use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::store::{CollectionPath, DocPath};

const CHANNEL_CAPACITY: usize = 256;

/// What a commit did to one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub seq: u64,
    pub docs: Vec<DocPath>,
}

/// Broadcast hub for collection listeners.
pub struct NotifyHub {
    channels: DashMap<CollectionPath, broadcast::Sender<Change>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to commits touching `collection`. Creates the channel if needed.
    pub fn subscribe(&self, collection: &CollectionPath) -> broadcast::Receiver<Change> {
        self.channels
            .entry(collection.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Send a change. No-op if nobody is listening; a channel whose last
    /// receiver went away is dropped here.
    pub fn send(&self, collection: &CollectionPath, change: Change) {
        let delivered = match self.channels.get(collection) {
            Some(sender) => sender.send(change).is_ok(),
            None => return,
        };
        if !delivered {
            self.channels
                .remove_if(collection, |_, sender| sender.receiver_count() == 0);
        }
    }

    pub fn listener_count(&self, collection: &CollectionPath) -> usize {
        self.channels
            .get(collection)
            .map_or(0, |sender| sender.receiver_count())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
