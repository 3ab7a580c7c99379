//! Change notifications for live subscriptions.
//!
//! Every write to the document store is announced on a broadcast channel
//! keyed by collection. Subscribers re-read whatever they are watching when a
//! notification arrives; the notification itself carries no document body.

use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use quizdeck_core::Collection;

/// Buffered notifications per collection before slow receivers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// A document in `collection` was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    pub id: String,
}

impl Change {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

/// Tracks subscribers for every collection.
pub struct ChangeHub {
    channels: RwLock<HashMap<Collection, broadcast::Sender<Change>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to changes in a collection.
    pub async fn subscribe(&self, collection: Collection) -> broadcast::Receiver<Change> {
        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(&collection) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(collection, sender);
            receiver
        }
    }

    /// Number of live receivers for a collection.
    pub async fn receiver_count(&self, collection: Collection) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(&collection)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Announces a change to every subscriber of its collection.
    pub async fn publish(&self, change: Change) {
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(&change.collection) {
            // Nobody listening is not an error
            let _ = sender.send(change);
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}
