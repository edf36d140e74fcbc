// src/storage/event_queue.rs
//! Durable append-only queues of activity pending upload.
//!
//! Each queue serializes all of its operations behind one async lock held
//! across the persistence write, so a scan appending an item and a sync
//! acknowledging a batch can never interleave and lose or duplicate an entry.
//!
//! Uploads use peek → upload → [`EventQueue::acknowledge`]. Items are only
//! removed once the authority has confirmed them; anything appended while the
//! upload was in flight sits behind the acknowledged prefix and is kept.

use crate::errors::StoreError;
use crate::models::{PendingCredential, ScanEvent};
use crate::storage::key_value::{retrieve_json, store_json, KeyValueStore};
use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Store key of the scan event queue
pub const SCAN_QUEUE_KEY: &str = "scan_queue";
/// Store key of the pending credential queue
pub const CREDENTIAL_QUEUE_KEY: &str = "credential_queue";

/// Queue of scan events
pub type ScanQueue = EventQueue<ScanEvent>;
/// Queue of raw credentials seen at this device
pub type CredentialQueue = EventQueue<PendingCredential>;

/// A named, persisted FIFO of immutable items.
pub struct EventQueue<T> {
    key: &'static str,
    store: Arc<dyn KeyValueStore>,
    items: Mutex<Vec<T>>,
}

impl<T> EventQueue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Creates an empty queue persisted under `key`.
    pub fn new(key: &'static str, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            key,
            store,
            items: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the in-memory contents with the persisted queue.
    ///
    /// # Returns
    /// Number of items loaded
    pub async fn load(&self) -> Result<usize, StoreError> {
        let mut items = self.items.lock().await;
        let loaded: Vec<T> = retrieve_json(self.store.as_ref(), self.key)
            .await?
            .unwrap_or_default();
        *items = loaded;
        debug!("Loaded {} pending items from {}", items.len(), self.key);
        Ok(items.len())
    }

    /// Appends `item` and persists the queue.
    ///
    /// On a persistence failure the item is not kept in memory either.
    ///
    /// # Returns
    /// Queue length after the append
    pub async fn enqueue(&self, item: T) -> Result<usize, StoreError> {
        let mut items = self.items.lock().await;
        items.push(item);
        if let Err(e) = store_json(self.store.as_ref(), self.key, &*items).await {
            items.pop();
            warn!("Failed to persist {}: {}", self.key, e);
            return Err(e);
        }
        Ok(items.len())
    }

    /// Current contents, oldest first, without mutation.
    pub async fn peek_all(&self) -> Vec<T> {
        self.items.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns the current contents and empties the queue.
    ///
    /// This is not confirmed delivery: only call it once the contents are
    /// safe elsewhere. Sync uploads use [`EventQueue::acknowledge`] instead.
    pub async fn drain(&self) -> Result<Vec<T>, StoreError> {
        let mut items = self.items.lock().await;
        store_json(self.store.as_ref(), self.key, &Vec::<T>::new()).await?;
        Ok(std::mem::take(&mut *items))
    }

    /// Removes the `count` oldest items after the authority confirmed them.
    ///
    /// # Returns
    /// Number of items actually removed (at most the queue length)
    pub async fn acknowledge(&self, count: usize) -> Result<usize, StoreError> {
        let mut items = self.items.lock().await;
        let count = count.min(items.len());
        if count == 0 {
            return Ok(0);
        }
        store_json(self.store.as_ref(), self.key, &items[count..]).await?;
        items.drain(..count);
        debug!("Acknowledged {} items from {}", count, self.key);
        Ok(count)
    }

    /// Empties the queue without returning its contents.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut items = self.items.lock().await;
        self.store.clear(self.key).await?;
        items.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::key_value::MemoryStore;
    use crate::utils::time::from_unix;

    fn scan(jti: &str) -> ScanEvent {
        ScanEvent::new(jti, true, from_unix(1500))
    }

    #[tokio::test]
    async fn test_enqueue_and_peek_keep_order() {
        let queue = ScanQueue::new(SCAN_QUEUE_KEY, Arc::new(MemoryStore::new()));
        queue.enqueue(scan("c1")).await.unwrap();
        let len = queue.enqueue(scan("c2")).await.unwrap();
        assert_eq!(len, 2);

        let items = queue.peek_all().await;
        assert_eq!(items[0].jti, "c1");
        assert_eq!(items[1].jti, "c2");
        // Peeking does not consume
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn test_drain_empties_queue_and_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let queue = ScanQueue::new(SCAN_QUEUE_KEY, store.clone());
        queue.enqueue(scan("c1")).await.unwrap();

        let drained = queue.drain().await.unwrap();
        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty().await);

        let reopened = ScanQueue::new(SCAN_QUEUE_KEY, store);
        assert_eq!(reopened.load().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_acknowledge_keeps_items_added_after_peek() {
        let queue = CredentialQueue::new(CREDENTIAL_QUEUE_KEY, Arc::new(MemoryStore::new()));
        queue
            .enqueue(PendingCredential::new("a.b.c", from_unix(1)))
            .await
            .unwrap();
        queue
            .enqueue(PendingCredential::new("d.e.f", from_unix(2)))
            .await
            .unwrap();

        let batch = queue.peek_all().await;
        // Arrives while the batch is uploading
        queue
            .enqueue(PendingCredential::new("g.h.i", from_unix(3)))
            .await
            .unwrap();

        assert_eq!(queue.acknowledge(batch.len()).await.unwrap(), 2);
        let left = queue.peek_all().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].raw_token, "g.h.i");
    }

    #[tokio::test]
    async fn test_failed_persist_does_not_enqueue() {
        let store = Arc::new(MemoryStore::new());
        let queue = ScanQueue::new(SCAN_QUEUE_KEY, store.clone());
        queue.enqueue(scan("c1")).await.unwrap();

        store.set_read_only(true);
        assert!(queue.enqueue(scan("c2")).await.is_err());
        assert!(queue.acknowledge(1).await.is_err());
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_queue_survives_restart() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let queue = ScanQueue::new(SCAN_QUEUE_KEY, store.clone());
        queue.enqueue(scan("c1")).await.unwrap();
        queue.enqueue(scan("c2")).await.unwrap();

        let reopened = ScanQueue::new(SCAN_QUEUE_KEY, store);
        assert_eq!(reopened.load().await.unwrap(), 2);
        assert_eq!(reopened.peek_all().await[1].jti, "c2");
    }
}
