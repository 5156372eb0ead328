use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use super::{sort_records, Change, ChangeBatch, DocumentStore, LiveFeed, MessageRecord, NewMessage};
use crate::error::{ChatError, Result};

#[derive(Default)]
struct Inner {
    records: Vec<MessageRecord>,
    subscribers: Vec<mpsc::UnboundedSender<ChangeBatch>>,
    writes: usize,
    reject_writes: bool,
    reject_reads: bool,
    reject_subscribe: bool,
}

/// In-process `messages` collection for `--local` runs and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed existing history, as if written before this client started.
    pub fn with_records(records: Vec<MessageRecord>) -> Self {
        let store = Self::new();
        store.lock().records = records;
        store
    }

    /// Number of create calls that reached the store, failed or not.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Make subsequent creates fail.
    pub fn reject_writes(&self, reject: bool) {
        self.lock().reject_writes = reject;
    }

    /// Make subsequent history reads fail.
    pub fn reject_reads(&self, reject: bool) {
        self.lock().reject_reads = reject;
    }

    /// Make subsequent live subscriptions fail.
    pub fn reject_subscribe(&self, reject: bool) {
        self.lock().reject_subscribe = reject;
    }

    pub fn records(&self) -> Vec<MessageRecord> {
        self.lock().records.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a poisoned lock only means a test panicked mid-write
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_ordered(&self) -> Result<Vec<MessageRecord>> {
        if self.lock().reject_reads {
            return Err(ChatError::Store("read rejected".to_string()));
        }
        let mut records = self.records();
        sort_records(&mut records);
        Ok(records)
    }

    async fn subscribe(&self) -> Result<LiveFeed> {
        let mut inner = self.lock();
        if inner.reject_subscribe {
            return Err(ChatError::Store("subscription rejected".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.push(tx);
        Ok(LiveFeed::new(rx))
    }

    async fn add(&self, message: NewMessage) -> Result<String> {
        let mut inner = self.lock();
        inner.writes += 1;
        if inner.reject_writes {
            return Err(ChatError::Store("write rejected".to_string()));
        }

        // server clock never runs backwards for this collection
        let now = chrono::Utc::now();
        let created_at = inner
            .records
            .iter()
            .map(|r| r.created_at)
            .max()
            .map_or(now, |last| last.max(now));

        let record = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            author_name: message.author_name,
            author_photo_url: message.author_photo_url,
            text: message.text,
            room_number: message.room_number,
            created_at,
        };
        let id = record.id.clone();
        inner.records.push(record.clone());
        inner
            .subscribers
            .retain(|tx| tx.send(vec![Change::added(record.clone())]).is_ok());
        debug!(id = %id, subscribers = inner.subscribers.len(), "record added");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChangeKind;

    fn draft(text: &str, room: &str) -> NewMessage {
        NewMessage {
            author_name: "ada".to_string(),
            author_photo_url: None,
            text: text.to_string(),
            room_number: room.to_string(),
        }
    }

    #[tokio::test]
    async fn add_assigns_unique_ids_and_ordered_timestamps() {
        let store = MemoryStore::new();
        let first = store.add(draft("one", "1")).await.unwrap();
        let second = store.add(draft("two", "1")).await.unwrap();
        assert_ne!(first, second);

        let records = store.fetch_ordered().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].created_at <= records[1].created_at);
        assert_eq!(records[0].text, "one");
    }

    #[tokio::test]
    async fn subscribers_only_see_later_additions() {
        let store = MemoryStore::new();
        store.add(draft("before", "1")).await.unwrap();

        let mut live = store.subscribe().await.unwrap();
        assert!(live.try_next_batch().is_none());

        store.add(draft("after", "2")).await.unwrap();
        let batch = live.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, ChangeKind::Added);
        assert_eq!(batch[0].record.text, "after");
        assert_eq!(batch[0].record.room_number, "2");
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let store = MemoryStore::new();
        let live = store.subscribe().await.unwrap();
        drop(live);
        store.add(draft("x", "1")).await.unwrap();
        assert!(store.lock().subscribers.is_empty());
    }

    #[tokio::test]
    async fn rejected_writes_count_but_do_not_persist() {
        let store = MemoryStore::new();
        store.reject_writes(true);
        assert!(store.add(draft("lost", "1")).await.is_err());
        assert_eq!(store.write_count(), 1);
        assert!(store.records().is_empty());
    }
}
