use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

pub use memory::MemoryStore;
pub use sync::{FeedSynchronizer, SubmitOutcome};

mod memory;
mod sync;

/// Room tag reserved for announcement-style rendering.
pub const ANNOUNCEMENT_ROOM: &str = "0";

/// A persisted chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub author_name: String,
    pub author_photo_url: Option<String>,
    pub text: String,
    pub room_number: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl MessageRecord {
    pub fn layout(&self) -> Layout {
        Layout::for_room(&self.room_number)
    }
}

/// Write payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub author_name: String,
    pub author_photo_url: Option<String>,
    pub text: String,
    pub room_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Standard,
    Announcement,
}

impl Layout {
    pub fn for_room(room_number: &str) -> Self {
        if room_number == ANNOUNCEMENT_ROOM {
            Layout::Announcement
        } else {
            Layout::Standard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub record: MessageRecord,
}

impl Change {
    pub fn added(record: MessageRecord) -> Self {
        Self {
            kind: ChangeKind::Added,
            record,
        }
    }
}

pub type ChangeBatch = Vec<Change>;

/// Sort key of the feed: `created_at`, ties broken by id.
pub fn sort_records(records: &mut [MessageRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// The hosted `messages` collection, ordered by `created_at`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One-shot read of every record, ascending.
    async fn fetch_ordered(&self) -> Result<Vec<MessageRecord>>;

    /// Standing subscription delivering change batches for records added after it starts.
    async fn subscribe(&self) -> Result<LiveFeed>;

    /// Create a record and return its store-assigned id.
    async fn add(&self, message: NewMessage) -> Result<String>;
}

/// Receiving end of a live subscription.
///
/// Yields change batches until the store side goes away. Dropping the feed
/// cancels the subscription at the store.
pub struct LiveFeed {
    rx: mpsc::UnboundedReceiver<ChangeBatch>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl LiveFeed {
    pub fn new(rx: mpsc::UnboundedReceiver<ChangeBatch>) -> Self {
        Self { rx, on_cancel: None }
    }

    pub fn with_cancel(mut self, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }

    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        self.rx.recv().await
    }

    pub fn try_next_batch(&mut self) -> Option<ChangeBatch> {
        self.rx.try_recv().ok()
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if let Some(cancel) = self.on_cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for LiveFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeed")
            .field("cancellable", &self.on_cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn only_room_zero_is_announcement() {
        assert_eq!(Layout::for_room("0"), Layout::Announcement);
        for room in ["", "1", "2", "00", " 0", "0 ", "announce", "-0"] {
            assert_eq!(Layout::for_room(room), Layout::Standard, "room {:?}", room);
        }
    }

    #[test]
    fn sort_breaks_timestamp_ties_by_id() {
        let at = chrono::Utc::now();
        let rec = |id: &str, offset: i64| MessageRecord {
            id: id.to_string(),
            author_name: "a".to_string(),
            author_photo_url: None,
            text: id.to_string(),
            room_number: "1".to_string(),
            created_at: at + chrono::Duration::seconds(offset),
        };
        let mut records = vec![rec("c", 1), rec("b", 0), rec("a", 0)];
        sort_records(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn dropping_live_feed_runs_cancel() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (_tx, rx) = mpsc::unbounded_channel();
        let flag = cancelled.clone();
        let feed = LiveFeed::new(rx).with_cancel(move || flag.store(true, Ordering::SeqCst));
        assert!(!cancelled.load(Ordering::SeqCst));
        drop(feed);
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
