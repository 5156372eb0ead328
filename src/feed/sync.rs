use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{ChangeBatch, ChangeKind, DocumentStore, LiveFeed, MessageRecord, NewMessage};
use crate::context::AppContext;
use crate::error::Result;
use crate::view::ChatView;

pub const MUST_SIGN_IN: &str = "You must sign-in first";

/// Work handed from the background feed task to the UI loop.
#[derive(Debug)]
enum FeedUpdate {
    Initial(Vec<MessageRecord>),
    Changes(ChangeBatch),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Write issued; its result is only logged.
    Submitted,
    Empty,
    NotSignedIn,
}

/// Mirrors the store's `messages` collection into the feed pane.
///
/// Network work happens on one spawned task per activation; rendering only
/// happens in [`FeedSynchronizer::drain`] on the UI loop.
pub struct FeedSynchronizer {
    rendered: HashSet<String>,
    inbox_tx: mpsc::UnboundedSender<FeedUpdate>,
    inbox_rx: mpsc::UnboundedReceiver<FeedUpdate>,
    task: Option<JoinHandle<()>>,
}

impl FeedSynchronizer {
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            rendered: HashSet::new(),
            inbox_tx,
            inbox_rx,
            task: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    /// Start the live subscription and the initial load. No-op while active.
    ///
    /// The subscription is opened before the bulk read so nothing written in
    /// between is missed; the initial records always reach the inbox first.
    pub fn activate(&mut self, ctx: &AppContext) {
        if self.is_active() {
            debug!("feed already active");
            return;
        }

        let store = ctx.store.clone();
        let tx = self.inbox_tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut live = match subscribe_live(store.as_ref()).await {
                Ok(live) => live,
                Err(e) => {
                    error!("live subscription failed: {}", e);
                    let _ = tx.send(FeedUpdate::Failed(format!("Live feed unavailable: {}", e)));
                    return;
                }
            };

            match fetch_initial(store.as_ref()).await {
                Ok(records) => {
                    info!(count = records.len(), "loaded message history");
                    let _ = tx.send(FeedUpdate::Initial(records));
                }
                Err(e) => {
                    error!("loading messages failed: {}", e);
                    let _ = tx.send(FeedUpdate::Failed(format!("Could not load history: {}", e)));
                }
            }

            while let Some(batch) = live.next_batch().await {
                if tx.send(FeedUpdate::Changes(batch)).is_err() {
                    break;
                }
            }
            debug!("live feed closed");
        }));
    }

    /// Cancel the live subscription and forget everything rendered.
    pub fn deactivate(&mut self, view: &mut ChatView) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        // updates still queued belong to the cancelled subscription
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        self.inbox_tx = inbox_tx;
        self.inbox_rx = inbox_rx;
        self.rendered.clear();
        view.reset_feed();
    }

    /// Apply everything queued by the background task. Returns the number of
    /// records newly rendered.
    pub fn drain(&mut self, view: &mut ChatView) -> usize {
        let mut rendered = 0;
        while let Ok(update) = self.inbox_rx.try_recv() {
            rendered += match update {
                FeedUpdate::Initial(records) => self.load_initial(view, records),
                FeedUpdate::Changes(batch) => self.apply_changes(view, batch),
                FeedUpdate::Failed(message) => {
                    view.add_status_message(message);
                    0
                }
            };
        }
        rendered
    }

    /// Render the bulk-read history in order, skipping ids already shown.
    pub fn load_initial(&mut self, view: &mut ChatView, records: Vec<MessageRecord>) -> usize {
        records
            .iter()
            .filter(|record| self.deliver(view, record))
            .count()
    }

    /// Render each `added` change not already shown. Other kinds are ignored.
    pub fn apply_changes(&mut self, view: &mut ChatView, batch: ChangeBatch) -> usize {
        let mut rendered = 0;
        for change in batch {
            match change.kind {
                ChangeKind::Added => {
                    if self.deliver(view, &change.record) {
                        rendered += 1;
                    }
                }
                kind => debug!(id = %change.record.id, ?kind, "ignoring change"),
            }
        }
        rendered
    }

    fn deliver(&mut self, view: &mut ChatView, record: &MessageRecord) -> bool {
        if self.rendered.contains(&record.id) {
            return false;
        }
        self.render(view, record);
        true
    }

    /// Upsert the node for `record.id` and show it. Safe to call repeatedly.
    pub fn render(&mut self, view: &mut ChatView, record: &MessageRecord) {
        let node = view.feed.upsert(&record.id);
        node.layout = record.layout();
        node.room_number = record.room_number.clone();
        node.created_at = Some(record.created_at);
        node.name = record.author_name.clone();
        if let Some(url) = &record.author_photo_url {
            node.photo_url = Some(url.clone());
        }
        if !record.text.is_empty() {
            node.set_text(&record.text);
        }
        node.reveal();
        view.feed.scroll_to_end();

        if self.rendered.insert(record.id.clone()) {
            view.rooms.record(record);
        }
    }

    /// Send the composed message on behalf of the signed-in user.
    ///
    /// The write is fire-and-forget: a failure is logged and nothing else.
    /// The message input is cleared once the write is issued.
    pub fn submit(&self, ctx: &AppContext, view: &mut ChatView) -> SubmitOutcome {
        let text = view.compose.message.value().to_string();
        if text.is_empty() {
            return SubmitOutcome::Empty;
        }

        let Some(user) = ctx.auth.current_user() else {
            view.show_notice(MUST_SIGN_IN, ctx.notice_timeout());
            return SubmitOutcome::NotSignedIn;
        };

        let message = NewMessage {
            author_name: user.display_name,
            author_photo_url: Some(
                user.photo_url
                    .unwrap_or_else(|| ctx.config.placeholder_photo.clone()),
            ),
            text,
            room_number: view.compose.room.value().to_string(),
        };

        let store = ctx.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.add(message).await {
                error!("Error adding document: {}", e);
            }
        });

        view.compose.reset_message();
        SubmitOutcome::Submitted
    }
}

impl Default for FeedSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

async fn subscribe_live(store: &dyn DocumentStore) -> Result<LiveFeed> {
    store.subscribe().await
}

async fn fetch_initial(store: &dyn DocumentStore) -> Result<Vec<MessageRecord>> {
    store.fetch_ordered().await
}
