use async_trait::async_trait;
use nostr_sdk::prelude::*;
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{message_event, messages_filter, record_from_event, SharedIdentity};
use crate::error::{ChatError, Result};
use crate::feed::{sort_records, Change, DocumentStore, LiveFeed, MessageRecord, NewMessage};

const HISTORY_TIMEOUT: Duration = Duration::from_secs(10);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// The `messages` collection on the connected relays.
pub struct NostrStore {
    client: Client,
    identity: SharedIdentity,
    history_limit: usize,
}

impl NostrStore {
    pub fn new(client: Client, identity: SharedIdentity, history_limit: usize) -> Self {
        Self {
            client,
            identity,
            history_limit,
        }
    }
}

#[async_trait]
impl DocumentStore for NostrStore {
    async fn fetch_ordered(&self) -> Result<Vec<MessageRecord>> {
        let filter = messages_filter().limit(self.history_limit);
        let events = timeout(
            HISTORY_TIMEOUT,
            self.client.get_events_of(vec![filter], Some(HISTORY_TIMEOUT)),
        )
        .await
        .map_err(|_| ChatError::Timeout("message history"))?
        .map_err(|e| ChatError::Relay(e.to_string()))?;

        let mut records: Vec<MessageRecord> = events.iter().filter_map(record_from_event).collect();
        sort_records(&mut records);
        // the same event can come back from several relays
        records.dedup_by(|a, b| a.id == b.id);
        Ok(records)
    }

    async fn subscribe(&self) -> Result<LiveFeed> {
        // take the receiver first so nothing sent right after subscribing is lost
        let mut notifications = self.client.notifications();
        let filter = messages_filter().since(Timestamp::now());
        let subscription_id = self.client.subscribe(vec![filter], None).await;
        debug!(?subscription_id, "live subscription opened");

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(async move {
            loop {
                match notifications.recv().await {
                    Ok(RelayPoolNotification::Event { event, .. }) => {
                        if let Some(record) = record_from_event(&event) {
                            if tx.send(vec![Change::added(record)]).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "live feed lagging behind relay notifications");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let client = self.client.clone();
        Ok(LiveFeed::new(rx).with_cancel(move || {
            pump.abort();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    client.unsubscribe(subscription_id).await;
                });
            }
        }))
    }

    async fn add(&self, message: NewMessage) -> Result<String> {
        let event = {
            let guard = self
                .identity
                .read()
                .map_err(|_| ChatError::Store("identity lock poisoned".to_string()))?;
            let identity = guard.as_ref().ok_or(ChatError::NotSignedIn)?;
            message_event(identity, &message)?
        };
        let id = event.id.to_hex();

        timeout(PUBLISH_TIMEOUT, self.client.send_event(event))
            .await
            .map_err(|_| ChatError::Timeout("publish"))?
            .map_err(|e| ChatError::Relay(e.to_string()))?;

        debug!(id = %id, room = %message.room_number, "message published");
        Ok(id)
    }
}
