//! Nostr relays as the hosted backend.
//!
//! The `messages` collection is every regular event of [`CHAT_KIND`] tagged
//! `["t", "flowstrands"]`. Record fields live in the event:
//!
//! | record             | event                |
//! |--------------------|----------------------|
//! | `id`               | event id (hex)       |
//! | `created_at`       | `created_at`         |
//! | `text`             | content              |
//! | `author_name`      | `n` tag              |
//! | `author_photo_url` | `picture` tag        |
//! | `room_number`      | `room` tag           |

use nostr_sdk::prelude::*;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{ChatError, Result};
use crate::feed::{MessageRecord, NewMessage};

pub use auth::NostrAuth;
pub use identity::Identity;
pub use store::NostrStore;

mod auth;
mod identity;
mod store;

pub const CHAT_KIND: u16 = 4242;
pub const APP_TAG: &str = "flowstrands";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The signed-in key pair, shared by the identity provider (which sets it)
/// and the store (which signs with it).
pub type SharedIdentity = Arc<RwLock<Option<Identity>>>;

pub fn chat_kind() -> Kind {
    Kind::Regular(CHAT_KIND)
}

/// Filter matching the whole `messages` collection.
pub fn messages_filter() -> Filter {
    Filter::new()
        .kind(chat_kind())
        .custom_tag(SingleLetterTag::lowercase(Alphabet::T), vec![APP_TAG.to_string()])
}

/// Add the configured relays and connect, giving up on slow relays after a timeout.
pub async fn connect_relays(
    relays: &[String],
    status_tx: &mpsc::UnboundedSender<String>,
) -> Result<Client> {
    let client = Client::default();

    let mut added = 0;
    for url in relays {
        match client.add_relay(url.as_str()).await {
            Ok(_) => added += 1,
            Err(e) => {
                warn!(relay = %url, "failed to add relay: {}", e);
                let _ = status_tx.send(format!("Failed to add relay {}: {}", url, e));
            }
        }
    }
    if added == 0 {
        return Err(ChatError::Relay("no usable relays configured".to_string()));
    }

    let _ = status_tx.send("Connecting to Nostr relays...".to_string());
    match timeout(CONNECT_TIMEOUT, client.connect()).await {
        Ok(_) => {
            info!(relays = added, "connected");
            let _ = status_tx.send(format!("Connected to {} relays", added));
        }
        Err(_) => {
            warn!("relay connect timed out");
            let _ = status_tx.send("Connection timeout - using available relays".to_string());
        }
    }

    Ok(client)
}

fn tag_value(event: &Event, name: &str) -> Option<String> {
    event.tags().iter().find_map(|tag| match tag.as_vec() {
        vec if vec.len() >= 2 && vec[0] == name => Some(vec[1].to_string()),
        _ => None,
    })
}

fn has_app_tag(event: &Event) -> bool {
    event.tags().iter().any(|tag| {
        let vec = tag.as_vec();
        vec.len() >= 2 && vec[0] == "t" && vec[1] == APP_TAG
    })
}

/// Decode a chat event. Anything else yields `None`.
pub fn record_from_event(event: &Event) -> Option<MessageRecord> {
    if event.kind() != chat_kind() || !has_app_tag(event) {
        return None;
    }

    let author_name = tag_value(event, "n")
        .unwrap_or_else(|| format!("anon{}", &event.pubkey.to_hex()[..8]));

    Some(MessageRecord {
        id: event.id.to_hex(),
        author_name,
        author_photo_url: tag_value(event, "picture"),
        text: event.content().to_string(),
        room_number: tag_value(event, "room").unwrap_or_default(),
        created_at: chrono::DateTime::from_timestamp(event.created_at().as_u64() as i64, 0)
            .unwrap_or_else(chrono::Utc::now),
    })
}

fn parse_tag(parts: &[&str]) -> Result<Tag> {
    Tag::parse(parts.to_vec()).map_err(|e| ChatError::Relay(e.to_string()))
}

/// Sign a chat event carrying `message`.
pub fn message_event(identity: &Identity, message: &NewMessage) -> Result<Event> {
    let mut tags = vec![
        parse_tag(&["t", APP_TAG])?,
        parse_tag(&["n", &message.author_name])?,
        parse_tag(&["room", &message.room_number])?,
        parse_tag(&["client", APP_TAG])?,
    ];
    if let Some(url) = &message.author_photo_url {
        tags.push(parse_tag(&["picture", url])?);
    }

    identity.sign_event(EventBuilder::new(chat_kind(), message.text.as_str(), tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(room: &str, photo: Option<&str>) -> NewMessage {
        NewMessage {
            author_name: "ada".to_string(),
            author_photo_url: photo.map(str::to_string),
            text: "hello\nthere".to_string(),
            room_number: room.to_string(),
        }
    }

    #[test]
    fn signed_message_decodes_to_record() {
        let identity = Identity::generate(Some("ada".to_string()));
        let draft = draft("0", Some("https://example.org/a.png"));
        let event = message_event(&identity, &draft).unwrap();

        let record = record_from_event(&event).unwrap();
        assert_eq!(record.id, event.id.to_hex());
        assert_eq!(record.author_name, "ada");
        assert_eq!(record.author_photo_url.as_deref(), Some("https://example.org/a.png"));
        assert_eq!(record.text, "hello\nthere");
        assert_eq!(record.room_number, "0");
    }

    #[test]
    fn missing_photo_stays_absent() {
        let identity = Identity::generate(None);
        let event = message_event(&identity, &draft("3", None)).unwrap();
        let record = record_from_event(&event).unwrap();
        assert!(record.author_photo_url.is_none());
        assert_eq!(record.room_number, "3");
    }

    #[test]
    fn unrelated_events_are_skipped() {
        let identity = Identity::generate(None);

        let note = identity
            .sign_event(EventBuilder::new(Kind::TextNote, "gm", Vec::<Tag>::new()))
            .unwrap();
        assert!(record_from_event(&note).is_none());

        let untagged = identity
            .sign_event(EventBuilder::new(chat_kind(), "hi", Vec::<Tag>::new()))
            .unwrap();
        assert!(record_from_event(&untagged).is_none());
    }

    #[test]
    fn nameless_events_get_anon_author() {
        let identity = Identity::generate(None);
        let event = identity
            .sign_event(EventBuilder::new(
                chat_kind(),
                "hi",
                vec![parse_tag(&["t", APP_TAG]).unwrap()],
            ))
            .unwrap();
        let record = record_from_event(&event).unwrap();
        assert_eq!(record.author_name, format!("anon{}", &identity.pubkey[..8]));
        assert_eq!(record.room_number, "");
    }
}
