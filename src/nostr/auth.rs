use async_trait::async_trait;
use nostr_sdk::prelude::*;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Identity, SharedIdentity};
use crate::config::{SessionFile, StoredSession};
use crate::error::{ChatError, Result};
use crate::session::{IdentityProvider, SignInRequest, User};

const PROFILE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Default, PartialEq)]
struct Profile {
    name: Option<String>,
    picture: Option<String>,
}

/// Key-pair sign-in, persisted to the session file between runs.
pub struct NostrAuth {
    client: Client,
    identity: SharedIdentity,
    state: watch::Sender<Option<User>>,
    session: SessionFile,
}

impl NostrAuth {
    /// Restores a saved session if there is one.
    pub fn new(client: Client, identity: SharedIdentity, session: SessionFile) -> Self {
        let restored = session.load().and_then(|stored| match Identity::from_nsec(&stored.nsec) {
            Ok(mut identity) => {
                identity.nickname = stored.display_name;
                identity.photo_url = stored.photo_url;
                Some(identity)
            }
            Err(e) => {
                warn!("discarding saved session: {}", e);
                None
            }
        });

        let user = restored.as_ref().map(Identity::user);
        if let Some(user) = &user {
            info!(uid = %user.uid, "restored session");
        }
        if let Ok(mut shared) = identity.write() {
            *shared = restored;
        }

        let (state, _) = watch::channel(user);
        Self {
            client,
            identity,
            state,
            session,
        }
    }

    fn set_identity(&self, identity: Option<Identity>) -> Result<()> {
        let mut shared = self
            .identity
            .write()
            .map_err(|_| ChatError::SignIn("identity lock poisoned".to_string()))?;
        *shared = identity;
        Ok(())
    }

    /// Look up the kind-0 profile for `pubkey`. Slow or missing profiles yield `None`.
    async fn fetch_profile(&self, pubkey: PublicKey) -> Option<Profile> {
        let filter = Filter::new().author(pubkey).kind(Kind::Metadata).limit(1);

        let events = match tokio::time::timeout(
            PROFILE_TIMEOUT,
            self.client.get_events_of(vec![filter], Some(PROFILE_TIMEOUT)),
        )
        .await
        {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                debug!("profile lookup failed: {}", e);
                return None;
            }
            Err(_) => {
                debug!("profile lookup timed out");
                return None;
            }
        };

        events.first().map(|event| parse_profile(event.content()))
    }

    /// Announce a freshly generated identity's name so other clients can show it.
    fn publish_profile(&self, identity: &Identity) {
        let content = serde_json::json!({ "name": identity.nickname }).to_string();
        let builder = EventBuilder::new(Kind::Metadata, content, Vec::<Tag>::new());
        let event = match identity.sign_event(builder) {
            Ok(event) => event,
            Err(e) => {
                warn!("could not sign profile: {}", e);
                return;
            }
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send_event(event).await {
                warn!("could not publish profile: {}", e);
            }
        });
    }

    fn persist(&self, identity: &Identity) {
        let stored = match identity.to_nsec() {
            Ok(nsec) => StoredSession {
                nsec,
                display_name: identity.nickname.clone(),
                photo_url: identity.photo_url.clone(),
            },
            Err(e) => {
                warn!("session not saved: {}", e);
                return;
            }
        };
        if let Err(e) = self.session.save(&stored) {
            warn!("session not saved: {}", e);
        }
    }
}

fn parse_profile(content: &str) -> Profile {
    let metadata: serde_json::Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(_) => return Profile::default(),
    };

    let field = |key: &str| {
        metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Profile {
        name: field("name").or_else(|| field("display_name")),
        picture: field("picture"),
    }
}

#[async_trait]
impl IdentityProvider for NostrAuth {
    fn auth_state(&self) -> watch::Receiver<Option<User>> {
        self.state.subscribe()
    }

    fn current_user(&self) -> Option<User> {
        self.state.borrow().clone()
    }

    async fn sign_in(&self, request: SignInRequest) -> Result<User> {
        let identity = match request {
            SignInRequest::Secret(nsec) => {
                let mut identity = Identity::from_nsec(&nsec)?;
                if let Some(profile) = self.fetch_profile(identity.public_key()).await {
                    if let Some(name) = profile.name {
                        identity.nickname = name;
                    }
                    identity.photo_url = profile.picture;
                }
                identity
            }
            SignInRequest::NewIdentity { display_name } => {
                let identity = Identity::generate(display_name);
                self.publish_profile(&identity);
                identity
            }
        };

        self.persist(&identity);
        let user = identity.user();
        self.set_identity(Some(identity))?;
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_identity(None)?;
        if let Err(e) = self.session.clear() {
            warn!("could not remove saved session: {}", e);
        }
        self.state.send_replace(None);
        Ok(())
    }
}
