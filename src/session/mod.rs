use async_trait::async_trait;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::error::Result;
use crate::feed::FeedSynchronizer;
use crate::view::{ChatView, Surface};

pub use local::LocalIdentityProvider;

mod local;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// What the login surface asks the provider to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInRequest {
    /// Sign in with an existing `nsec` secret key.
    Secret(String),
    /// Create a fresh identity, optionally with a chosen display name.
    NewIdentity { display_name: Option<String> },
}

impl SignInRequest {
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("nsec1") {
            SignInRequest::Secret(input.to_string())
        } else if input.is_empty() {
            SignInRequest::NewIdentity { display_name: None }
        } else {
            SignInRequest::NewIdentity {
                display_name: Some(input.to_string()),
            }
        }
    }
}

/// External identity provider.
///
/// Outcomes of `sign_in`/`sign_out` are observed through `auth_state`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Standing listener on the signed-in user.
    fn auth_state(&self) -> watch::Receiver<Option<User>>;

    fn current_user(&self) -> Option<User>;

    async fn sign_in(&self, request: SignInRequest) -> Result<User>;

    async fn sign_out(&self) -> Result<()>;
}

/// Bridges the provider's auth state to what the UI shows and where it is.
#[derive(Debug, Default)]
pub struct SessionGate {
    auth_rx: Option<watch::Receiver<Option<User>>>,
    deliver_current: bool,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the auth-state listener. The next `poll` reports the current state.
    pub fn initialize(&mut self, ctx: &AppContext) {
        if self.auth_rx.is_some() {
            warn!("session gate already initialized");
            return;
        }
        self.auth_rx = Some(ctx.auth.auth_state());
        self.deliver_current = true;
    }

    /// Next auth transition, if one is pending.
    pub fn poll(&mut self) -> Option<Option<User>> {
        let rx = self.auth_rx.as_mut()?;
        if self.deliver_current {
            self.deliver_current = false;
            return Some(rx.borrow_and_update().clone());
        }
        match rx.has_changed() {
            Ok(true) => Some(rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    pub fn on_auth_changed(
        &self,
        ctx: &AppContext,
        user: Option<User>,
        view: &mut ChatView,
        feed: &mut FeedSynchronizer,
    ) {
        match user {
            Some(user) => {
                info!(uid = %user.uid, name = %user.display_name, "signed in");
                // login surface hands back to the chat surface on success
                view.navigate(Surface::Chat);

                view.profile.name = user.display_name;
                view.profile.photo_url = user.photo_url;
                view.profile.visible = true;
                view.sign_out_visible = true;
                view.sign_in_visible = false;

                feed.activate(ctx);
            }
            None => {
                info!("signed out");
                view.profile.visible = false;
                view.sign_out_visible = false;
                view.sign_in_visible = true;

                if view.surface == Surface::Chat {
                    feed.deactivate(view);
                    view.navigate(Surface::Login);
                }
            }
        }
    }

    pub fn sign_in(&self, ctx: &AppContext, request: SignInRequest) {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = ctx.auth.sign_in(request).await {
                error!("sign-in failed: {}", e);
                ctx.status(format!("Sign-in failed: {}", e));
            }
        });
    }

    pub fn sign_out(&self, ctx: &AppContext) {
        let auth = ctx.auth.clone();
        tokio::spawn(async move {
            if let Err(e) = auth.sign_out().await {
                error!("sign-out failed: {}", e);
            }
        });
    }
}

/// Random nickname in the bitchat style: {adjective}{noun}{number}
pub fn generate_nickname() -> String {
    let adjectives = [
        "shadow", "cyber", "quantum", "neon", "digital", "ghost", "phantom", "void",
        "dark", "bright", "swift", "silent", "electric", "cosmic", "neural", "viral",
        "stealth", "rapid", "mystic", "plasma", "atomic", "crystal", "sonic", "lunar",
    ];

    let nouns = [
        "strand", "thread", "stream", "signal", "pulse", "wave", "current", "ripple",
        "node", "link", "relay", "echo", "channel", "drift", "flow", "tide",
    ];

    let mut rng = thread_rng();
    let adjective = adjectives[rng.gen_range(0..adjectives.len())];
    let noun = nouns[rng.gen_range(0..nouns.len())];
    let number: u16 = rng.gen_range(100..9999);

    format!("{}{}{}", adjective, noun, number)
}
