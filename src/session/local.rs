use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use super::{generate_nickname, IdentityProvider, SignInRequest, User};
use crate::error::{ChatError, Result};

/// In-process identity provider used with the in-memory store.
///
/// Accounts are display names only; there are no keys to sign in with.
pub struct LocalIdentityProvider {
    state: watch::Sender<Option<User>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    pub fn signed_in(user: User) -> Self {
        let (state, _) = watch::channel(Some(user));
        Self { state }
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn auth_state(&self) -> watch::Receiver<Option<User>> {
        self.state.subscribe()
    }

    fn current_user(&self) -> Option<User> {
        self.state.borrow().clone()
    }

    async fn sign_in(&self, request: SignInRequest) -> Result<User> {
        let display_name = match request {
            SignInRequest::Secret(_) => {
                return Err(ChatError::SignIn(
                    "secret keys are only accepted by the relay backend".to_string(),
                ))
            }
            SignInRequest::NewIdentity { display_name } => {
                display_name.unwrap_or_else(generate_nickname)
            }
        };

        let user = User {
            uid: uuid::Uuid::new_v4().to_string(),
            display_name,
            photo_url: None,
        };
        debug!(uid = %user.uid, "local sign-in");
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.state.send_replace(None);
        Ok(())
    }
}
