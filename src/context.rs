use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::feed::DocumentStore;
use crate::session::IdentityProvider;

/// Handles shared by the session gate and the feed synchronizer.
///
/// Built once at startup and passed by reference; background tasks clone the
/// `Arc`s they need.
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub auth: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub status_tx: mpsc::UnboundedSender<String>,
}

impl AppContext {
    pub fn new(
        config: Config,
        auth: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        status_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            config,
            auth,
            store,
            status_tx,
        }
    }

    pub fn notice_timeout(&self) -> Duration {
        Duration::from_millis(self.config.notice_timeout_ms)
    }

    /// Queue a line for the status log. Dropped silently once the UI is gone.
    pub fn status(&self, message: impl Into<String>) {
        let _ = self.status_tx.send(message.into());
    }
}
