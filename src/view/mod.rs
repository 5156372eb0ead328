use std::time::{Duration, Instant};

pub use compose::{Compose, ComposeField, TextInput};
pub use feed::{FeedNode, FeedView};
pub use rooms::RoomDirectory;

mod compose;
mod feed;
mod rooms;

const MAX_STATUS_MESSAGES: usize = 1000;

/// Which screen is showing. `Chat` is the main surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Chat,
    Login,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileBar {
    pub name: String,
    pub photo_url: Option<String>,
    pub visible: bool,
}

/// A short-lived message shown above the input.
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub expires_at: Instant,
}

/// Everything the UI draws. Owned by the app and mutated only on the UI loop.
#[derive(Debug)]
pub struct ChatView {
    pub surface: Surface,
    pub profile: ProfileBar,
    pub sign_in_visible: bool,
    pub sign_out_visible: bool,
    pub feed: FeedView,
    pub rooms: RoomDirectory,
    pub room_filter: Option<String>,
    pub compose: Compose,
    pub login_input: TextInput,
    pub notice: Option<Notice>,
    pub status_messages: Vec<String>,
}

impl ChatView {
    pub fn new(default_room: &str) -> Self {
        Self {
            surface: Surface::Chat,
            profile: ProfileBar::default(),
            sign_in_visible: true,
            sign_out_visible: false,
            feed: FeedView::new(),
            rooms: RoomDirectory::default(),
            room_filter: None,
            compose: Compose::new(default_room),
            login_input: TextInput::default(),
            notice: None,
            status_messages: Vec::new(),
        }
    }

    pub fn navigate(&mut self, surface: Surface) {
        if self.surface != surface {
            tracing::debug!(from = ?self.surface, to = ?surface, "navigate");
            self.surface = surface;
        }
    }

    pub fn show_notice(&mut self, text: &str, timeout: Duration) {
        self.notice = Some(Notice {
            text: text.to_string(),
            expires_at: Instant::now() + timeout,
        });
    }

    pub fn active_notice(&self) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| n.expires_at > Instant::now())
    }

    pub fn expire_notice(&mut self, now: Instant) {
        if self.notice.as_ref().map_or(false, |n| n.expires_at <= now) {
            self.notice = None;
        }
    }

    pub fn add_status_message(&mut self, message: String) {
        self.status_messages.push(format!(
            "[{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            message
        ));

        if self.status_messages.len() > MAX_STATUS_MESSAGES {
            self.status_messages.remove(0);
        }
    }

    /// Drop everything rendered from the store, as a reload of the page would.
    pub fn reset_feed(&mut self) {
        self.feed.clear();
        self.rooms.clear();
    }
}
