use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use std::time::Instant;
use tokio::sync::mpsc;

use crate::context::AppContext;
use crate::feed::FeedSynchronizer;
use crate::session::{SessionGate, SignInRequest};
use crate::view::{ChatView, ComposeField, Surface};

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub view: ChatView,
    /// Shown in the title bar: relay count or "local".
    pub backend_label: String,

    ctx: AppContext,
    gate: SessionGate,
    feed: FeedSynchronizer,
    status_rx: mpsc::UnboundedReceiver<String>,
}

impl App {
    pub fn new(
        ctx: AppContext,
        status_rx: mpsc::UnboundedReceiver<String>,
        backend_label: String,
    ) -> Self {
        let mut view = ChatView::new(&ctx.config.default_room);
        view.add_status_message(format!("FlowStrands v{}", env!("CARGO_PKG_VERSION")));

        // the gate goes first; nothing else starts until it reports a user
        let mut gate = SessionGate::new();
        gate.initialize(&ctx);

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            view,
            backend_label,
            ctx,
            gate,
            feed: FeedSynchronizer::new(),
            status_rx,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn sign_in(&mut self, request: SignInRequest) {
        self.view.add_status_message("Signing in...".to_string());
        self.gate.sign_in(&self.ctx, request);
    }

    pub fn handle_input(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind == KeyEventKind::Press {
                match self.view.surface {
                    Surface::Login => self.handle_login_key(key),
                    Surface::Chat => self.handle_chat_key(key),
                }
            }
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        let input = &mut self.view.login_input;
        match key.code {
            KeyCode::Enter => {
                let request = SignInRequest::from_input(input.value());
                input.clear();
                self.sign_in(request);
            }
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(c) => input.insert(c),
            KeyCode::Backspace => input.backspace(),
            KeyCode::Delete => input.delete(),
            KeyCode::Left => input.left(),
            KeyCode::Right => input.right(),
            KeyCode::Home => input.home(),
            KeyCode::End => input.end(),
            _ => {}
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                }
                KeyCode::Char('i') => {
                    self.view.compose.focus = ComposeField::Message;
                    self.input_mode = InputMode::Editing;
                }
                KeyCode::Char('r') => {
                    self.view.compose.focus = ComposeField::Room;
                    self.input_mode = InputMode::Editing;
                }
                KeyCode::Char('s') if self.view.sign_out_visible => {
                    self.sign_out();
                }
                KeyCode::Char('f') => {
                    let room = self.view.compose.room.value().to_string();
                    self.toggle_filter(Some(room));
                }
                KeyCode::Up => self.view.feed.scroll_up(1),
                KeyCode::Down => self.view.feed.scroll_down(1),
                KeyCode::PageUp => self.view.feed.scroll_up(10),
                KeyCode::PageDown => self.view.feed.scroll_down(10),
                KeyCode::End => self.view.feed.scroll_to_end(),
                _ => {}
            },
            InputMode::Editing => match key.code {
                KeyCode::Enter => self.submit_input(),
                KeyCode::Tab => self.view.compose.toggle_focus(),
                KeyCode::Esc => self.input_mode = InputMode::Normal,
                KeyCode::Char(c) => self.view.compose.edit(|i| i.insert(c)),
                KeyCode::Backspace => self.view.compose.edit(|i| i.backspace()),
                KeyCode::Delete => self.view.compose.edit(|i| i.delete()),
                KeyCode::Left => self.view.compose.edit(|i| i.left()),
                KeyCode::Right => self.view.compose.edit(|i| i.right()),
                KeyCode::Home => self.view.compose.edit(|i| i.home()),
                KeyCode::End => self.view.compose.edit(|i| i.end()),
                _ => {}
            },
        }
    }

    fn submit_input(&mut self) {
        let input = self.view.compose.message.value().trim().to_string();
        if input.starts_with('/') {
            self.view.compose.reset_message();
            self.handle_command(&input);
            return;
        }

        self.feed.submit(&self.ctx, &mut self.view);
    }

    fn handle_command(&mut self, input: &str) {
        let parts: Vec<&str> = input[1..].split_whitespace().collect();
        if parts.is_empty() {
            return;
        }

        match parts[0].to_lowercase().as_str() {
            "room" | "r" => {
                if parts.len() != 2 {
                    self.view.add_status_message("Usage: /room <number>".to_string());
                    return;
                }
                self.view.compose.room.set(parts[1]);
                self.view.add_status_message(format!("Posting to room {}", parts[1]));
            }
            "filter" | "f" => match parts.get(1) {
                Some(&"off") => self.toggle_filter(None),
                Some(room) => self.toggle_filter(Some(room.to_string())),
                None => {
                    let room = self.view.compose.room.value().to_string();
                    self.toggle_filter(Some(room));
                }
            },
            "signout" | "logout" => self.sign_out(),
            "help" | "h" | "commands" => self.show_help(),
            "quit" | "q" | "exit" => self.should_quit = true,
            _ => {
                self.view.add_status_message(format!(
                    "Unknown command: {}. Type /help for available commands.",
                    parts[0]
                ));
            }
        }
    }

    fn toggle_filter(&mut self, room: Option<String>) {
        self.view.room_filter = match room {
            Some(room) if self.view.room_filter.as_deref() != Some(room.as_str()) => {
                self.view.add_status_message(format!("Showing room {} and announcements", room));
                Some(room)
            }
            _ => {
                self.view.add_status_message("Showing all rooms".to_string());
                None
            }
        };
        self.view.feed.scroll_to_end();
    }

    fn sign_out(&mut self) {
        self.input_mode = InputMode::Normal;
        self.gate.sign_out(&self.ctx);
    }

    fn show_help(&mut self) {
        let help_text = [
            "FlowStrands Commands:",
            "/room <number> - Set the room for outgoing messages (0 = announcement)",
            "/filter [<number>|off] - Show one room (plus announcements) or all",
            "/signout - Sign out",
            "/help, /commands - Show this help",
            "/quit, /exit - Exit FlowStrands",
            "",
            "Keyboard Commands:",
            "i=edit message, r=edit room, Tab=switch field, Esc=normal mode",
            "Up/Down=scroll, Page Up/Down=fast scroll, End=latest, f=filter room",
            "s=sign out, q=quit (normal mode)",
        ];

        for line in help_text {
            self.view.add_status_message(line.to_string());
        }
    }

    pub fn on_tick(&mut self) {
        while let Some(user) = self.gate.poll() {
            if user.is_none() {
                self.input_mode = InputMode::Normal;
            }
            self.gate
                .on_auth_changed(&self.ctx, user, &mut self.view, &mut self.feed);
        }

        self.feed.drain(&mut self.view);

        while let Ok(status) = self.status_rx.try_recv() {
            self.view.add_status_message(status);
        }

        self.view.expire_notice(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::feed::{Layout, MemoryStore, MessageRecord};
    use crate::session::{LocalIdentityProvider, User};
    use crossterm::event::KeyModifiers;
    use std::sync::Arc;
    use std::time::Duration;

    fn app_with(auth: LocalIdentityProvider, store: MemoryStore) -> App {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let ctx = AppContext::new(Config::default(), Arc::new(auth), Arc::new(store), status_tx);
        App::new(ctx, status_rx, "local".to_string())
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_input(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    async fn settle(app: &mut App, done: impl Fn(&App) -> bool) {
        for _ in 0..200 {
            app.on_tick();
            if done(app) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("app never settled");
    }

    fn history() -> Vec<MessageRecord> {
        (0..3)
            .map(|i| MessageRecord {
                id: format!("m{}", i),
                author_name: "grace".to_string(),
                author_photo_url: None,
                text: format!("message {}", i),
                room_number: "1".to_string(),
                created_at: chrono::DateTime::from_timestamp(1_700_000_000 + i, 0).unwrap(),
            })
            .rev()
            .collect()
    }

    fn ada() -> User {
        User {
            uid: "uid-ada".to_string(),
            display_name: "ada".to_string(),
            photo_url: Some("https://example.org/ada.png".to_string()),
        }
    }

    async fn signed_in_app(store: MemoryStore) -> App {
        let mut app = app_with(LocalIdentityProvider::signed_in(ada()), store);
        settle(&mut app, |a| a.view.profile.visible).await;
        app
    }

    #[tokio::test]
    async fn unauthenticated_visitor_is_sent_to_login() {
        let mut app = app_with(LocalIdentityProvider::new(), MemoryStore::new());
        assert_eq!(app.view.surface, Surface::Chat);

        settle(&mut app, |a| a.view.surface == Surface::Login).await;
        assert!(app.view.sign_in_visible);
    }

    #[tokio::test]
    async fn signing_in_shows_profile_and_history_in_order() {
        let mut app = app_with(LocalIdentityProvider::new(), MemoryStore::with_records(history()));
        settle(&mut app, |a| a.view.surface == Surface::Login).await;

        type_text(&mut app, "grace");
        press(&mut app, KeyCode::Enter);
        settle(&mut app, |a| a.view.feed.len() == 3).await;

        assert_eq!(app.view.surface, Surface::Chat);
        assert_eq!(app.view.profile.name, "grace");
        assert!(app.view.profile.visible);
        assert!(app.view.sign_out_visible);
        assert!(!app.view.sign_in_visible);
        let texts: Vec<String> = app.view.feed.nodes().iter().map(|n| n.text()).collect();
        assert_eq!(texts, vec!["message 0", "message 1", "message 2"]);
    }

    #[tokio::test]
    async fn submitted_message_appears_in_standard_layout() {
        let store = MemoryStore::new();
        let mut app = signed_in_app(store.clone()).await;

        press(&mut app, KeyCode::Char('r'));
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "2");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "hello");
        assert!(app.view.compose.submit_enabled());
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.view.compose.message.value(), "");
        assert!(!app.view.compose.submit_enabled());

        settle(&mut app, |a| a.view.feed.len() == 1).await;
        let node = &app.view.feed.nodes()[0];
        assert_eq!(node.text(), "hello");
        assert_eq!(node.room_number, "2");
        assert_eq!(node.layout, Layout::Standard);
        assert_eq!(node.name, "ada");
        assert_eq!(store.records()[0].room_number, "2");
    }

    #[tokio::test]
    async fn room_zero_message_renders_as_announcement() {
        let mut app = signed_in_app(MemoryStore::new()).await;

        press(&mut app, KeyCode::Char('i'));
        type_text(&mut app, "/room 0");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.view.compose.room.value(), "0");

        type_text(&mut app, "maintenance tonight");
        press(&mut app, KeyCode::Enter);

        settle(&mut app, |a| a.view.feed.len() == 1).await;
        assert_eq!(app.view.feed.nodes()[0].layout, Layout::Announcement);
    }

    #[tokio::test]
    async fn signing_out_returns_to_login() {
        let mut app = signed_in_app(MemoryStore::with_records(history())).await;
        settle(&mut app, |a| a.view.feed.len() == 3).await;

        press(&mut app, KeyCode::Char('s'));
        settle(&mut app, |a| a.view.surface == Surface::Login).await;

        assert!(!app.view.profile.visible);
        assert!(!app.view.sign_out_visible);
        assert!(app.view.sign_in_visible);
        assert!(app.view.feed.is_empty());
        assert!(app.context().auth.current_user().is_none());
    }

    #[tokio::test]
    async fn empty_enter_does_not_write() {
        let store = MemoryStore::new();
        let mut app = signed_in_app(store.clone()).await;

        press(&mut app, KeyCode::Char('i'));
        press(&mut app, KeyCode::Enter);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn commands_are_not_sent_as_messages() {
        let store = MemoryStore::new();
        let mut app = signed_in_app(store.clone()).await;

        press(&mut app, KeyCode::Char('i'));
        type_text(&mut app, "/bogus");
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "/filter 4");
        press(&mut app, KeyCode::Enter);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.write_count(), 0);
        assert_eq!(app.view.room_filter.as_deref(), Some("4"));
        assert!(app
            .view
            .status_messages
            .iter()
            .any(|l| l.contains("Unknown command: bogus")));

        type_text(&mut app, "/filter off");
        press(&mut app, KeyCode::Enter);
        assert!(app.view.room_filter.is_none());
    }

    #[tokio::test]
    async fn escape_on_login_quits() {
        let mut app = app_with(LocalIdentityProvider::new(), MemoryStore::new());
        settle(&mut app, |a| a.view.surface == Surface::Login).await;
        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit);
    }
}
