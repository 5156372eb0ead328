use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::feed::{Layout, ANNOUNCEMENT_ROOM};

/// How long a freshly revealed node is drawn dimmed.
pub const FADE_IN: Duration = Duration::from_millis(300);

/// One rendered message in the feed pane.
#[derive(Debug, Clone)]
pub struct FeedNode {
    pub id: String,
    pub layout: Layout,
    pub name: String,
    pub photo_url: Option<String>,
    pub lines: Vec<String>,
    pub room_number: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub visible: bool,
    revealed_at: Option<Instant>,
}

impl FeedNode {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            layout: Layout::Standard,
            name: String::new(),
            photo_url: None,
            lines: Vec::new(),
            room_number: String::new(),
            created_at: None,
            visible: false,
            revealed_at: None,
        }
    }

    /// Replace the body; each newline becomes a line break.
    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect();
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn reveal(&mut self) {
        if !self.visible {
            self.visible = true;
            self.revealed_at = Some(Instant::now());
        }
    }

    pub fn is_fading_in(&self, now: Instant) -> bool {
        self.revealed_at
            .map_or(false, |at| now.saturating_duration_since(at) < FADE_IN)
    }
}

/// The feed pane: nodes in insertion order, addressable by record id.
#[derive(Debug, Default)]
pub struct FeedView {
    nodes: Vec<FeedNode>,
    index: HashMap<String, usize>,
    /// Nodes scrolled up from the end; 0 follows the tail.
    scroll_back: usize,
}

impl FeedView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup-or-create the node bound to `id`. New nodes are appended.
    pub fn upsert(&mut self, id: &str) -> &mut FeedNode {
        let pos = match self.index.get(id) {
            Some(&pos) => pos,
            None => {
                self.nodes.push(FeedNode::new(id));
                let pos = self.nodes.len() - 1;
                self.index.insert(id.to_string(), pos);
                pos
            }
        };
        &mut self.nodes[pos]
    }

    pub fn get(&self, id: &str) -> Option<&FeedNode> {
        self.index.get(id).map(|&pos| &self.nodes[pos])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[FeedNode] {
        &self.nodes
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.scroll_back = 0;
    }

    pub fn scroll_to_end(&mut self) {
        self.scroll_back = 0;
    }

    pub fn is_following(&self) -> bool {
        self.scroll_back == 0
    }

    pub fn scroll_up(&mut self, by: usize) {
        self.scroll_back = (self.scroll_back + by).min(self.nodes.len().saturating_sub(1));
    }

    pub fn scroll_down(&mut self, by: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(by);
    }

    /// Nodes that fit in `height` rows of the pane, honouring the scroll position.
    /// With a room filter, only that room and announcements are shown.
    pub fn visible_nodes(&self, height: usize, room_filter: Option<&str>) -> Vec<&FeedNode> {
        let shown: Vec<&FeedNode> = self
            .nodes
            .iter()
            .filter(|n| n.visible)
            .filter(|n| match room_filter {
                Some(room) => n.room_number == room || n.room_number == ANNOUNCEMENT_ROOM,
                None => true,
            })
            .collect();

        let end = shown.len().saturating_sub(self.scroll_back);
        let start = end.saturating_sub(height);
        shown[start..end].to_vec()
    }
}
