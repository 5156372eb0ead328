#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeField {
    Message,
    Room,
}

/// A single-line text input with a char-based cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    pub fn with_value(value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn byte_at(&self, char_pos: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_pos)
            .map_or(self.value.len(), |(i, _)| i)
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_at(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            let at = self.byte_at(self.cursor - 1);
            self.value.remove(at);
            self.cursor -= 1;
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }
}

/// Message input, room-number input and the submit control.
#[derive(Debug, Clone)]
pub struct Compose {
    pub message: TextInput,
    pub room: TextInput,
    pub focus: ComposeField,
    submit_enabled: bool,
}

impl Compose {
    pub fn new(default_room: &str) -> Self {
        Self {
            message: TextInput::default(),
            room: TextInput::with_value(default_room),
            focus: ComposeField::Message,
            submit_enabled: false,
        }
    }

    pub fn submit_enabled(&self) -> bool {
        self.submit_enabled
    }

    /// Submit is enabled exactly when the message input is non-empty.
    pub fn refresh_submit(&mut self) {
        self.submit_enabled = !self.message.value().is_empty();
    }

    pub fn focused_mut(&mut self) -> &mut TextInput {
        match self.focus {
            ComposeField::Message => &mut self.message,
            ComposeField::Room => &mut self.room,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            ComposeField::Message => ComposeField::Room,
            ComposeField::Room => ComposeField::Message,
        };
    }

    /// Edit the focused field and keep the submit control in step.
    pub fn edit(&mut self, f: impl FnOnce(&mut TextInput)) {
        f(self.focused_mut());
        self.refresh_submit();
    }

    pub fn reset_message(&mut self) {
        self.message.clear();
        self.refresh_submit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_handles_multibyte_chars() {
        let mut input = TextInput::default();
        for c in "héllo".chars() {
            input.insert(c);
        }
        input.left();
        input.left();
        input.backspace();
        assert_eq!(input.value(), "hélo");
        input.home();
        input.delete();
        assert_eq!(input.value(), "élo");
        input.end();
        input.insert('!');
        assert_eq!(input.value(), "élo!");
    }

    #[test]
    fn submit_tracks_message_content() {
        let mut compose = Compose::new("1");
        assert!(!compose.submit_enabled());

        compose.edit(|i| i.insert('h'));
        assert!(compose.submit_enabled());

        compose.edit(|i| i.backspace());
        assert!(!compose.submit_enabled());
    }

    #[test]
    fn room_edits_do_not_enable_submit() {
        let mut compose = Compose::new("1");
        compose.toggle_focus();
        compose.edit(|i| i.insert('2'));
        assert_eq!(compose.room.value(), "12");
        assert!(!compose.submit_enabled());
    }
}
