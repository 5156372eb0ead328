use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};
use std::time::Instant;

use crate::app::{App, InputMode};
use crate::feed::Layout as NodeLayout;
use crate::view::{ComposeField, FeedNode, Surface};

pub fn draw(f: &mut Frame<'_>, app: &App) {
    match app.view.surface {
        Surface::Login => draw_login(f, app),
        Surface::Chat => draw_chat(f, app),
    }
}

fn draw_login(f: &mut Frame<'_>, app: &App) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(7), // Instructions
            Constraint::Length(3), // Input
            Constraint::Min(0),    // Status log
        ])
        .split(size);

    draw_title_bar(f, app, chunks[0]);

    let instructions = vec![
        Line::from(Span::styled(
            "Sign in to FlowStrands",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  nsec1...      sign in with an existing key"),
        Line::from("  <name>        create a new identity with that name"),
        Line::from("  (empty)       create a new identity with a random name"),
    ];
    let instructions_block = Block::default()
        .borders(Borders::ALL)
        .title(" Login ")
        .style(Style::default().fg(Color::Blue));
    f.render_widget(Paragraph::new(instructions).block(instructions_block), chunks[1]);

    // never echo a secret key back to the screen
    let input = app.view.login_input.value();
    let shown = if input.starts_with("nsec") {
        "*".repeat(input.chars().count())
    } else {
        input.to_string()
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .title(" ENTER=sign in, ESC=quit ")
        .style(Style::default().fg(Color::Green));
    f.render_widget(Paragraph::new(shown).block(input_block), chunks[2]);
    f.set_cursor(
        chunks[2].x + app.view.login_input.cursor() as u16 + 1,
        chunks[2].y + 1,
    );

    draw_status_log(f, app, chunks[3]);
}

fn draw_chat(f: &mut Frame<'_>, app: &App) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Main content
            Constraint::Length(1), // Notice line
            Constraint::Length(3), // Input area
        ])
        .split(size);

    draw_title_bar(f, app, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(75), // Feed
            Constraint::Percentage(25), // Profile/rooms/status
        ])
        .split(chunks[1]);

    draw_feed(f, app, main_chunks[0]);
    draw_info_panel(f, app, main_chunks[1]);
    draw_notice(f, app, chunks[2]);
    draw_input_area(f, app, chunks[3]);
}

fn draw_title_bar(f: &mut Frame<'_>, app: &App, area: Rect) {
    let account = if app.view.profile.visible {
        app.view.profile.name.as_str()
    } else {
        "signed out"
    };
    let title = format!(
        " FlowStrands v{} | {} | {} ",
        env!("CARGO_PKG_VERSION"),
        account,
        app.backend_label
    );

    let title_block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(if app.view.profile.visible {
            Color::Green
        } else {
            Color::Yellow
        }))
        .title(" FlowStrands ");

    let title_paragraph = Paragraph::new(title)
        .block(title_block)
        .alignment(Alignment::Center);

    f.render_widget(title_paragraph, area);
}

fn node_lines<'a>(node: &'a FeedNode, now: Instant) -> Vec<Line<'a>> {
    let timestamp = node
        .created_at
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();

    let mut body_style = Style::default();
    if node.is_fading_in(now) {
        body_style = body_style.add_modifier(Modifier::DIM);
    }

    let mut lines = Vec::with_capacity(node.lines.len() + 1);
    match node.layout {
        NodeLayout::Announcement => {
            let body_style = body_style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
            lines.push(Line::from(vec![
                Span::styled(format!("[{}] ", timestamp), Style::default().fg(Color::Gray)),
                Span::styled("*** ", body_style),
                Span::styled(format!("{}: ", node.name), body_style),
                Span::styled(node.lines.first().map(String::as_str).unwrap_or(""), body_style),
            ]));
            for line in node.lines.iter().skip(1) {
                lines.push(Line::from(Span::styled(format!("    {}", line), body_style)));
            }
        }
        NodeLayout::Standard => {
            lines.push(Line::from(vec![
                Span::styled(format!("[{}] ", timestamp), Style::default().fg(Color::Gray)),
                Span::styled(format!("#{} ", node.room_number), Style::default().fg(Color::Cyan)),
                Span::styled(format!("<{}> ", node.name), Style::default().fg(Color::Magenta)),
                Span::styled(node.lines.first().map(String::as_str).unwrap_or(""), body_style),
            ]));
            for line in node.lines.iter().skip(1) {
                lines.push(Line::from(Span::styled(format!("    {}", line), body_style)));
            }
        }
    }
    lines
}

fn draw_feed(f: &mut Frame<'_>, app: &App, area: Rect) {
    let title = match &app.view.room_filter {
        Some(room) => format!(" Messages: room {} + announcements ", room),
        None => " Messages ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let now = Instant::now();
    let mut lines = Vec::new();
    for node in app
        .view
        .feed
        .visible_nodes(inner.height as usize, app.view.room_filter.as_deref())
    {
        lines.extend(node_lines(node, now));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No messages yet. Press 'i' to write one.",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )));
    }

    // rows are wrapped here so the tail of the last node is always the bottom row
    let mut rows = wrap_rows(&lines, inner.width as usize);
    let rows = rows.split_off(rows.len().saturating_sub(inner.height as usize));

    f.render_widget(Paragraph::new(rows), inner);
}

/// Hard-wrap `lines` at `width` columns, one `Line` per screen row.
fn wrap_rows(lines: &[Line<'_>], width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut rows = Vec::new();

    for line in lines {
        let mut row: Vec<Span<'static>> = Vec::new();
        let mut row_width = 0;
        for span in &line.spans {
            for grapheme in span.styled_graphemes(Style::default()) {
                let grapheme_width = Span::raw(grapheme.symbol).width();
                if row_width > 0 && row_width + grapheme_width > width {
                    rows.push(Line::from(std::mem::take(&mut row)));
                    row_width = 0;
                }
                match row.last_mut() {
                    Some(last) if last.style == grapheme.style => {
                        last.content.to_mut().push_str(grapheme.symbol);
                    }
                    _ => {
                        row.push(Span::styled(grapheme.symbol.to_string(), grapheme.style));
                    }
                }
                row_width += grapheme_width;
            }
        }
        rows.push(Line::from(row));
    }

    rows
}

fn draw_info_panel(f: &mut Frame<'_>, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),      // Profile
            Constraint::Percentage(40), // Rooms
            Constraint::Min(0),         // Status log
        ])
        .split(area);

    let profile_block = Block::default()
        .borders(Borders::ALL)
        .title(" Profile ")
        .style(Style::default().fg(Color::Blue));

    let profile_text = if app.view.profile.visible {
        vec![
            Line::from(vec![
                Span::raw("Name: "),
                Span::styled(&app.view.profile.name, Style::default().fg(Color::Green)),
            ]),
            Line::from(vec![
                Span::raw("Photo: "),
                Span::styled(
                    app.view.profile.photo_url.as_deref().unwrap_or("(none)"),
                    Style::default().fg(Color::Gray),
                ),
            ]),
            Line::from(Span::styled(
                if app.view.sign_out_visible { "[s] Sign out" } else { "" },
                Style::default().fg(Color::Yellow),
            )),
        ]
    } else {
        vec![Line::from(Span::styled(
            if app.view.sign_in_visible { "Signed out" } else { "" },
            Style::default().fg(Color::Yellow),
        ))]
    };
    f.render_widget(Paragraph::new(profile_text).block(profile_block), chunks[0]);

    let rooms_block = Block::default()
        .borders(Borders::ALL)
        .title(" Rooms ")
        .style(Style::default().fg(Color::Blue));

    let current = app.view.compose.room.value();
    let items: Vec<ListItem> = app
        .view
        .rooms
        .list()
        .into_iter()
        .map(|room| {
            let label = if room.room_number == crate::feed::ANNOUNCEMENT_ROOM {
                format!("#0 announcements ({})", room.message_count)
            } else {
                format!("#{} ({})", room.room_number, room.message_count)
            };
            let style = if room.room_number == current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(label).style(style)
        })
        .collect();

    let rooms_list = if items.is_empty() {
        List::new(vec![ListItem::new("No rooms yet").style(Style::default().fg(Color::Gray))])
    } else {
        List::new(items)
    }
    .block(rooms_block);
    f.render_widget(rooms_list, chunks[1]);

    draw_status_log(f, app, chunks[2]);
}

fn draw_status_log(f: &mut Frame<'_>, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Status ")
        .style(Style::default().fg(Color::Blue));
    let inner_height = block.inner(area).height as usize;

    let start = app.view.status_messages.len().saturating_sub(inner_height);
    let lines: Vec<Line> = app.view.status_messages[start..]
        .iter()
        .map(|m| Line::from(Span::styled(m.as_str(), Style::default().fg(Color::Gray))))
        .collect();

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_notice(f: &mut Frame<'_>, app: &App, area: Rect) {
    if let Some(notice) = app.view.active_notice() {
        let paragraph = Paragraph::new(notice.text.as_str())
            .style(Style::default().fg(Color::Black).bg(Color::Yellow))
            .alignment(Alignment::Center);
        f.render_widget(paragraph, area);
    }
}

fn draw_input_area(f: &mut Frame<'_>, app: &App, area: Rect) {
    let compose = &app.view.compose;
    let editing = app.input_mode == InputMode::Editing;

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(12), Constraint::Min(0)])
        .split(area);

    let focus_style = |field: ComposeField| {
        if editing && compose.focus == field {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let room_block = Block::default()
        .borders(Borders::ALL)
        .title(" Room ")
        .style(focus_style(ComposeField::Room));
    f.render_widget(Paragraph::new(compose.room.value()).block(room_block), chunks[0]);

    let mode_indicator = match app.input_mode {
        InputMode::Normal => " [NORMAL] i=write r=room q=quit ".to_string(),
        InputMode::Editing => format!(
            " [INPUT] ESC=normal TAB=field ENTER={} ",
            if compose.submit_enabled() { "send" } else { "(empty)" }
        ),
    };
    let message_block = Block::default()
        .borders(Borders::ALL)
        .title(mode_indicator)
        .style(focus_style(ComposeField::Message));
    f.render_widget(
        Paragraph::new(compose.message.value()).block(message_block),
        chunks[1],
    );

    if editing {
        let (chunk, cursor) = match compose.focus {
            ComposeField::Room => (chunks[0], compose.room.cursor()),
            ComposeField::Message => (chunks[1], compose.message.cursor()),
        };
        f.set_cursor(chunk.x + cursor as u16 + 1, chunk.y + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::AppContext;
    use crate::feed::{MemoryStore, MessageRecord};
    use crate::session::{LocalIdentityProvider, User};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn records(count: i64) -> Vec<MessageRecord> {
        (0..count)
            .map(|i| {
                let text = if i % 2 == 0 {
                    format!("long{} {}", i, "x".repeat(130))
                } else {
                    format!("short{}", i)
                };
                MessageRecord {
                    id: format!("m{:02}", i),
                    author_name: "grace".to_string(),
                    author_photo_url: None,
                    text,
                    room_number: "1".to_string(),
                    created_at: chrono::DateTime::from_timestamp(1_700_000_000 + i, 0).unwrap(),
                }
            })
            .collect()
    }

    async fn signed_in_app(store: MemoryStore, expected: usize) -> App {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let auth = LocalIdentityProvider::signed_in(User {
            uid: "uid-ada".to_string(),
            display_name: "ada".to_string(),
            photo_url: None,
        });
        let ctx = AppContext::new(Config::default(), Arc::new(auth), Arc::new(store), status_tx);
        let mut app = App::new(ctx, status_rx, "local".to_string());
        for _ in 0..200 {
            app.on_tick();
            if app.view.feed.len() == expected {
                return app;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("feed never loaded");
    }

    #[test]
    fn long_lines_wrap_at_pane_width() {
        let lines = vec![
            Line::from(vec![
                Span::raw("ab"),
                Span::styled("cdefg", Style::default().fg(Color::Red)),
            ]),
            Line::from(""),
        ];
        let rows = wrap_rows(&lines, 3);
        let text: Vec<String> = rows
            .iter()
            .map(|row| row.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(text, vec!["abc", "def", "g", ""]);
        assert_eq!(rows[1].spans[0].style.fg, Some(Color::Red));
    }

    #[tokio::test]
    async fn newest_message_is_on_screen_when_bodies_wrap() {
        let mut app = signed_in_app(MemoryStore::with_records(records(12)), 12).await;
        assert!(app.view.feed.is_following());

        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains("short11"), "newest message missing:\n{}", screen);

        // scrolling back then to the end brings it back
        app.view.feed.scroll_up(5);
        terminal.draw(|f| draw(f, &app)).unwrap();
        assert!(!screen_text(&terminal).contains("short11"));
        app.view.feed.scroll_to_end();
        terminal.draw(|f| draw(f, &app)).unwrap();
        assert!(screen_text(&terminal).contains("short11"));
    }
}
