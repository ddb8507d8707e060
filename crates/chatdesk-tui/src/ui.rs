use chatdesk_core::{ChatRole, Entry};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};

use crate::app::{describe_image, App};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn role_style(role: ChatRole) -> Style {
    let color = match role {
        ChatRole::User => Color::Cyan,
        ChatRole::Assistant => Color::Yellow,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Rendered lines for every entry, pending placeholders included
fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let chat = app.chat();

    for entry in app.client.conversation().entries() {
        match entry {
            Entry::Message(id, msg) => {
                lines.push(Line::from(Span::styled(
                    format!("{}:", msg.role.label()),
                    role_style(msg.role),
                )));
                match msg.role {
                    ChatRole::User => {
                        for line in msg.content.lines() {
                            lines.push(Line::from(line.to_string()));
                        }
                    }
                    ChatRole::Assistant => {
                        for line in msg.content.lines() {
                            lines.push(parse_markdown_line(line));
                        }
                    }
                }
                if let Some(attachment) = &msg.attachment {
                    let preview = chat
                        .previews
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| describe_image(attachment));
                    lines.push(Line::from(Span::styled(
                        preview,
                        Style::default().fg(Color::Magenta),
                    )));
                }
                lines.push(Line::default());
            }
            Entry::Pending(_) => {
                lines.push(Line::from(Span::styled(
                    "AI:",
                    role_style(ChatRole::Assistant),
                )));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
                lines.push(Line::default());
            }
        }
    }

    lines
}

/// Rows the paragraph takes once word-wrapped at `width`
fn wrapped_height(paragraph: &Paragraph, width: u16) -> u16 {
    u16::try_from(paragraph.line_count(width.max(1))).unwrap_or(u16::MAX)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let composer_height = app.chat().composer.rows() + 2;

    // Main layout: header, chat, composer, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(composer_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_composer(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" chatdesk ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.base_url.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(Text::from(chat_lines(app))).wrap(Wrap { trim: false });

    // Inner size minus borders
    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);
    let total = wrapped_height(&paragraph, inner_width);

    let chat = app.chat_mut();
    chat.chat_height = inner_height;
    chat.max_scroll = total.saturating_sub(inner_height);
    if chat.follow || chat.scroll > chat.max_scroll {
        chat.scroll = chat.max_scroll;
    }
    let scroll = chat.scroll;
    let max_scroll = chat.max_scroll;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Conversation ");

    let paragraph = paragraph.block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);

    if max_scroll > 0 {
        let mut state = ScrollbarState::new(max_scroll as usize).position(scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }
}

fn render_composer(app: &App, frame: &mut Frame, area: Rect) {
    let composer = &app.chat().composer;

    let title = match &app.chat().selection {
        Some(selection) => format!(
            " Uploading {} ",
            selection.path.display()
        ),
        None => " Message (Enter to send, Alt+Enter for newline) ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);

    // Keep the cursor row visible once the composer hits its height cap
    let (cursor_row, cursor_col) = composer.cursor_position();
    let visible_rows = area.height.saturating_sub(2);
    let row_offset = cursor_row.saturating_sub(visible_rows.saturating_sub(1));

    let input = if composer.is_empty() {
        Paragraph::new(Span::styled(
            "Ask about your library data...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block)
    } else {
        // Use cyan text to match the "You:" style - visible in both light and dark terminals
        Paragraph::new(composer.text.as_str())
            .style(Style::default().fg(Color::Cyan))
            .scroll((row_offset, 0))
            .block(block)
    };
    frame.render_widget(input, area);

    frame.set_cursor_position((
        area.x + 1 + cursor_col.min(area.width.saturating_sub(3)),
        area.y + 1 + cursor_row - row_offset,
    ));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let in_flight = app.client.in_flight();
    let activity = if in_flight > 0 {
        Span::styled(
            format!(" {} in flight ", in_flight),
            Style::default().bg(Color::Yellow).fg(Color::Black),
        )
    } else {
        Span::styled(" ready ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    let mut spans = vec![
        activity,
        Span::styled(
            " /image <path>  /csv <path>  /reset  ^R reset  PgUp/PgDn scroll  ^C quit ",
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if let Some(notice) = &app.notice {
        spans.push(Span::styled(
            format!(" {} ", notice),
            Style::default().fg(Color::Magenta),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::{completion_channel, HttpTransport};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    #[test]
    fn test_bold_markdown() {
        let line = parse_markdown_line("Top title: **Dune** (42 loans)");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "Dune");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_unclosed_bold_is_literal() {
        let line = parse_markdown_line("5 ** 2");
        let text: String = line.spans.iter().map(|s| s.content.to_string()).collect();
        assert_eq!(text, "5 ** 2");
    }

    #[test]
    fn test_wrapped_height_breaks_at_words() {
        let paragraph = Paragraph::new(Text::from(vec![
            Line::from("a".repeat(21)),
            Line::default(),
            Line::from("abcd efgh ijkl"),
        ]))
        .wrap(Wrap { trim: false });
        // 3 rows for the long word, 1 blank, 3 for the words that don't share a row
        assert_eq!(wrapped_height(&paragraph, 7), 3 + 1 + 3);
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for row in buffer.content.chunks(buffer.area.width as usize) {
            for cell in row {
                text.push_str(cell.symbol());
            }
            text.push('\n');
        }
        text
    }

    #[tokio::test]
    async fn test_newest_entry_stays_in_view_after_word_wrap() {
        let (tx, _rx) = completion_channel();
        let transport = Arc::new(HttpTransport::new("http://127.0.0.1:9"));
        let mut app = App::new(transport, "http://127.0.0.1:9", "Welcome!", tx);

        let long = "abcdefg ".repeat(40);
        app.client.submit_text(&long);
        app.client.submit_text(&long);
        app.client.submit_text("LASTMSG");

        let mut terminal = Terminal::new(TestBackend::new(22, 20)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen = screen_text(&terminal);
        assert!(screen.contains("LASTMSG"), "{}", screen);
        assert!(screen.contains("Thinking"), "{}", screen);
        assert_eq!(app.chat().scroll, app.chat().max_scroll);
    }
}
