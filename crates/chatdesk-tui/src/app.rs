use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chatdesk_core::{
    Attachment, ChatExchangeClient, Completion, CompletionSender, ConversationView, Entry, EntryId,
    Transport, UploadKind,
};

/// Composer grows with its content up to this many text rows
pub const MAX_COMPOSER_ROWS: u16 = 6;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Multi-line message input
#[derive(Debug, Default, Clone)]
pub struct Composer {
    pub text: String,
    pub cursor: usize, // cursor position in chars
}

impl Composer {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn newline(&mut self) {
        self.insert('\n');
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text rows needed to show everything, capped
    pub fn rows(&self) -> u16 {
        let lines = self.text.split('\n').count() as u16;
        lines.clamp(1, MAX_COMPOSER_ROWS)
    }

    /// (row, column) of the cursor within the text
    pub fn cursor_position(&self) -> (u16, u16) {
        let before: String = self.text.chars().take(self.cursor).collect();
        let row = before.matches('\n').count() as u16;
        let col = before
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count())
            .unwrap_or(0) as u16;
        (row, col)
    }
}

/// The file the user asked to upload, until the upload is underway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub kind: UploadKind,
    pub path: PathBuf,
}

/// Chat pane state: the TUI side of the conversation.
#[derive(Debug, Default)]
pub struct ChatPane {
    pub composer: Composer,
    pub selection: Option<FileSelection>,
    pub scroll: u16,
    /// Keep the newest entry in view
    pub follow: bool,
    pub max_scroll: u16,
    pub chat_height: u16,
    pub previews: HashMap<EntryId, String>,
}

impl ChatPane {
    pub fn new() -> Self {
        Self {
            follow: true,
            ..Self::default()
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.scroll = self.scroll.min(self.max_scroll).saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll);
        if self.scroll >= self.max_scroll {
            self.follow = true;
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}

/// One-line description of an image attachment, with its dimensions when
/// the bytes decode.
pub fn describe_image(attachment: &Attachment) -> String {
    match image::load_from_memory(&attachment.bytes) {
        Ok(img) => format!(
            "[image: {} {}x{}]",
            attachment.filename,
            img.width(),
            img.height()
        ),
        Err(e) => {
            tracing::debug!(filename = %attachment.filename, error = %e, "could not decode image preview");
            format!("[image: {}]", attachment.filename)
        }
    }
}

impl ConversationView for ChatPane {
    fn entry_appended(&mut self, _entry: &Entry) {
        self.follow = true;
    }

    fn entry_removed(&mut self, id: EntryId) {
        self.previews.remove(&id);
    }

    fn attachment_added(&mut self, id: EntryId, attachment: &Attachment) {
        self.previews.insert(id, describe_image(attachment));
    }

    fn conversation_reset(&mut self, _welcome: &Entry) {
        self.previews.clear();
        self.scroll = 0;
        self.follow = true;
    }

    fn composer_cleared(&mut self) {
        self.composer.clear();
    }

    fn file_selection_cleared(&mut self, kind: UploadKind) {
        if self.selection.as_ref().map(|s| s.kind) == Some(kind) {
            self.selection = None;
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub client: ChatExchangeClient<ChatPane>,
    pub base_url: String,
    /// Last local notice for the status line
    pub notice: Option<String>,
    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        welcome: &str,
        completions: CompletionSender,
    ) -> Self {
        Self {
            should_quit: false,
            client: ChatExchangeClient::new(transport, ChatPane::new(), welcome, completions),
            base_url: base_url.into(),
            notice: None,
            animation_frame: 0,
        }
    }

    pub fn chat(&self) -> &ChatPane {
        self.client.view()
    }

    pub fn chat_mut(&mut self) -> &mut ChatPane {
        self.client.view_mut()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn apply_completion(&mut self, completion: Completion) {
        self.client.apply(completion);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.client.pending_count() > 0 {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::{ChatMessage, Conversation};
    use std::io::Cursor;

    #[test]
    fn test_composer_edits_utf8() {
        let mut composer = Composer::default();
        for c in "héllo".chars() {
            composer.insert(c);
        }
        composer.left();
        composer.left();
        composer.backspace();
        assert_eq!(composer.text, "hélo");
        composer.home();
        composer.delete();
        assert_eq!(composer.text, "élo");
        composer.end();
        assert_eq!(composer.cursor, 3);
    }

    #[test]
    fn test_composer_grows_and_shrinks() {
        let mut composer = Composer::default();
        assert_eq!(composer.rows(), 1);
        composer.insert('a');
        composer.newline();
        composer.insert('b');
        assert_eq!(composer.rows(), 2);
        assert_eq!(composer.cursor_position(), (1, 1));

        for _ in 0..10 {
            composer.newline();
        }
        assert_eq!(composer.rows(), MAX_COMPOSER_ROWS);

        composer.clear();
        assert_eq!(composer.rows(), 1);
        assert_eq!(composer.cursor_position(), (0, 0));
    }

    #[test]
    fn test_view_clears_composer_and_selection() {
        let mut pane = ChatPane::new();
        pane.composer.insert('x');
        pane.selection = Some(FileSelection {
            kind: UploadKind::Csv,
            path: PathBuf::from("data.csv"),
        });

        pane.file_selection_cleared(UploadKind::Image);
        assert!(pane.selection.is_some());
        pane.file_selection_cleared(UploadKind::Csv);
        assert!(pane.selection.is_none());

        pane.composer_cleared();
        assert!(pane.composer.is_empty());
    }

    #[test]
    fn test_append_resumes_following() {
        let mut pane = ChatPane::new();
        pane.max_scroll = 20;
        pane.scroll = 20;
        pane.scroll_up(5);
        assert!(!pane.follow);
        assert_eq!(pane.scroll, 15);

        let mut conversation = Conversation::new("hi");
        let entry = conversation.push_message(ChatMessage::user("more")).clone();
        pane.entry_appended(&entry);
        assert!(pane.follow);
    }

    #[test]
    fn test_scroll_down_to_bottom_follows() {
        let mut pane = ChatPane::new();
        pane.max_scroll = 10;
        pane.scroll_up(4);
        pane.scroll_down(100);
        assert_eq!(pane.scroll, 10);
        assert!(pane.follow);
    }

    #[test]
    fn test_describe_image_reads_dimensions() {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 3));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();

        let attachment = Attachment::image("cover.png", bytes.into_inner());
        assert_eq!(describe_image(&attachment), "[image: cover.png 4x3]");

        let broken = Attachment::image("broken.png", vec![1, 2, 3]);
        assert_eq!(describe_image(&broken), "[image: broken.png]");
    }

    #[test]
    fn test_previews_dropped_on_reset() {
        let mut pane = ChatPane::new();
        let mut conversation = Conversation::new("hi");
        let id = conversation.push_message(ChatMessage::user("pic")).id();
        pane.attachment_added(id, &Attachment::image("x.png", vec![0]));
        assert!(pane.previews.contains_key(&id));

        pane.conversation_reset(conversation.reset());
        assert!(pane.previews.is_empty());
    }
}
