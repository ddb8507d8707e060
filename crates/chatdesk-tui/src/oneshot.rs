//! Non-interactive subcommands: run one exchange and print the result.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chatdesk_core::{
    completion_channel, Attachment, ChatExchangeClient, ConversationView, Entry, EntryId,
    SelectedFile, Transport, UploadKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneShot {
    Send(String),
    Upload(UploadKind, PathBuf),
    Reset,
}

/// Prints each message as it lands in the conversation. The first failed
/// write is kept and later output is skipped.
pub struct PrintView<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> PrintView<W> {
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    fn line(&mut self, args: fmt::Arguments) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_fmt(format_args!("{}\n", args)) {
            tracing::warn!(error = %e, "could not write output");
            self.error = Some(e);
        }
    }

    pub fn finish(self) -> io::Result<W> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.out),
        }
    }
}

impl<W: Write> ConversationView for PrintView<W> {
    fn entry_appended(&mut self, entry: &Entry) {
        if let Some(msg) = entry.message() {
            self.line(format_args!("{}: {}", msg.role.label(), msg.content));
        }
    }

    fn entry_removed(&mut self, _id: EntryId) {}

    fn attachment_added(&mut self, _id: EntryId, attachment: &Attachment) {
        self.line(format_args!(
            "     [image attached: {} ({} bytes)]",
            attachment.filename,
            attachment.bytes.len()
        ));
    }

    fn conversation_reset(&mut self, _welcome: &Entry) {
        self.line(format_args!("Conversation cleared."));
    }

    fn composer_cleared(&mut self) {}

    fn file_selection_cleared(&mut self, _kind: UploadKind) {}
}

pub async fn run<W: Write>(
    transport: Arc<dyn Transport>,
    welcome: &str,
    command: OneShot,
    out: W,
) -> Result<W> {
    let (tx, mut rx) = completion_channel();
    let mut client = ChatExchangeClient::new(transport, PrintView::new(out), welcome, tx);

    let started = match command {
        OneShot::Send(text) => client.submit_text(&text),
        OneShot::Upload(kind, path) => {
            let file = SelectedFile::read(&path).await?;
            match kind {
                UploadKind::Image => client.submit_image(Some(file)),
                UploadKind::Csv => client.submit_csv(Some(file)),
            }
        }
        OneShot::Reset => Some(client.reset()),
    };

    if started.is_none() {
        tracing::debug!("nothing to send");
    } else if let Some(completion) = rx.recv().await {
        client.apply(completion);
    }

    let mut out = client.into_view().finish()?;
    out.flush()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::HttpTransport;

    fn offline() -> Arc<dyn Transport> {
        Arc::new(HttpTransport::new("http://127.0.0.1:9"))
    }

    #[tokio::test]
    async fn test_send_prints_user_and_failure() {
        let out = run(offline(), "Welcome!", OneShot::Send("hi".to_string()), Vec::new())
            .await
            .unwrap();
        let printed = String::from_utf8(out).unwrap();
        assert_eq!(
            printed,
            "You: hi\nAI: Sorry, something went wrong. Please try again.\n"
        );
    }

    #[tokio::test]
    async fn test_blank_send_prints_nothing() {
        let out = run(offline(), "Welcome!", OneShot::Send("  ".to_string()), Vec::new())
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let result = run(offline(), "Welcome!", OneShot::Send("hi".to_string()), ClosedPipe).await;
        let err = result.err().unwrap();
        let io_err = err.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_reset_prints_confirmation() {
        let out = run(offline(), "Welcome!", OneShot::Reset, Vec::new())
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Conversation cleared.\n");
    }
}
