//! The chat exchange client
//!
//! Turns user actions into backend exchanges and keeps the conversation in
//! step with them. Everything here runs on the host's event loop: a submit
//! mutates the conversation, spawns the transport call, and the call's
//! [`Completion`] comes back through a channel to be [`applied`] on the same
//! loop. Overlapping exchanges are not queued or cancelled; their completions
//! land in whatever order the transport resolves them.
//!
//! [`applied`]: ChatExchangeClient::apply

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::conversation::{Conversation, Entry, EntryId};
use crate::state::{Attachment, ChatMessage};
use crate::transport::{
    ChatAnswer, CsvSummary, ExchangeResult, ImageAnalysis, ResetAck, ServerReply, Transport,
};
use crate::upload::{SelectedFile, UploadKind};

pub const TEXT_FAILURE_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

/// Rendering boundary. Appending an entry implies scrolling to it.
pub trait ConversationView {
    fn entry_appended(&mut self, entry: &Entry);

    fn entry_removed(&mut self, id: EntryId);

    fn attachment_added(&mut self, id: EntryId, attachment: &Attachment);

    /// Everything but the welcome entry is gone.
    fn conversation_reset(&mut self, welcome: &Entry);

    /// The text composer should drop its content and shrink back.
    fn composer_cleared(&mut self);

    fn file_selection_cleared(&mut self, kind: UploadKind);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeRequest {
    TextMessage(String),
    ImageUpload { bytes: Vec<u8>, filename: String },
    CsvUpload { bytes: Vec<u8>, filename: String },
    Reset,
}

impl ExchangeRequest {
    pub fn label(&self) -> &'static str {
        match self {
            ExchangeRequest::TextMessage(_) => "text",
            ExchangeRequest::ImageUpload { .. } => "image",
            ExchangeRequest::CsvUpload { .. } => "csv",
            ExchangeRequest::Reset => "reset",
        }
    }

    pub async fn send(self, transport: &dyn Transport) -> Outcome {
        match self {
            ExchangeRequest::TextMessage(text) => Outcome::Text(transport.send_text(&text).await),
            ExchangeRequest::ImageUpload { bytes, filename } => {
                Outcome::Image(transport.send_image(bytes, &filename).await)
            }
            ExchangeRequest::CsvUpload { bytes, filename } => {
                Outcome::Csv(transport.send_csv(bytes, &filename).await)
            }
            ExchangeRequest::Reset => Outcome::Reset(transport.send_reset().await),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Text(ExchangeResult<ChatAnswer>),
    Image(ExchangeResult<ImageAnalysis>),
    Csv(ExchangeResult<CsvSummary>),
    Reset(ExchangeResult<ResetAck>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

/// A finished transport call, delivered back to the event loop.
#[derive(Debug)]
pub struct Completion {
    pub exchange: ExchangeId,
    /// Reset count when the exchange started
    pub generation: u64,
    pub outcome: Outcome,
}

pub type CompletionSender = mpsc::UnboundedSender<Completion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<Completion>;

pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

struct InFlight {
    user_entry: EntryId,
    pending: EntryId,
    attachment: Option<Attachment>,
}

pub struct ChatExchangeClient<V> {
    transport: Arc<dyn Transport>,
    view: V,
    conversation: Conversation,
    completions: CompletionSender,
    in_flight: HashMap<ExchangeId, InFlight>,
    next_exchange: u64,
    generation: u64,
}

impl<V: ConversationView> ChatExchangeClient<V> {
    pub fn new(
        transport: Arc<dyn Transport>,
        view: V,
        welcome: impl Into<String>,
        completions: CompletionSender,
    ) -> Self {
        Self {
            transport,
            view,
            conversation: Conversation::new(welcome),
            completions,
            in_flight: HashMap::new(),
            next_exchange: 0,
            generation: 0,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    pub fn pending_count(&self) -> usize {
        self.conversation.pending_count()
    }

    /// Exchanges whose result will still change the conversation
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn submit_text(&mut self, text: &str) -> Option<ExchangeId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let user_entry = self.append(ChatMessage::user(text));
        self.view.composer_cleared();
        let pending = self.append_pending();

        let id = self.start(ExchangeRequest::TextMessage(text.to_string()));
        self.in_flight.insert(
            id,
            InFlight {
                user_entry,
                pending,
                attachment: None,
            },
        );
        Some(id)
    }

    pub fn submit_image(&mut self, file: Option<SelectedFile>) -> Option<ExchangeId> {
        self.submit_upload(UploadKind::Image, file)
    }

    pub fn submit_csv(&mut self, file: Option<SelectedFile>) -> Option<ExchangeId> {
        self.submit_upload(UploadKind::Csv, file)
    }

    fn submit_upload(&mut self, kind: UploadKind, file: Option<SelectedFile>) -> Option<ExchangeId> {
        let file = file?;

        let user_entry = self.append(ChatMessage::user(kind.announcement(&file.name)));
        let pending = self.append_pending();

        let (request, attachment) = match kind {
            UploadKind::Image => {
                let attachment = Attachment::image(file.name.clone(), file.bytes.clone());
                let request = ExchangeRequest::ImageUpload {
                    bytes: file.bytes,
                    filename: file.name,
                };
                (request, Some(attachment))
            }
            UploadKind::Csv => {
                let request = ExchangeRequest::CsvUpload {
                    bytes: file.bytes,
                    filename: file.name,
                };
                (request, None)
            }
        };

        let id = self.start(request);
        self.in_flight.insert(
            id,
            InFlight {
                user_entry,
                pending,
                attachment,
            },
        );
        self.view.file_selection_cleared(kind);
        Some(id)
    }

    /// Truncate to the welcome message right away, then tell the server.
    /// The server's answer is only logged.
    pub fn reset(&mut self) -> ExchangeId {
        self.conversation.reset();
        self.view.conversation_reset(self.conversation.welcome());

        let abandoned = self.in_flight.len();
        self.in_flight.clear();
        self.generation += 1;
        if abandoned > 0 {
            tracing::debug!(abandoned, "reset dropped outstanding exchanges");
        }

        self.start(ExchangeRequest::Reset)
    }

    /// Fold a finished exchange into the conversation.
    pub fn apply(&mut self, completion: Completion) {
        let Completion {
            exchange,
            generation,
            outcome,
        } = completion;

        if let Outcome::Reset(result) = outcome {
            match result {
                Ok(ServerReply::Answered(ack)) => tracing::info!("{}", ack.message),
                Ok(ServerReply::Rejected { error }) => {
                    tracing::warn!(%error, "server refused conversation reset")
                }
                Err(e) => tracing::warn!(error = %e, "conversation reset request failed"),
            }
            return;
        }

        if generation != self.generation {
            tracing::debug!(?exchange, generation, "discarding completion from before reset");
            return;
        }
        let Some(flight) = self.in_flight.remove(&exchange) else {
            tracing::warn!(?exchange, "completion for unknown exchange");
            return;
        };

        self.remove(flight.pending);

        let content = match outcome {
            Outcome::Text(result) => reply_content(result, "text", TEXT_FAILURE_MESSAGE, |a| {
                a.response
            }),
            Outcome::Image(result) => {
                if let (Ok(ServerReply::Answered(_)), Some(attachment)) = (&result, flight.attachment)
                {
                    self.attach(flight.user_entry, attachment);
                }
                reply_content(
                    result,
                    "image",
                    UploadKind::Image.failure_message(),
                    |a| a.analysis,
                )
            }
            Outcome::Csv(result) => {
                if let Ok(ServerReply::Answered(summary)) = &result {
                    tracing::info!(
                        filename = summary.filename.as_deref().unwrap_or("?"),
                        records = summary.records,
                        "CSV file loaded"
                    );
                }
                reply_content(result, "csv", UploadKind::Csv.failure_message(), |s| {
                    s.response
                })
            }
            Outcome::Reset(_) => return,
        };

        self.append(ChatMessage::assistant(content));
    }

    fn start(&mut self, request: ExchangeRequest) -> ExchangeId {
        let exchange = ExchangeId(self.next_exchange);
        self.next_exchange += 1;

        let generation = self.generation;
        let transport = Arc::clone(&self.transport);
        let completions = self.completions.clone();
        tracing::debug!(?exchange, kind = request.label(), "starting exchange");

        tokio::spawn(async move {
            let outcome = request.send(transport.as_ref()).await;
            let completion = Completion {
                exchange,
                generation,
                outcome,
            };
            if completions.send(completion).is_err() {
                tracing::debug!(?exchange, "event loop gone, dropping completion");
            }
        });

        exchange
    }

    fn append(&mut self, message: ChatMessage) -> EntryId {
        let entry = self.conversation.push_message(message);
        self.view.entry_appended(entry);
        entry.id()
    }

    fn append_pending(&mut self) -> EntryId {
        let entry = self.conversation.push_pending();
        self.view.entry_appended(entry);
        entry.id()
    }

    fn remove(&mut self, id: EntryId) {
        if self.conversation.remove(id) {
            self.view.entry_removed(id);
        }
    }

    fn attach(&mut self, id: EntryId, attachment: Attachment) {
        let view_copy = attachment.clone();
        if self.conversation.attach(id, attachment) {
            self.view.attachment_added(id, &view_copy);
        }
    }
}

/// Assistant text for a finished exchange: the answer, the server's own
/// error, or the fixed failure string.
fn reply_content<T>(
    result: ExchangeResult<T>,
    kind: &'static str,
    failure: &str,
    answer: impl FnOnce(T) -> String,
) -> String {
    match result {
        Ok(ServerReply::Answered(reply)) => answer(reply),
        Ok(ServerReply::Rejected { error }) => {
            tracing::info!(kind, %error, "server reported an error");
            format!("Error: {}", error)
        }
        Err(e) => {
            tracing::warn!(kind, error = %e, "exchange failed");
            failure.to_string()
        }
    }
}
