pub mod config;
pub mod conversation;
pub mod exchange;
pub mod state;
pub mod transport;
pub mod upload;

// Re-export main types for convenience
pub use config::Config;
pub use conversation::{Conversation, Entry, EntryId};
pub use exchange::{
    completion_channel, ChatExchangeClient, Completion, CompletionReceiver, CompletionSender,
    ConversationView, ExchangeId, ExchangeRequest, Outcome,
};
pub use state::{Attachment, ChatMessage, ChatRole};
pub use transport::{HttpTransport, ServerReply, Transport, TransportError};
pub use upload::{SelectedFile, UploadKind};
