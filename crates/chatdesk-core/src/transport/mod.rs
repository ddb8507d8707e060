//! Backend transport seam
//!
//! One single-shot request/response call per exchange. Any implementation
//! meeting this contract can stand in for [`HttpTransport`].

pub mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

pub use http::HttpTransport;

/// Transport-level failure: the call never produced a usable reply.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("could not decode reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A reply the server actually sent. The backend embeds validation and
/// processing errors in an `error` field instead of failing the call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ServerReply<T> {
    Rejected { error: String },
    Answered(T),
}

pub type ExchangeResult<T> = Result<ServerReply<T>, TransportError>;

/// Decode a reply body. An `error` field wins over everything else.
pub fn decode_reply<T: DeserializeOwned>(body: &str) -> ExchangeResult<T> {
    Ok(serde_json::from_str(body)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatAnswer {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageAnalysis {
    pub analysis: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CsvSummary {
    pub response: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub records: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResetAck {
    pub message: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, message: &str) -> ExchangeResult<ChatAnswer>;

    async fn send_image(&self, bytes: Vec<u8>, filename: &str) -> ExchangeResult<ImageAnalysis>;

    async fn send_csv(&self, bytes: Vec<u8>, filename: &str) -> ExchangeResult<CsvSummary>;

    async fn send_reset(&self) -> ExchangeResult<ResetAck>;
}
