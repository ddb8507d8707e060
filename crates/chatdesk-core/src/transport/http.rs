use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    decode_reply, ChatAnswer, CsvSummary, ExchangeResult, ImageAnalysis, ResetAck, Transport,
};
use crate::upload::UploadKind;

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Talks to the chat backend over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The backend answers validation errors with a 4xx status and a JSON
    /// `error` body, so the body is decoded whatever the status.
    async fn read_reply<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::debug!(%status, "backend returned non-success status");
        }
        decode_reply(&body)
    }

    async fn upload<T: DeserializeOwned>(
        &self,
        kind: UploadKind,
        bytes: Vec<u8>,
        filename: &str,
    ) -> ExchangeResult<T> {
        let url = self.url(kind.endpoint());
        let size = bytes.len();
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()));

        tracing::debug!(kind = kind.as_str(), filename, size, %url, "uploading file");
        let response = self.client.post(&url).multipart(form).send().await?;
        self.read_reply(response).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_text(&self, message: &str) -> ExchangeResult<ChatAnswer> {
        let url = self.url("/chat");
        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;
        self.read_reply(response).await
    }

    async fn send_image(&self, bytes: Vec<u8>, filename: &str) -> ExchangeResult<ImageAnalysis> {
        self.upload(UploadKind::Image, bytes, filename).await
    }

    async fn send_csv(&self, bytes: Vec<u8>, filename: &str) -> ExchangeResult<CsvSummary> {
        self.upload(UploadKind::Csv, bytes, filename).await
    }

    async fn send_reset(&self) -> ExchangeResult<ResetAck> {
        let response = self.client.post(self.url("/reset")).send().await?;
        self.read_reply(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let transport = HttpTransport::new("http://localhost:5000/");
        assert_eq!(transport.base_url(), "http://localhost:5000");
        assert_eq!(transport.url("/chat"), "http://localhost:5000/chat");
        assert_eq!(
            transport.url(UploadKind::Csv.endpoint()),
            "http://localhost:5000/upload-csv"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_failure() {
        // Port 9 (discard) on localhost is closed in test environments
        let transport = HttpTransport::new("http://127.0.0.1:9");
        let result = transport.send_reset().await;
        assert!(matches!(result, Err(crate::transport::TransportError::Network(_))));
    }
}
