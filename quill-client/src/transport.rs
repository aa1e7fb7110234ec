//! Transport seam for the streaming chat endpoint.

use crate::decoder::{ByteStream, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use quill_core::ChatRequestBody;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// POST the request body and open the chunked response stream.
    async fn stream_chat(&self, body: &ChatRequestBody) -> Result<ByteStream, TransportError>;
}

/// reqwest-backed transport against a running chat server
pub struct HttpChatTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpChatTransport {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn stream_chat(&self, body: &ChatRequestBody) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::new(format!(
                "HTTP error! status: {}",
                response.status()
            )));
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| TransportError::new(e.to_string()))
        })))
    }
}
