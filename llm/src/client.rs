use futures::stream::Stream;
use futures::{
    StreamExt,
    stream::{self},
};
use reqwest::header::HeaderMap;
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt::Debug, pin::Pin};
use tracing::{Level, event, instrument};

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
}

pub type BoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Line-buffering state threaded through the chunk stream
struct StreamState {
    buffer: String,
    failed: bool,
}

impl Client {
    pub fn default() -> Self {
        Client {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_headers(headers: HeaderMap) -> Self {
        Client {
            client: reqwest::Client::builder()
                .default_headers(headers)
                .build()
                .expect("Failed to build headers"),
        }
    }

    #[instrument(level = "trace", skip(self, request), fields(json_request = serde_json::to_string(request).unwrap()))]
    pub async fn post<U, S, T>(&self, url: U, request: &S) -> anyhow::Result<T>
    where
        U: reqwest::IntoUrl + std::fmt::Debug,
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(url).json(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(anyhow::anyhow!(
                "Request failed with status {}: {}",
                status,
                error_body
            ));
        }
        let text = response.text().await?;
        event!(Level::TRACE, response = text);

        Ok(serde_json::from_str::<T>(&text)?)
    }

    /// POST a request and stream the response line-by-line.
    ///
    /// `process` extracts the JSON payload from one raw line (e.g. strips an
    /// SSE "data: " prefix) or returns None to skip the line. Payloads that
    /// fail to deserialize are skipped; a transport failure mid-stream is
    /// surfaced as a single `Err` item and ends the stream.
    #[instrument(level = "trace", skip(self, request, process), fields(json_request = serde_json::to_string(request).unwrap()))]
    pub async fn post_stream<U, S, F, T>(
        &self,
        url: U,
        request: &S,
        process: F,
    ) -> anyhow::Result<BoxedStream<anyhow::Result<T>>>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned + Send + 'static,
        F: Fn(&str) -> Option<&str> + 'static + Send,
    {
        let response = self.client.post(url).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(anyhow::anyhow!(
                "Request failed with status {}: {}",
                status,
                error_body
            ));
        }

        let bytes = response.bytes_stream();

        // Use scan to maintain the line buffer across chunks
        let state = StreamState {
            buffer: String::new(),
            failed: false,
        };
        let buffered_stream = bytes.scan(state, move |state, chunk| {
            if state.failed {
                return futures::future::ready(None);
            }
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    state.failed = true;
                    return futures::future::ready(Some(vec![Err(anyhow::Error::new(e))]));
                }
            };

            state.buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete lines (ending with \n)
            let mut messages: Vec<anyhow::Result<T>> = vec![];
            let mut last_newline_pos = 0;

            for (idx, _) in state.buffer.match_indices('\n') {
                let line = &state.buffer[last_newline_pos..idx];
                last_newline_pos = idx + 1;

                if let Some(processed) = process(line) {
                    if !processed.trim().is_empty() {
                        match serde_json::from_str::<T>(processed) {
                            Ok(parsed) => messages.push(Ok(parsed)),
                            Err(e) => {
                                tracing::warn!("Failed to parse stream line {:?}: {}", processed, e);
                            }
                        }
                    }
                }
            }

            // Keep the incomplete tail in the buffer
            state.buffer = state.buffer[last_newline_pos..].to_string();

            futures::future::ready(Some(messages))
        });

        Ok(Box::pin(
            buffered_stream.flat_map(|messages| stream::iter(messages)),
        ))
    }
}
