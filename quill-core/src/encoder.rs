//! The streaming request handler.
//!
//! One request moves through `Validating -> Dispatching -> Streaming ->
//! Closed`, with `ErrorClosed` reachable from any state. Every failure is
//! folded into the response body as an in-band tag: the handler never
//! produces a transport-level error status for model, tool, or credential
//! failures, so the client needs no separate error path for this endpoint.
//!
//! A client that abandons the response mid-stream is not observed here;
//! the upstream provider keeps being consumed until it completes. The
//! bounded tool loop and provider timeouts cap what that can cost.

use crate::adapter::{decrypt_gemini_key, CredentialStore, MISSING_OPENROUTER_KEY};
use crate::assets::AssetHost;
use crate::error::ClassifiedError;
use crate::event::StreamEvent;
use crate::orchestrator::ToolOrchestrator;
use crate::prompt::build_system_prompt;
use crate::request::{ChatRequestBody, ServiceSelector};
use crate::tags;
use crate::tools::{
    build_registry, GeminiImageGenerator, GenerateImageTool, ImageGenerator, SearchClient,
    SearchWebTool, GENERATE_IMAGE, SEARCH_WEB,
};
use bytes::Bytes;
use futures::stream::{self, Stream};
use futures::StreamExt;
use llm::{ChatMessage, ChatModel, ChatPayload};
use std::pin::Pin;
use std::sync::Arc;

pub type ResponseStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

type ModelResolver = dyn Fn(&ChatRequestBody, &dyn CredentialStore) -> Result<Arc<dyn ChatModel + Send + Sync>, ClassifiedError>
    + Send
    + Sync;

pub struct ChatHandler {
    credentials: Arc<dyn CredentialStore>,
    search: Arc<dyn SearchClient>,
    assets: Arc<dyn AssetHost>,
    resolver: Box<ModelResolver>,
    image_generator: Option<Arc<dyn ImageGenerator>>,
}

impl ChatHandler {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        search: Arc<dyn SearchClient>,
        assets: Arc<dyn AssetHost>,
    ) -> Self {
        ChatHandler {
            credentials,
            search,
            assets,
            resolver: Box::new(crate::adapter::resolve_model),
            image_generator: None,
        }
    }

    /// Replace the provider dispatch (seam for tests and proxies)
    pub fn with_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&ChatRequestBody, &dyn CredentialStore) -> Result<Arc<dyn ChatModel + Send + Sync>, ClassifiedError>
            + Send
            + Sync
            + 'static,
    {
        self.resolver = Box::new(resolver);
        self
    }

    /// Replace the image generator used by the generateImage tool
    pub fn with_image_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.image_generator = Some(generator);
        self
    }

    /// Handle one request, producing the chunked response body.
    pub fn respond(&self, body: ChatRequestBody) -> ResponseStream {
        // Validating
        if body.messages.is_empty() {
            return error_body(&ClassifiedError::validation("Messages array is required"));
        }
        if body.service == ServiceSelector::OpenRouter
            && self
                .credentials
                .api_key(ServiceSelector::OpenRouter)
                .is_none()
        {
            return error_body(&ClassifiedError::authentication(MISSING_OPENROUTER_KEY));
        }

        // Dispatching
        let model = match (self.resolver)(&body, &*self.credentials) {
            Ok(model) => model,
            Err(e) => return error_body(&e),
        };

        let user_name = self
            .credentials
            .user_name()
            .unwrap_or_else(|| "User".to_string());
        let mut messages = vec![ChatMessage::system(ChatPayload::text(
            build_system_prompt(&user_name),
        ))];
        messages.extend(body.messages.iter().map(ChatMessage::from));

        let gemini_key = decrypt_gemini_key(&body);
        let generator = self
            .image_generator
            .clone()
            .unwrap_or_else(|| Arc::new(GeminiImageGenerator::new(gemini_key.clone())));
        let tools = build_registry(
            GenerateImageTool::new(gemini_key, generator, self.assets.clone()),
            SearchWebTool::new(body.is_web_search, self.search.clone()),
        );

        // Streaming
        let orchestrator = ToolOrchestrator::new(Arc::new(tools), body.service.into());
        let events = orchestrator.run(model, messages);
        Box::pin(encode_events(events))
    }
}

/// A one-tag body for failures before streaming begins. Still a normal
/// chunked response; the decoder always has something to parse.
fn error_body(error: &ClassifiedError) -> ResponseStream {
    let tag = error.error_tag();
    Box::pin(stream::once(async move { Bytes::from(tag) }))
}

fn processing_message(tool: &str) -> &'static str {
    match tool {
        SEARCH_WEB => "Searching web...",
        GENERATE_IMAGE => "Generating image...",
        _ => "Processing...",
    }
}

/// Encode the ordered event sequence as response text.
///
/// Text deltas pass through verbatim. A tool start opens a processing tag;
/// the matching tool result emits a single `\r` clear marker, and only
/// while a processing tag is outstanding - surplus tool results are
/// no-ops. Errors become newline-padded error tags.
pub fn encode_events(
    events: impl Stream<Item = StreamEvent> + Send + 'static,
) -> impl Stream<Item = Bytes> + Send {
    events
        .scan(false, |pending_tool, event| {
            let out: Option<Bytes> = match event {
                StreamEvent::TextDelta(text) => Some(Bytes::from(text)),
                StreamEvent::ToolStart { tool } => {
                    *pending_tool = true;
                    Some(Bytes::from(format!(
                        "\n\n{}\n\n",
                        tags::info_tag(processing_message(&tool))
                    )))
                }
                StreamEvent::ToolResult { .. } => {
                    if *pending_tool {
                        *pending_tool = false;
                        Some(Bytes::from_static(b"\r"))
                    } else {
                        None
                    }
                }
                StreamEvent::Error(error) => {
                    Some(Bytes::from(format!("\n\n{}\n\n", error.error_tag())))
                }
            };
            futures::future::ready(Some(out))
        })
        .filter_map(futures::future::ready)
}
