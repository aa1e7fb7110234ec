//! HTTP round-trip: a client decoder reading from a live server.

use async_trait::async_trait;
use futures::stream;
use llm::{ChatChunk, ChatMessage, ChatModel, ChatPayload, ChatRequest, ChatStream};
use quill_client::{ChatTransport, HttpChatTransport, StreamDecoder};
use quill_core::assets::AssetHost;
use quill_core::tools::{SearchClient, SearchResponse};
use quill_core::{ChatHandler, ChatRequestBody, CredentialStore, NormalizedMessage, ServiceSelector};
use std::sync::Arc;

struct OpenRouterOnly;

impl CredentialStore for OpenRouterOnly {
    fn api_key(&self, service: ServiceSelector) -> Option<String> {
        match service {
            ServiceSelector::OpenRouter => Some("sk-or-v1-test".to_string()),
            ServiceSelector::Gemini => None,
        }
    }
}

struct NoKeys;

impl CredentialStore for NoKeys {
    fn api_key(&self, _service: ServiceSelector) -> Option<String> {
        None
    }
}

struct StubSearch;

#[async_trait]
impl SearchClient for StubSearch {
    async fn search(&self, _query: &str) -> anyhow::Result<SearchResponse> {
        Ok(SearchResponse::default())
    }
}

struct StubAssets;

#[async_trait]
impl AssetHost for StubAssets {
    async fn upload(&self, _bytes: Vec<u8>, _filename: &str) -> anyhow::Result<String> {
        Ok("https://example.com/asset.png".to_string())
    }
}

struct GreetingModel;

#[async_trait]
impl ChatModel for GreetingModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, _request: &ChatRequest) -> anyhow::Result<ChatMessage> {
        unreachable!()
    }

    async fn stream_chat(&self, _request: &ChatRequest) -> anyhow::Result<ChatStream> {
        Ok(Box::pin(stream::iter(vec![
            Ok(ChatChunk::assistant(ChatPayload::text("Hi "))),
            Ok(ChatChunk::assistant(ChatPayload::text("the"))),
            Ok(ChatChunk::assistant(ChatPayload::text("re"))),
        ])))
    }
}

fn body(text: &str) -> ChatRequestBody {
    ChatRequestBody {
        messages: vec![NormalizedMessage::text(llm::api::Role::User, text)],
        is_web_search: false,
        gemini_api_key: None,
        model: "openai/gpt-4o".to_string(),
        service: ServiceSelector::OpenRouter,
    }
}

#[tokio::test]
async fn greeting_streams_over_http() {
    let handler = Arc::new(
        ChatHandler::new(
            Arc::new(OpenRouterOnly),
            Arc::new(StubSearch),
            Arc::new(StubAssets),
        )
        .with_resolver(|_, _| Ok(Arc::new(GreetingModel) as _)),
    );

    let handle = quill_server::start_server_on("127.0.0.1", 0, handler)
        .await
        .unwrap();

    let transport = HttpChatTransport::new(handle.url());
    let stream = transport.stream_chat(&body("Hello")).await.unwrap();
    let text = StreamDecoder::new(stream).read_to_end(|_| {}).await.unwrap();

    assert_eq!(text, "Hi there");
    handle.stop();
}

#[tokio::test]
async fn missing_credential_is_one_error_tag_over_http() {
    let handler = Arc::new(
        ChatHandler::new(Arc::new(NoKeys), Arc::new(StubSearch), Arc::new(StubAssets))
            .with_resolver(|_, _| panic!("no model call may happen")),
    );

    let handle = quill_server::start_server_on("127.0.0.1", 0, handler)
        .await
        .unwrap();

    let transport = HttpChatTransport::new(handle.url());
    let stream = transport.stream_chat(&body("Hello")).await.unwrap();
    let text = StreamDecoder::new(stream).read_to_end(|_| {}).await.unwrap();

    assert_eq!(
        text,
        "<t3-error>Authentication: Please log in and configure your OpenRouter API key</t3-error>"
    );
    handle.stop();
}
