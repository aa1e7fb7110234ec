use super::api::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};
use crate::api::{ChatChunk, ContentBlock, ToolCall};
use crate::client::Client;
use crate::ChatModel;
use crate::ChatStream;
use crate::{ChatMessage, ChatPayload, ChatRequest};
use async_trait::async_trait;
use futures::{stream, StreamExt};

#[derive(Clone)]
pub struct OpenRouterChatModel {
    client: Client,
    base_url: String,
    model_name: String,
}

/// Tool-call fragments accumulated across streamed deltas, keyed by index
#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Default)]
struct DeltaState {
    pending: Vec<PendingToolCall>,
}

impl DeltaState {
    fn merge(&mut self, delta: &super::api::ToolCallDelta) {
        if self.pending.len() <= delta.index {
            self.pending
                .resize_with(delta.index + 1, PendingToolCall::default);
        }
        let slot = &mut self.pending[delta.index];
        if let Some(id) = &delta.id {
            slot.id = id.clone();
        }
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                slot.name = name.clone();
            }
            if let Some(arguments) = &function.arguments {
                slot.arguments.push_str(arguments);
            }
        }
    }

    fn flush(&mut self) -> Option<ChatChunk> {
        if self.pending.is_empty() {
            return None;
        }
        let blocks: Vec<ContentBlock> = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|call| {
                ContentBlock::ToolCall(ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments: serde_json::from_str(&call.arguments)
                        .unwrap_or(serde_json::Value::Null),
                })
            })
            .collect();
        Some(ChatChunk::assistant(ChatPayload::new(blocks)))
    }
}

impl OpenRouterChatModel {
    pub fn new(client: Client, base_url: String, model_name: String) -> Self {
        OpenRouterChatModel {
            client,
            base_url,
            model_name,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatModel for OpenRouterChatModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage> {
        let api_request =
            ChatCompletionRequest::from_request(self.model_name.clone(), request, false);
        let response: ChatCompletionResponse =
            self.client.post(self.chat_url(), &api_request).await?;
        Ok(response.into())
    }

    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        let api_request =
            ChatCompletionRequest::from_request(self.model_name.clone(), request, true);

        let raw = self
            .client
            .post_stream::<_, _, _, ChatCompletionChunk>(self.chat_url(), &api_request, |m| {
                // SSE framing: "data: {...}" lines, terminated by "data: [DONE]"
                let trimmed = m.trim();
                match trimmed.strip_prefix("data: ") {
                    Some("[DONE]") => None,
                    Some(json_str) => Some(json_str),
                    None => None,
                }
            })
            .await?;

        // Text deltas pass straight through; tool-call fragments accumulate
        // per index and are emitted as one chunk when the provider signals
        // finish_reason "tool_calls".
        let chat_stream = raw
            .scan(DeltaState::default(), |state, item| {
                let mut out: Vec<anyhow::Result<ChatChunk>> = Vec::new();
                match item {
                    Err(e) => out.push(Err(e)),
                    Ok(chunk) => {
                        if let Some(error) = chunk.error {
                            out.push(Err(anyhow::anyhow!("{}", error.message)));
                        } else if let Some(choice) = chunk.choices.first() {
                            if let Some(text) = &choice.delta.content {
                                if !text.is_empty() {
                                    out.push(Ok(ChatChunk::assistant(ChatPayload::text(
                                        text.clone(),
                                    ))));
                                }
                            }
                            if let Some(deltas) = &choice.delta.tool_calls {
                                for delta in deltas {
                                    state.merge(delta);
                                }
                            }
                            if choice.finish_reason.as_deref() == Some("tool_calls") {
                                if let Some(calls) = state.flush() {
                                    out.push(Ok(calls));
                                }
                            }
                        }
                    }
                }
                futures::future::ready(Some(out))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(chat_stream))
    }
}
