//! Bounded model-call loop with tool execution.
//!
//! Runs at most [`MAX_TOOL_STEPS`] reasoning/tool rounds per request and
//! flattens the provider's chunk stream plus tool lifecycle into a single
//! ordered [`StreamEvent`] sequence. Mid-stream provider failures become
//! `Error` events; the loop keeps consuming rather than aborting.

use crate::error::{classify, RawFailure, Service};
use crate::event::StreamEvent;
use futures::stream::Stream;
use futures::StreamExt;
use llm::api::ToolCall;
use llm::{ChatMessage, ChatModel, ChatPayload, ChatRequest, ToolRegistry};
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const MAX_TOOL_STEPS: usize = 3;
pub const TEMPERATURE: f32 = 0.7;

pub struct ToolOrchestrator {
    tools: Arc<ToolRegistry>,
    max_steps: usize,
    service: Service,
}

impl ToolOrchestrator {
    /// `service` attributes mid-stream provider failures during
    /// classification.
    pub fn new(tools: Arc<ToolRegistry>, service: Service) -> Self {
        ToolOrchestrator {
            tools,
            max_steps: MAX_TOOL_STEPS,
            service,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Drive the loop to completion, yielding events in production order.
    pub fn run(
        &self,
        model: Arc<dyn ChatModel + Send + Sync>,
        messages: Vec<ChatMessage>,
    ) -> impl Stream<Item = StreamEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let tools = self.tools.clone();
        let max_steps = self.max_steps;
        let service = self.service;
        let mut working = messages;

        tokio::spawn(async move {
            for round in 0..max_steps {
                let request =
                    ChatRequest::with_tools(working.iter(), tools.get_all_definitions())
                        .with_temperature(TEMPERATURE);

                let stream = match model.stream_chat(&request).await {
                    Ok(s) => s,
                    Err(e) => {
                        let failure =
                            RawFailure::from_error(&e).with_service_hint(service);
                        let _ = tx.send(StreamEvent::Error(classify(&failure)));
                        break;
                    }
                };

                // Forward text as it arrives; accumulate blocks so tool
                // calls can be detected once the round's stream ends.
                let mut accumulated = ChatMessage::assistant(ChatPayload::default());
                tokio::pin!(stream);

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) => {
                            let text = chunk.get_text();
                            if !text.is_empty() {
                                let _ = tx.send(StreamEvent::TextDelta(text));
                            }
                            accumulated.payload.content.extend(chunk.payload.content);
                        }
                        Err(e) => {
                            let failure =
                                RawFailure::from_error(&e).with_service_hint(service);
                            let _ = tx.send(StreamEvent::Error(classify(&failure)));
                        }
                    }
                }

                let tool_calls: Vec<ToolCall> = accumulated
                    .get_tool_calls()
                    .into_iter()
                    .cloned()
                    .collect();
                working.push(accumulated);

                if tool_calls.is_empty() {
                    break;
                }

                for call in tool_calls {
                    let _ = tx.send(StreamEvent::ToolStart {
                        tool: call.name.clone(),
                    });

                    let payload = tools
                        .call(&call.name, call.arguments.clone())
                        .await
                        .unwrap_or_else(|e| {
                            serde_json::json!({ "error": format!("{:#}", e) }).to_string()
                        });

                    let _ = tx.send(StreamEvent::ToolResult {
                        tool: call.name.clone(),
                        payload: payload.clone(),
                    });

                    working.push(ChatMessage::user(ChatPayload::tool_result(
                        call.id.clone(),
                        payload,
                    )));
                }

                if round == max_steps - 1 {
                    tracing::warn!(
                        "Tool loop reached max steps ({}), stopping",
                        max_steps
                    );
                }
            }
        });

        UnboundedReceiverStream::new(rx)
    }
}
