use crate::api::{ChatMessage, ChatRequest, Role};
use serde::{Deserialize, Serialize};

/// Content part for multimodal messages (chat-completions wire format)
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrlContent },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImageUrlContent {
    pub url: String,
}

/// Message content - either a plain string or an array of parts
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub r#type: String,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Fragment of a tool call inside a streamed delta. The id and name arrive
/// on the first fragment for an index; argument JSON is split across
/// fragments and must be concatenated.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FunctionCallDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

impl From<&ChatMessage> for Message {
    fn from(msg: &ChatMessage) -> Self {
        // Tool results go out with role "tool" and the originating call id
        if let Some(result) = msg.get_tool_results().first() {
            return Message {
                role: "tool".to_string(),
                content: Some(MessageContent::Text(result.content.clone())),
                tool_calls: None,
                tool_call_id: Some(result.tool_call_id.clone()),
            };
        }

        let tool_calls: Vec<_> = msg
            .get_tool_calls()
            .iter()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                r#type: "function".to_string(),
                function: FunctionCall {
                    name: tc.name.clone(),
                    arguments: serde_json::to_string(&tc.arguments).unwrap_or_default(),
                },
            })
            .collect();

        let parts: Vec<ContentPart> = msg
            .payload
            .content
            .iter()
            .filter_map(|block| match block {
                crate::api::ContentBlock::Text { text } => {
                    Some(ContentPart::Text { text: text.clone() })
                }
                crate::api::ContentBlock::Image { data, mime_type } => {
                    // Inline images travel as data URLs
                    Some(ContentPart::ImageUrl {
                        image_url: ImageUrlContent {
                            url: format!("data:{};base64,{}", mime_type, data),
                        },
                    })
                }
                crate::api::ContentBlock::ImageUrl { url } => Some(ContentPart::ImageUrl {
                    image_url: ImageUrlContent { url: url.clone() },
                }),
                crate::api::ContentBlock::ToolCall(_) | crate::api::ContentBlock::ToolResult(_) => {
                    None // Handled above
                }
            })
            .collect();

        let content = if parts.is_empty() {
            None
        } else if parts.len() == 1 {
            // A single text part can use the simple string form
            if let ContentPart::Text { text } = &parts[0] {
                Some(MessageContent::Text(text.clone()))
            } else {
                Some(MessageContent::Parts(parts))
            }
        } else {
            Some(MessageContent::Parts(parts))
        };

        Message {
            role: role_str(msg.role).to_string(),
            content,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub r#type: String,
    pub function: FunctionDefinition,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

impl From<&crate::api::ToolDefinition> for Tool {
    fn from(def: &crate::api::ToolDefinition) -> Self {
        Tool {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: serde_json::to_value(&def.input_schema)
                    .unwrap_or(serde_json::Value::Null),
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatCompletionRequest {
    pub fn from_request(model: String, request: &ChatRequest, stream: bool) -> Self {
        let tools = request
            .tools
            .as_ref()
            .map(|tools| tools.iter().map(|t| t.into()).collect());

        ChatCompletionRequest {
            model,
            messages: request.messages.iter().map(|m| m.into()).collect(),
            stream: if stream { Some(true) } else { None },
            tools,
            temperature: request.temperature,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
}

impl From<ChatCompletionResponse> for ChatMessage {
    fn from(response: ChatCompletionResponse) -> Self {
        let mut content = Vec::new();

        if let Some(choice) = response.choices.first() {
            if let Some(text) = &choice.message.content {
                if !text.is_empty() {
                    content.push(crate::api::ContentBlock::Text { text: text.clone() });
                }
            }

            if let Some(tool_calls) = &choice.message.tool_calls {
                for tc in tool_calls {
                    let arguments = serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(serde_json::Value::Null);

                    content.push(crate::api::ContentBlock::ToolCall(crate::api::ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments,
                    }));
                }
            }
        }

        ChatMessage::assistant(crate::ChatPayload::new(content))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatCompletionChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatCompletionChunkChoice {
    pub index: u32,
    pub delta: ChatCompletionChunkDelta,
    pub finish_reason: Option<String>,
}

/// Error object OpenRouter can interleave into the SSE stream
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StreamError {
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatCompletionChunkChoice>,
    #[serde(default)]
    pub error: Option<StreamError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatPayload, ToolResult};

    #[test]
    fn test_tool_result_message_uses_tool_role() {
        let msg = ChatMessage::user(ChatPayload {
            content: vec![crate::api::ContentBlock::ToolResult(ToolResult {
                tool_call_id: "call_1".to_string(),
                content: r#"{"ok":true}"#.to_string(),
            })],
        });

        let wire: Message = (&msg).into();
        assert_eq!(wire.role, "tool");
        assert_eq!(wire.tool_call_id.as_deref(), Some("call_1"));
        assert!(matches!(wire.content, Some(MessageContent::Text(_))));
    }

    #[test]
    fn test_attachment_becomes_image_url_part() {
        let msg = ChatMessage::user(ChatPayload::new(vec![
            crate::api::ContentBlock::Text {
                text: "what is this?".to_string(),
            },
            crate::api::ContentBlock::ImageUrl {
                url: "https://res.cloudinary.com/demo/image/upload/cat.jpg".to_string(),
            },
        ]));

        let wire: Message = (&msg).into();
        match wire.content {
            Some(MessageContent::Parts(parts)) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], ContentPart::ImageUrl { .. }));
            }
            other => panic!("expected parts, got {:?}", other),
        }
    }

    #[test]
    fn test_response_with_tool_calls() {
        let json = r#"{
            "id": "gen-1",
            "model": "meta-llama/llama-3.1-405b-instruct",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "searchWeb", "arguments": "{\"query\":\"rust\"}"}
                    }]
                }
            }]
        }"#;

        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let msg: ChatMessage = response.into();
        let calls = msg.get_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "searchWeb");
        assert_eq!(calls[0].arguments["query"], "rust");
    }

    #[test]
    fn test_chunk_with_stream_error() {
        let json = r#"{"error": {"message": "Rate limit exceeded", "code": 429}}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        assert!(chunk.error.is_some());
        assert!(chunk.choices.is_empty());
    }
}
