//! Wire types for `POST /api/chat`.

use llm::api::{ContentBlock, Role};
use llm::{ChatMessage, ChatPayload};
use serde::{Deserialize, Serialize};

/// Upstream service discriminator carried in the request body
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceSelector {
    OpenRouter,
    Gemini,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    Text,
    Image,
}

/// One content part of a normalized message. Image parts carry both the
/// hosted attachment URL and the accompanying query text.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPart {
    #[serde(rename = "type")]
    pub kind: PartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub role: Role,
    pub content: Vec<NormalizedPart>,
}

/// Request body accepted by the streaming chat endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub messages: Vec<NormalizedMessage>,
    #[serde(default)]
    pub is_web_search: bool,
    /// Encrypted Gemini API key supplied by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub service: ServiceSelector,
}

impl From<&NormalizedMessage> for ChatMessage {
    fn from(msg: &NormalizedMessage) -> Self {
        let mut blocks = Vec::new();
        for part in &msg.content {
            if !part.text.is_empty() {
                blocks.push(ContentBlock::Text {
                    text: part.text.clone(),
                });
            }
            if part.kind == PartKind::Image {
                if let Some(url) = &part.image {
                    blocks.push(ContentBlock::ImageUrl { url: url.clone() });
                }
            }
        }
        ChatMessage::new(msg.role, ChatPayload::new(blocks))
    }
}

impl NormalizedMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        NormalizedMessage {
            role,
            content: vec![NormalizedPart {
                kind: PartKind::Text,
                mime_type: Some("text/plain".to_string()),
                text: text.into(),
                image: None,
            }],
        }
    }

    pub fn with_attachment(role: Role, text: impl Into<String>, url: impl Into<String>) -> Self {
        NormalizedMessage {
            role,
            content: vec![NormalizedPart {
                kind: PartKind::Image,
                mime_type: Some("image/jpeg".to_string()),
                text: text.into(),
                image: Some(url.into()),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_deserializes_wire_shape() {
        let json = r#"{
            "messages": [
                {"role": "user", "content": [{"type": "text", "mimeType": "text/plain", "text": "Hello"}]}
            ],
            "isWebSearch": true,
            "geminiApiKey": "encrypted-blob",
            "model": "meta-llama/llama-3.1-405b-instruct",
            "service": "openrouter"
        }"#;

        let body: ChatRequestBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.service, ServiceSelector::OpenRouter);
        assert!(body.is_web_search);
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].content[0].text, "Hello");
    }

    #[test]
    fn test_missing_optionals_default() {
        let json = r#"{
            "messages": [],
            "model": "google/gemini-2.0-flash",
            "service": "gemini"
        }"#;

        let body: ChatRequestBody = serde_json::from_str(json).unwrap();
        assert!(!body.is_web_search);
        assert!(body.gemini_api_key.is_none());
    }

    #[test]
    fn test_attachment_part_yields_text_and_url_blocks() {
        let msg = NormalizedMessage::with_attachment(
            Role::User,
            "what is in this picture?",
            "https://res.cloudinary.com/demo/image/upload/cat.jpg",
        );
        let chat: ChatMessage = (&msg).into();
        assert_eq!(chat.payload.content.len(), 2);
        assert!(matches!(chat.payload.content[0], ContentBlock::Text { .. }));
        assert!(matches!(
            chat.payload.content[1],
            ContentBlock::ImageUrl { .. }
        ));
    }
}
