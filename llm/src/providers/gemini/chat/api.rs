use serde::{Deserialize, Serialize};

use crate::{ChatPayload, ChatRequest};

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl TryFrom<crate::api::Role> for Role {
    type Error = anyhow::Error;

    fn try_from(value: crate::api::Role) -> Result<Self, Self::Error> {
        match value {
            crate::api::Role::User => Ok(Role::User),
            crate::api::Role::Assistant => Ok(Role::Model),
            crate::api::Role::System => Err(anyhow::anyhow!(
                "Gemini does not support system messages directly."
            )),
        }
    }
}

impl From<Role> for crate::api::Role {
    fn from(value: Role) -> Self {
        match value {
            Role::User => crate::api::Role::User,
            Role::Model => crate::api::Role::Assistant,
        }
    }
}

/// Gemini inline data for images (base64-encoded)
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub(crate) mime_type: String,
    pub(crate) data: String,
}

/// Reference to already-hosted media
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) mime_type: Option<String>,
    pub(crate) file_uri: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GeminiFunctionCall {
    pub(crate) name: String,
    pub(crate) args: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GeminiFunctionResponse {
    pub(crate) name: String,
    pub(crate) response: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum PartType {
    Text(String),
    InlineData(InlineData),
    FileData(FileData),
    FunctionCall(GeminiFunctionCall),
    FunctionResponse(GeminiFunctionResponse),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) thought: Option<bool>,

    #[serde(flatten)]
    pub(crate) data: PartType,
}

impl Part {
    pub fn new_text(text: String) -> Self {
        Part {
            thought: None,
            data: PartType::Text(text),
        }
    }

    fn new(data: PartType) -> Self {
        Part {
            thought: None,
            data,
        }
    }
}

/// Gemini does not issue tool-call ids; synthesize them from the function
/// name so results can be routed back.
const CALL_ID_PREFIX: &str = "gemini_";

impl From<&Part> for Option<crate::api::ContentBlock> {
    fn from(part: &Part) -> Self {
        match &part.data {
            PartType::Text(t) => Some(crate::api::ContentBlock::Text { text: t.clone() }),
            PartType::InlineData(data) => {
                if data.mime_type.starts_with("image/") {
                    Some(crate::api::ContentBlock::Image {
                        data: data.data.clone(),
                        mime_type: data.mime_type.clone(),
                    })
                } else {
                    // Unknown media type, skip
                    None
                }
            }
            PartType::FileData(data) => Some(crate::api::ContentBlock::ImageUrl {
                url: data.file_uri.clone(),
            }),
            PartType::FunctionCall(fc) => Some(crate::api::ContentBlock::ToolCall(
                crate::api::ToolCall {
                    id: format!("{}{}", CALL_ID_PREFIX, fc.name),
                    name: fc.name.clone(),
                    arguments: fc.args.clone(),
                },
            )),
            PartType::FunctionResponse(fr) => Some(crate::api::ContentBlock::ToolResult(
                crate::api::ToolResult {
                    tool_call_id: format!("{}{}", CALL_ID_PREFIX, fr.name),
                    content: serde_json::to_string(&fr.response).unwrap_or_default(),
                },
            )),
        }
    }
}

fn content_block_to_part(block: &crate::api::ContentBlock) -> Part {
    match block {
        crate::api::ContentBlock::Text { text } => Part::new_text(text.clone()),
        crate::api::ContentBlock::Image { data, mime_type } => Part::new(PartType::InlineData(
            InlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            },
        )),
        crate::api::ContentBlock::ImageUrl { url } => Part::new(PartType::FileData(FileData {
            mime_type: None,
            file_uri: url.clone(),
        })),
        crate::api::ContentBlock::ToolCall(call) => {
            Part::new(PartType::FunctionCall(GeminiFunctionCall {
                name: call.name.clone(),
                args: call.arguments.clone(),
            }))
        }
        crate::api::ContentBlock::ToolResult(result) => {
            // function_response.response must be an object; wrap anything else
            let response = match serde_json::from_str::<serde_json::Value>(&result.content) {
                Ok(v) if v.is_object() => v,
                Ok(v) => serde_json::json!({ "result": v }),
                Err(_) => serde_json::json!({ "result": result.content }),
            };
            let name = result
                .tool_call_id
                .strip_prefix(CALL_ID_PREFIX)
                .unwrap_or(&result.tool_call_id)
                .to_string();
            Part::new(PartType::FunctionResponse(GeminiFunctionResponse {
                name,
                response,
            }))
        }
    }
}

// Gemini representation of messages.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Content {
    pub(crate) role: Role,
    pub(crate) parts: Vec<Part>,
}

impl From<&Content> for crate::ChatChunk {
    fn from(content: &Content) -> Self {
        let blocks: Vec<crate::api::ContentBlock> = content
            .parts
            .iter()
            .filter_map(Option::<crate::api::ContentBlock>::from)
            .collect();

        crate::ChatChunk::new(content.role.into(), ChatPayload::new(blocks))
    }
}

impl From<Content> for crate::ChatMessage {
    fn from(content: Content) -> Self {
        crate::ChatChunk::from(&content).into()
    }
}

impl From<&crate::ChatMessage> for Content {
    fn from(msg: &crate::ChatMessage) -> Self {
        Content {
            role: msg.role.try_into().unwrap_or(Role::User),
            parts: msg.payload.content.iter().map(content_block_to_part).collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GeminiFunctionDeclaration {
    pub(crate) name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    pub(crate) parameters: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiTool {
    pub(crate) function_declarations: Vec<GeminiFunctionDeclaration>,
}

/// Keys the Gemini API rejects in JSON Schema
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "$schema",
    "$id",
    "$anchor",
    "$dynamicRef",
    "$dynamicAnchor",
    "$vocabulary",
    "$comment",
];

/// Sanitize a JSON Schema for Gemini API compatibility.
///
/// Gemini rejects advanced JSON Schema features ($schema, $ref, $defs, ...).
/// Unsupported keys are removed recursively; $ref references are resolved by
/// inlining the referenced definition.
fn sanitize_schema_for_gemini(schema: serde_json::Value) -> serde_json::Value {
    // $defs is draft 2019-09+, "definitions" is draft 4-7
    let defs = schema
        .as_object()
        .and_then(|obj| obj.get("$defs").or_else(|| obj.get("definitions")))
        .and_then(|d| d.as_object())
        .cloned();

    sanitize_schema_recursive(schema, defs.as_ref())
}

fn sanitize_schema_recursive(
    schema: serde_json::Value,
    defs: Option<&serde_json::Map<String, serde_json::Value>>,
) -> serde_json::Value {
    let obj = match schema {
        serde_json::Value::Object(obj) => obj,
        other => return other,
    };

    // Resolve $ref before removing it
    if let Some(ref_value) = obj.get("$ref") {
        if let Some(ref_str) = ref_value.as_str() {
            let ref_name = ref_str
                .strip_prefix("#/$defs/")
                .or_else(|| ref_str.strip_prefix("#/definitions/"));
            if let Some(ref_name) = ref_name {
                if let Some(definition) = defs.and_then(|d| d.get(ref_name)) {
                    return sanitize_schema_recursive(definition.clone(), defs);
                }
            }
        }
        // Unresolvable $ref
        return serde_json::json!({});
    }

    let mut result = serde_json::Map::new();
    for (key, value) in obj {
        if UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str())
            || key == "$defs"
            || key == "definitions"
            || key == "$ref"
        {
            continue;
        }

        let sanitized_value = match value {
            serde_json::Value::Object(_) => sanitize_schema_recursive(value, defs),
            serde_json::Value::Array(arr) => serde_json::Value::Array(
                arr.into_iter()
                    .map(|item| {
                        if item.is_object() {
                            sanitize_schema_recursive(item, defs)
                        } else {
                            item
                        }
                    })
                    .collect(),
            ),
            other => other,
        };
        result.insert(key, sanitized_value);
    }

    serde_json::Value::Object(result)
}

impl From<&Vec<crate::api::ToolDefinition>> for GeminiTool {
    fn from(tools: &Vec<crate::api::ToolDefinition>) -> Self {
        GeminiTool {
            function_declarations: tools
                .iter()
                .map(|t| {
                    let raw_schema = serde_json::to_value(&t.input_schema)
                        .unwrap_or(serde_json::Value::Null);
                    GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: sanitize_schema_for_gemini(raw_schema),
                    }
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) response_modalities: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tools: Option<Vec<GeminiTool>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) generation_config: Option<GenerationConfig>,
}

impl From<&ChatRequest> for GenerateContentRequest {
    fn from(request: &ChatRequest) -> Self {
        // System messages go into the dedicated system_instruction field
        let system_instruction = Content {
            parts: request
                .messages
                .iter()
                .filter(|m| m.role == crate::api::Role::System)
                .flat_map(|m| m.payload.content.iter().map(content_block_to_part))
                .collect::<Vec<Part>>(),
            role: Role::User, // Role is ignored for system instructions
        };
        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != crate::api::Role::System)
            .map(Content::from)
            .collect::<Vec<Content>>();

        let tools = request
            .tools
            .as_ref()
            .map(|tools| vec![GeminiTool::from(tools)]);

        let generation_config = request.temperature.map(|temperature| GenerationConfig {
            temperature: Some(temperature),
            response_modalities: None,
        });

        GenerateContentRequest {
            contents,
            tools,
            system_instruction: if system_instruction.parts.is_empty() {
                None
            } else {
                Some(system_instruction)
            },
            generation_config,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Candidate {
    pub(crate) content: Content,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,
}

impl From<GenerateContentResponse> for crate::ChatChunk {
    fn from(response: GenerateContentResponse) -> Self {
        match response.candidates.first() {
            Some(candidate) => (&candidate.content).into(),
            None => crate::ChatChunk::assistant(ChatPayload::default()),
        }
    }
}

impl From<GenerateContentResponse> for crate::ChatMessage {
    fn from(response: GenerateContentResponse) -> Self {
        crate::ChatChunk::from(response).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ContentBlock;
    use crate::ChatMessage;

    #[test]
    fn test_content_serialization() {
        let content = Content {
            role: Role::User,
            parts: vec![Part::new_text("Hello, world!".to_string())],
        };
        let json = serde_json::to_string(&content).unwrap();
        assert_eq!(json, r#"{"role":"user","parts":[{"text":"Hello, world!"}]}"#);
    }

    #[test]
    fn test_function_call_roundtrip_ids() {
        let content = Content {
            role: Role::Model,
            parts: vec![Part::new(PartType::FunctionCall(GeminiFunctionCall {
                name: "generateImage".to_string(),
                args: serde_json::json!({"prompt": "a cat"}),
            }))],
        };

        let chunk: crate::ChatChunk = (&content).into();
        let calls = chunk.payload.get_tool_calls();
        assert_eq!(calls[0].id, "gemini_generateImage");

        // A result for that id maps back to the bare function name
        let result_msg = ChatMessage::user(ChatPayload::tool_result(
            "gemini_generateImage".to_string(),
            r#"{"ok":true}"#.to_string(),
        ));
        let wire: Content = (&result_msg).into();
        match &wire.parts[0].data {
            PartType::FunctionResponse(fr) => assert_eq!(fr.name, "generateImage"),
            other => panic!("expected function response, got {:?}", other),
        }
    }

    #[test]
    fn test_non_object_tool_result_is_wrapped() {
        let msg = ChatMessage::user(ChatPayload::tool_result(
            "gemini_searchWeb".to_string(),
            "plain text".to_string(),
        ));
        let wire: Content = (&msg).into();
        match &wire.parts[0].data {
            PartType::FunctionResponse(fr) => {
                assert_eq!(fr.response["result"], "plain text");
            }
            other => panic!("expected function response, got {:?}", other),
        }
    }

    #[test]
    fn test_system_messages_become_system_instruction() {
        let messages = vec![
            ChatMessage::system(ChatPayload::text("be helpful")),
            ChatMessage::user(ChatPayload::text("hi")),
        ];
        let request = ChatRequest::new(&messages);
        let wire: GenerateContentRequest = (&request).into();

        assert_eq!(wire.contents.len(), 1);
        let instruction = wire.system_instruction.expect("system instruction");
        assert_eq!(instruction.parts.len(), 1);
    }

    #[test]
    fn test_schema_sanitization_strips_meta_keys() {
        let schema = serde_json::json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "prompt": {"$ref": "#/definitions/PromptDef"}
            },
            "definitions": {
                "PromptDef": {"type": "string"}
            }
        });

        let sanitized = sanitize_schema_for_gemini(schema);
        assert!(sanitized.get("$schema").is_none());
        assert!(sanitized.get("definitions").is_none());
        assert_eq!(sanitized["properties"]["prompt"]["type"], "string");
    }

    #[test]
    fn test_inline_image_part_maps_to_image_block() {
        let content = Content {
            role: Role::Model,
            parts: vec![Part::new(PartType::InlineData(InlineData {
                mime_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            }))],
        };
        let chunk: crate::ChatChunk = (&content).into();
        assert!(matches!(
            chunk.payload.content[0],
            ContentBlock::Image { .. }
        ));
    }
}
