//! Image generation tool: Gemini multimodal generation + asset-host upload.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::assets::AssetHost;
use crate::tags;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use llm::api::ToolDefinition;
use llm::{ChatMessage, ChatModel, ChatPayload, ChatRequest, GeminiProvider};

pub const GENERATE_IMAGE: &str = "generateImage";

const DESCRIPTION: &str = "Generate a high-quality image based on a detailed text prompt using Gemini. The image is automatically uploaded to a media host and returned as a URL within a <t3-image> tag. Use this tool for user requests to create, generate, or make images. Always ensure the image is high-quality with a square aspect ratio (1:1). The output MUST be enclosed in a <t3-image> tag (e.g., <t3-image>[URL]</t3-image>). CRITICALLY, the hosted URL returned by the tool MUST NOT be altered in any way. Return the exact URL provided by the tool to avoid invalid links. If generation fails, return <t3-gemini>{Follow the response message}</t3-gemini>.";

/// Fixed suffix appended to every prompt
pub const QUALITY_SUFFIX: &str = ", high-quality, square aspect ratio, detailed";

pub const IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

pub const MISSING_KEY_MESSAGE: &str = "Gemini API key is not provided";
const GENERATION_FAILED_MESSAGE: &str = "Failed to generate image";

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct GenerateImageInput {
    /// A detailed text prompt describing the image to generate. Will be
    /// enhanced to ensure high-quality output with a square aspect ratio.
    pub prompt: String,
}

/// One generated image plus any accompanying text
pub struct GeneratedImage {
    pub text: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Upstream image generation contract
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedImage>;
}

/// Gemini-backed generator: asks the image model for TEXT+IMAGE output and
/// decodes the first inline image part of the response.
pub struct GeminiImageGenerator {
    api_key: String,
    base_url: Option<String>,
}

impl GeminiImageGenerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiImageGenerator {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedImage> {
        let provider = match &self.base_url {
            Some(base_url) => GeminiProvider::new(base_url, &self.api_key),
            None => GeminiProvider::default(&self.api_key),
        };
        let model = provider
            .create_chat_model(IMAGE_MODEL)
            .with_response_modalities(vec!["TEXT".to_string(), "IMAGE".to_string()]);

        let messages = vec![ChatMessage::user(ChatPayload::text(prompt))];
        let response = model
            .chat(&ChatRequest::new(&messages))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to generate image: {:#}", e))?;

        let text = response.get_text();
        let (data, mime_type) = response
            .payload
            .get_images()
            .first()
            .map(|(data, mime)| (data.to_string(), mime.to_string()))
            .ok_or_else(|| anyhow::anyhow!(GENERATION_FAILED_MESSAGE))?;

        let bytes = BASE64
            .decode(data.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to decode image data: {}", e))?;

        Ok(GeneratedImage {
            text,
            bytes,
            mime_type,
        })
    }
}

/// The `generateImage` tool. Execution never fails at the orchestration
/// level: missing credentials and upstream failures come back as a result
/// payload whose `imageUrl` carries a pre-formatted `<t3-gemini>` tag.
pub struct GenerateImageTool {
    gemini_api_key: String,
    generator: Arc<dyn ImageGenerator>,
    assets: Arc<dyn AssetHost>,
}

impl GenerateImageTool {
    pub fn new(
        gemini_api_key: impl Into<String>,
        generator: Arc<dyn ImageGenerator>,
        assets: Arc<dyn AssetHost>,
    ) -> Self {
        GenerateImageTool {
            gemini_api_key: gemini_api_key.into(),
            generator,
            assets,
        }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: GENERATE_IMAGE.to_string(),
            description: Some(DESCRIPTION.to_string()),
            input_schema: schemars::schema_for!(GenerateImageInput),
        }
    }

    fn failure_payload(prompt: &str, message: &str) -> String {
        serde_json::json!({
            "prompt": prompt,
            "success": false,
            "error": message,
            "imageUrl": tags::gemini_tag(message),
            "message": message,
        })
        .to_string()
    }

    pub async fn execute(&self, args: Value) -> String {
        let prompt = match serde_json::from_value::<GenerateImageInput>(args) {
            Ok(input) => input.prompt,
            Err(e) => {
                tracing::warn!("generateImage called with invalid arguments: {}", e);
                String::new()
            }
        };

        if self.gemini_api_key.trim().is_empty() {
            return Self::failure_payload(&prompt, MISSING_KEY_MESSAGE);
        }

        let enhanced_prompt = format!("{}{}", prompt, QUALITY_SUFFIX);

        let generated = match self.generator.generate(&enhanced_prompt).await {
            Ok(generated) => generated,
            Err(e) => {
                tracing::error!("Image generation error: {:#}", e);
                return Self::failure_payload(&enhanced_prompt, &e.to_string());
            }
        };

        let filename = format!(
            "gemini-generated-{}.png",
            chrono::Utc::now().timestamp_millis()
        );
        let url = match self.assets.upload(generated.bytes, &filename).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Image upload error: {:#}", e);
                return Self::failure_payload(&enhanced_prompt, &e.to_string());
            }
        };

        // The hosted URL is forwarded byte-for-byte, no normalization
        serde_json::json!({
            "prompt": enhanced_prompt,
            "success": true,
            "text": generated.text,
            "imageUrl": tags::image_tag(&url),
            "message": "Image generated successfully",
        })
        .to_string()
    }
}
