use super::api::{GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use crate::client::Client;
use crate::{ChatMessage, ChatModel, ChatRequest, ChatStream};
use async_trait::async_trait;
use futures::StreamExt;

pub struct GeminiChatModel {
    client: Client,
    base_url: String,
    model_name: String,
    response_modalities: Option<Vec<String>>,
}

impl GeminiChatModel {
    pub fn new(client: Client, base_url: String, model_name: String) -> Self {
        GeminiChatModel {
            client,
            base_url,
            model_name,
            response_modalities: None,
        }
    }

    /// Request specific response modalities (e.g. ["TEXT", "IMAGE"] for the
    /// image-generation models).
    pub fn with_response_modalities(mut self, modalities: Vec<String>) -> Self {
        self.response_modalities = Some(modalities);
        self
    }

    fn api_request(&self, request: &ChatRequest) -> GenerateContentRequest {
        let mut api_request = GenerateContentRequest::from(request);
        if let Some(modalities) = &self.response_modalities {
            let config = api_request
                .generation_config
                .get_or_insert(GenerationConfig {
                    temperature: None,
                    response_modalities: None,
                });
            config.response_modalities = Some(modalities.clone());
        }
        api_request
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model_name);

        let api_request = self.api_request(request);
        let response: GenerateContentResponse = self.client.post(url, &api_request).await?;
        Ok(response.into())
    }

    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        let url = format!(
            "{}/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model_name
        );

        let api_request = self.api_request(request);

        let streamed_response = self
            .client
            .post_stream::<_, _, _, GenerateContentResponse>(url, &api_request, |line: &str| {
                line.strip_prefix("data: ")
            })
            .await?;
        Ok(Box::pin(
            streamed_response.map(|chunk| chunk.map(crate::ChatChunk::from)),
        ))
    }
}
