use super::chat::model::OpenRouterChatModel;
use crate::client::Client;
use reqwest::header;

pub struct OpenRouterProvider {
    client: Client,
    base_url: String,
}

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

impl OpenRouterProvider {
    pub fn default(api_key: &str) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Create a provider with a custom base URL (e.g., for proxying or tests).
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self::with_base_url(base_url, api_key)
    }

    fn with_base_url(base_url: &str, api_key: &str) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert("Content-Type", "application/json".parse().unwrap());
        if let Ok(value) = format!("Bearer {}", api_key).parse() {
            headers.insert(header::AUTHORIZATION, value);
        }
        OpenRouterProvider {
            client: Client::with_headers(headers),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn create_chat_model(&self, model_name: &str) -> OpenRouterChatModel {
        OpenRouterChatModel::new(
            self.client.clone(),
            self.base_url.clone(),
            model_name.to_string(),
        )
    }
}
