//! Service dispatch.
//!
//! Resolves the request's service selector and model identifier into a
//! callable model handle, validating that the required credential is
//! present before any network call is attempted. Decrypted keys are
//! injected into the provider constructor and live only for the request.

use crate::error::{classify, ClassifiedError, RawFailure, Service};
use crate::request::{ChatRequestBody, ServiceSelector};
use llm::{ChatModel, GeminiProvider, OpenRouterProvider};
use std::sync::Arc;

pub const DEFAULT_OPENROUTER_MODEL: &str = "meta-llama/llama-3.1-405b-instruct";

pub const MISSING_OPENROUTER_KEY: &str =
    "Please log in and configure your OpenRouter API key";

/// Resolves decrypted credentials and the caller's display name for one
/// session. Absent credentials come back as `None`, never as an error.
pub trait CredentialStore: Send + Sync {
    fn api_key(&self, service: ServiceSelector) -> Option<String>;

    fn user_name(&self) -> Option<String> {
        None
    }
}

impl CredentialStore for config::Settings {
    fn api_key(&self, service: ServiceSelector) -> Option<String> {
        let name = match service {
            ServiceSelector::OpenRouter => "openrouter",
            ServiceSelector::Gemini => "gemini",
        };
        self.get_api_key(name)
    }

    fn user_name(&self) -> Option<String> {
        self.user_name.clone()
    }
}

impl From<ServiceSelector> for Service {
    fn from(selector: ServiceSelector) -> Self {
        match selector {
            ServiceSelector::OpenRouter => Service::OpenRouter,
            ServiceSelector::Gemini => Service::Gemini,
        }
    }
}

/// Decrypt the caller-supplied Gemini key. Missing or undecryptable keys
/// come back as an empty string; the image tool reports that condition as
/// an in-band tag rather than failing the request.
pub fn decrypt_gemini_key(body: &ChatRequestBody) -> String {
    body.gemini_api_key
        .as_deref()
        .and_then(|encrypted| config::crypto::decrypt_string(encrypted).ok())
        .unwrap_or_default()
}

/// The Gemini wire model id is "provider/model"; the provider half is
/// advisory and dropped here.
fn gemini_model_name(model: &str) -> Result<&str, ClassifiedError> {
    let name = model
        .split('/')
        .nth(1)
        .map(str::trim)
        .filter(|name| !name.is_empty());
    name.ok_or_else(|| {
        classify(
            &RawFailure::new(format!("model identifier {:?} is malformed", model))
                .with_service_hint(Service::Gemini),
        )
    })
}

/// Resolve the request into a model handle, or a classified failure.
pub fn resolve_model(
    body: &ChatRequestBody,
    credentials: &dyn CredentialStore,
) -> Result<Arc<dyn ChatModel + Send + Sync>, ClassifiedError> {
    match body.service {
        ServiceSelector::OpenRouter => {
            let api_key = credentials
                .api_key(ServiceSelector::OpenRouter)
                .ok_or_else(|| ClassifiedError::authentication(MISSING_OPENROUTER_KEY))?;

            let model = if body.model.is_empty() {
                DEFAULT_OPENROUTER_MODEL
            } else {
                &body.model
            };
            let provider = OpenRouterProvider::default(&api_key);
            Ok(Arc::new(provider.create_chat_model(model)))
        }
        ServiceSelector::Gemini => {
            let model = gemini_model_name(&body.model)?;
            let api_key = decrypt_gemini_key(body);
            let provider = GeminiProvider::default(&api_key);
            Ok(Arc::new(provider.create_chat_model(model)))
        }
    }
}
