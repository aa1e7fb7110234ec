//! Application settings management

use crate::{crypto, PathManager};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

/// Application settings stored in settings.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Display name used to address the user in the system prompt
    pub user_name: Option<String>,
    /// Default model ID (e.g., "meta-llama/llama-3.1-405b-instruct")
    pub default_model: Option<String>,
    /// Default service selector ("openrouter" or "gemini")
    pub default_service: Option<String>,
    /// Encrypted API keys (service name -> encrypted key)
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
    /// Whether the web search tool is allowed to call out
    #[serde(default)]
    pub web_search_enabled: bool,
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = PathManager::settings_path() else {
            return Self::default();
        };

        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };

        toml::from_str(&content).unwrap_or_default()
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), String> {
        let path = PathManager::settings_path().ok_or("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }

    /// Get a decrypted API key for a service.
    /// Returns None if not set or decryption fails.
    pub fn get_api_key(&self, service: &str) -> Option<String> {
        self.api_keys
            .get(service)
            .and_then(|encrypted| crypto::decrypt_string(encrypted).ok())
    }

    /// Set an API key for a service (encrypts before storing).
    pub fn set_api_key(&mut self, service: &str, api_key: &str) -> Result<(), String> {
        let encrypted = crypto::encrypt_string(api_key)?;
        self.api_keys.insert(service.to_string(), encrypted);
        Ok(())
    }

    /// Remove an API key for a service.
    pub fn remove_api_key(&mut self, service: &str) {
        self.api_keys.remove(service);
    }

    /// Check if an API key is set for a service.
    pub fn has_api_key(&self, service: &str) -> bool {
        self.api_keys.contains_key(service)
    }

    /// Get the list of services with configured API keys.
    pub fn configured_services(&self) -> Vec<String> {
        self.api_keys.keys().cloned().collect()
    }
}
