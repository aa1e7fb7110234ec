//! Binary-asset host contract.
//!
//! Generated images are uploaded to an external media host and referenced
//! by URL from then on. The host is an external collaborator consumed
//! through this narrow trait.

use async_trait::async_trait;
use serde::Deserialize;

#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Upload raw bytes and return the hosted URL.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> anyhow::Result<String>;
}

/// Cloudinary unsigned-preset upload
pub struct CloudinaryHost {
    client: reqwest::Client,
    cloud_name: String,
    upload_preset: String,
}

#[derive(Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
}

impl CloudinaryHost {
    pub fn new(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        CloudinaryHost {
            client: reqwest::Client::new(),
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
        }
    }

    /// Construct from CLOUDINARY_CLOUD_NAME / CLOUDINARY_UPLOAD_PRESET
    pub fn from_env() -> Option<Self> {
        let cloud_name = std::env::var("CLOUDINARY_CLOUD_NAME").ok()?;
        let upload_preset = std::env::var("CLOUDINARY_UPLOAD_PRESET").ok()?;
        Some(Self::new(cloud_name, upload_preset))
    }
}

#[async_trait]
impl AssetHost for CloudinaryHost {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> anyhow::Result<String> {
        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("resource_type", "image");

        let response = self.client.post(&endpoint).multipart(form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to upload to Cloudinary: {} {}", status, body);
        }

        let parsed: CloudinaryUploadResponse = response.json().await?;
        Ok(parsed.secure_url)
    }
}
