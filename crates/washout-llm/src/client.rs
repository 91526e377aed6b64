//! Vision model client.
//!
//! The collaborator is opaque to the rest of the system: image bytes in,
//! raw model text out. [`OpenAiVisionClient`] talks to the OpenAI Responses
//! API; tests substitute their own [`VisionExtractor`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

use crate::extraction::{ExtractionError, ExtractionResult};
use crate::prompts::EXTRACTION_INSTRUCTION;

/// Longest response body excerpt carried in an error.
const ERROR_BODY_EXCERPT: usize = 300;

/// External OCR/vision collaborator.
#[async_trait]
pub trait VisionExtractor: Send + Sync {
    /// Run the extraction instruction against one image and return the
    /// model's raw text.
    async fn extract_raw(&self, image: &[u8]) -> ExtractionResult<String>;
}

/// Connection settings for the vision model.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl VisionConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
        }
    }
}

/// OpenAI Responses API client.
pub struct OpenAiVisionClient {
    http: reqwest::Client,
    config: VisionConfig,
}

impl OpenAiVisionClient {
    pub fn new(config: VisionConfig) -> ExtractionResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, image: &[u8]) -> Value {
        let data_url = format!(
            "data:{};base64,{}",
            image_mime(image),
            BASE64_STANDARD.encode(image)
        );

        json!({
            "model": self.config.model,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": EXTRACTION_INSTRUCTION },
                    { "type": "input_image", "image_url": data_url }
                ]
            }]
        })
    }
}

#[async_trait]
impl VisionExtractor for OpenAiVisionClient {
    async fn extract_raw(&self, image: &[u8]) -> ExtractionResult<String> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(ExtractionError::Failed(format!(
                "vision API returned {status}: {excerpt}"
            )));
        }

        let body: Value = response.json().await?;
        let text = response_text(&body).unwrap_or_default();
        debug!(model = %self.config.model, text_len = text.len(), "Vision model responded");
        Ok(text)
    }
}

/// First text content of a Responses API payload.
fn response_text(body: &Value) -> Option<String> {
    let from_output = body["output"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item["content"].as_array())
        .flatten()
        .find_map(|part| part["text"].as_str());

    from_output
        .or_else(|| body["output_text"].as_str())
        .map(str::to_string)
}

/// MIME type from magic bytes; JPEG when unrecognised.
fn image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
