//! Ollama vision client.
//!
//! Uses the native `/api/generate` endpoint with `stream: false`; images are
//! sent base64-encoded in the `images` array.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{build_http_client, encode_media, normalize_base_url, GenerateRequest, VisionClient};
use crate::error::ClientError;

/// Default Ollama base URL (local server).
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client()?,
            base_url: normalize_base_url(base_url),
            temperature: 0.2,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body(&self, request: &GenerateRequest<'_>, image_b64: String) -> Value {
        json!({
            "model": request.model,
            "prompt": request.prompt,
            "images": [image_b64],
            "stream": false,
            "options": { "temperature": self.temperature },
        })
    }
}

#[async_trait]
impl VisionClient for OllamaClient {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ClientError> {
        let image_b64 = encode_media(request.media).await?;
        let body = self.build_body(&request, image_b64);
        let url = format!("{}/api/generate", self.base_url);
        debug!(url = %url, model = %request.model, "Sending Ollama generate request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Request(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(ClientError::Response {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let resp_body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("failed to read JSON: {e}")))?;

        extract_response_text(&resp_body)
    }
}

/// Pull the generated text out of an `/api/generate` response
fn extract_response_text(body: &Value) -> Result<String, ClientError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(ClientError::Parse(format!("Ollama error: {error}")));
    }
    body.get("response")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::Parse("response missing 'response' field".to_string()))
}
