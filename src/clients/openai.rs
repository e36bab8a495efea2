//! OpenAI-compatible vision client.
//!
//! Works with any `/chat/completions` endpoint (OpenAI, OpenRouter, vLLM...).
//! The image travels as a base64 data URL next to the text prompt.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{build_http_client, encode_media, normalize_base_url, GenerateRequest, VisionClient};
use crate::error::ClientError;

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    /// An empty key is accepted here and rejected at call time.
    pub fn new(api_key: &str, api_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client()?,
            api_key: api_key.to_string(),
            api_url: normalize_base_url(api_url),
            temperature: 0.2,
            max_tokens: 1024,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_body(&self, request: &GenerateRequest<'_>, image_b64: &str) -> Value {
        let data_url = format!("data:{};base64,{}", request.media.mime_type, image_b64);
        json!({
            "model": request.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }]
        })
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VisionClient for OpenAiClient {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ClientError> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::MissingApiKey(self.api_url.clone()));
        }

        let image_b64 = encode_media(request.media).await?;
        let body = self.build_body(&request, &image_b64);
        let url = format!("{}/chat/completions", self.api_url);
        debug!(url = %url, model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
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

        extract_message_text(&resp_body)
    }
}

/// Extract text from a Chat Completions response.
fn extract_message_text(response: &Value) -> Result<String, ClientError> {
    let choices = response
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::Parse("response missing 'choices' array".to_string()))?;

    let first = choices
        .first()
        .ok_or_else(|| ClientError::Parse("no choices in response".to_string()))?;

    first
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::Parse("no message content in first choice".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MediaRef;
    use mockito::Matcher;
    use tempfile::TempDir;

    #[test]
    fn test_extract_message_text() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Two dogs." } }]
        });
        assert_eq!(extract_message_text(&body).unwrap(), "Two dogs.");
    }

    #[test]
    fn test_extract_message_text_no_choices() {
        assert!(extract_message_text(&json!({"choices": []})).is_err());
        assert!(extract_message_text(&json!({"id": "x"})).is_err());
    }

    #[test]
    fn test_body_uses_data_url() {
        let client = OpenAiClient::new("k", "https://api.openai.com/v1/").unwrap();
        let media = MediaRef::new("a.webp", "image/webp");
        let body = client.build_body(
            &GenerateRequest {
                prompt: "What is this?",
                media: &media,
                model: "gpt-4o",
            },
            "QUJD",
        );

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["content"][0]["text"], "What is this?");
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/webp;base64,QUJD"
        );
        assert_eq!(client.api_url, "https://api.openai.com/v1");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let client = OpenAiClient::new("  ", "https://api.openai.com/v1").unwrap();
        let media = MediaRef::new("unused.png", "image/png");
        let err = client
            .generate(GenerateRequest {
                prompt: "p",
                media: &media,
                model: "gpt-4o",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingApiKey(_)));
    }

    #[tokio::test]
    async fn test_generate_sends_bearer_key() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"ABC").unwrap();
        let media = MediaRef::new(path, "image/jpeg");

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({ "model": "gpt-4o-mini" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"Una strada di notte."}}]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new("sk-test", &format!("{}/v1", server.url())).unwrap();
        let text = client
            .generate(GenerateRequest {
                prompt: "Describe",
                media: &media,
                model: "gpt-4o-mini",
            })
            .await
            .unwrap();

        assert_eq!(text, "Una strada di notte.");
        mock.assert_async().await;
    }

    #[test]
    fn test_debug_hides_key() {
        let client = OpenAiClient::new("sk-secret", "https://x.test/v1")
            .unwrap();
        let printed = format!("{:?}", client);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("1024"));
    }
}
