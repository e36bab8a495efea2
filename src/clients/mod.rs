//! # Vision Clients Module
//!
//! Astrazione sui backend vision intercambiabili:
//! - `VisionClient`: capability unica `generate(prompt, media) -> testo`
//! - `ollama`: server Ollama locale (`/api/generate`)
//! - `openai`: qualsiasi endpoint compatibile OpenAI (`/chat/completions`)
//! - `ClientRegistry`: client configurati per nome, con fallback al default
//!
//! Il modello è un parametro della singola chiamata: gli handle sono immutabili
//! e possono essere condivisi tra worker senza sincronizzazione.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use crate::config::{ClientKind, Config};
use crate::error::{AnalyzeError, ClientError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Media file handed to a client
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub path: PathBuf,
    pub mime_type: String,
}

impl MediaRef {
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Read the raw bytes of the media file
    pub async fn read(&self) -> Result<Vec<u8>, ClientError> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// One generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub media: &'a MediaRef,
    pub model: &'a str,
}

/// A backend able to describe media from a prompt
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ClientError>;
}

/// A named, configured client with its default model
#[derive(Clone)]
pub struct ClientHandle {
    name: String,
    client: Arc<dyn VisionClient>,
    default_model: String,
}

impl ClientHandle {
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn VisionClient>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            default_model: default_model.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// The model a call will use: the override when given, else the configured one
    pub fn effective_model<'a>(&'a self, model: Option<&'a str>) -> &'a str {
        model.filter(|m| !m.is_empty()).unwrap_or(&self.default_model)
    }

    pub async fn generate(
        &self,
        prompt: &str,
        media: &MediaRef,
        model: &str,
    ) -> Result<String, ClientError> {
        self.client
            .generate(GenerateRequest { prompt, media, model })
            .await
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("name", &self.name)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Configured clients keyed by name
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientHandle>,
    default_client: String,
}

impl ClientRegistry {
    pub fn new(default_client: impl Into<String>, handles: Vec<ClientHandle>) -> Self {
        let clients = handles
            .into_iter()
            .map(|handle| (handle.name().to_string(), handle))
            .collect();
        Self {
            clients,
            default_client: default_client.into(),
        }
    }

    /// Register every recognized client section present in `config`
    pub fn from_config(config: &Config) -> Result<Self, AnalyzeError> {
        debug!("Setting up vision model clients");
        let clients = &config.clients;
        let mut handles = Vec::new();

        if let Some(ref ollama) = clients.ollama {
            debug!("Configuring Ollama client with URL: {}", ollama.url);
            let client = OllamaClient::new(&ollama.url)
                .map_err(|e| AnalyzeError::Config(e.to_string()))?
                .with_temperature(clients.temperature);
            info!("Ollama client configured at {}", client.base_url());
            handles.push(ClientHandle::new(
                ClientKind::Ollama.as_str(),
                Arc::new(client),
                ollama.model.clone(),
            ));
        }

        if let Some(ref openai) = clients.openai_api {
            debug!("Configuring OpenAI API client with URL: {}", openai.api_url);
            let client = OpenAiClient::new(&openai.api_key, &openai.api_url)
                .map_err(|e| AnalyzeError::Config(e.to_string()))?
                .with_temperature(clients.temperature);
            handles.push(ClientHandle::new(
                ClientKind::OpenaiApi.as_str(),
                Arc::new(client),
                openai.model.clone(),
            ));
            info!("OpenAI API client configured");
        }

        let registry = Self::new(clients.default.as_str(), handles);
        info!(
            "Total clients configured: {} [{}]",
            registry.len(),
            registry.names().join(", ")
        );
        if !registry.clients.contains_key(registry.default_client()) {
            warn!("Default client {} has no configuration section", registry.default_client());
        }
        Ok(registry)
    }

    /// Resolve a client by name; empty or missing names use the default
    pub fn resolve(&self, name: Option<&str>) -> Result<&ClientHandle, AnalyzeError> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => {
                debug!("Using default client: {}", self.default_client);
                &self.default_client
            }
        };

        self.clients
            .get(name)
            .ok_or_else(|| AnalyzeError::UnconfiguredClient(name.to_string()))
    }

    pub fn default_client(&self) -> &str {
        &self.default_client
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Base64-encode the bytes of the media file
pub(crate) async fn encode_media(media: &MediaRef) -> Result<String, ClientError> {
    use base64::Engine;
    let data = media.read().await?;
    debug!("Image loaded successfully, size: {} bytes", data.len());
    Ok(base64::engine::general_purpose::STANDARD.encode(data))
}

/// Trim trailing slashes so paths can be appended
pub(crate) fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, ClientError> {
    // Connect timeout only, requests are unbounded.
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| ClientError::Request(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Scripted client recording every model it was called with
    pub struct FakeClient {
        reply: Result<String, String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeClient {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VisionClient for FakeClient {
        async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ClientError> {
            self.calls.lock().unwrap().push(request.model.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(ClientError::Request(message.clone())),
            }
        }
    }
}
