//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dei client vision.
//!
//! ## Responsabilità:
//! - Definisce `Config` con la sezione `clients` (default, ollama, openai_api)
//! - Carica la configurazione da file JSON, con ricerca in posizioni note
//! - Applica override da variabili d'ambiente e da command line
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Ordine di ricerca del file:
//! 1. Path esplicito passato con `--config` (deve esistere)
//! 2. `./config/config.json`
//! 3. `<config dir utente>/media-analyzer/config.json`
//! 4. Nessun file: `Config::default()`
//!
//! ## Esempio struttura file:
//! ```json
//! {
//!   "clients": {
//!     "default": "ollama",
//!     "temperature": 0.2,
//!     "ollama": { "url": "http://localhost:11434", "model": "llama3.2-vision" }
//!   }
//! }
//! ```
//! Le sezioni assenti restano assenti: il registry dei client non le registra.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding the OpenAI-compatible API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Names of the vision clients the registry knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    #[value(name = "ollama")]
    Ollama,
    #[value(name = "openai_api")]
    OpenaiApi,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::Ollama => "ollama",
            ClientKind::OpenaiApi => "openai_api",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub clients: ClientsConfig,
}

/// Vision client section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientsConfig {
    /// Client used when none is requested explicitly
    #[serde(default = "default_client")]
    pub default: ClientKind,
    /// Sampling temperature forwarded to the model
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api: Option<OpenAiConfig>,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            default: default_client(),
            temperature: default_temperature(),
            ollama: Some(OllamaConfig::default()),
            openai_api: Some(OpenAiConfig::default()),
        }
    }
}

/// Local Ollama server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

/// Any OpenAI-compatible chat completions endpoint
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_url")]
    pub api_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_openai_url(),
            model: default_openai_model(),
        }
    }
}

// Keep the key out of debug logs.
impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "*****" })
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

fn default_client() -> ClientKind {
    ClientKind::Ollama
}

fn default_temperature() -> f32 {
    0.2
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2-vision".to_string()
}

fn default_openai_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_openai_model() -> String {
    "meta-llama/llama-3.2-11b-vision-instruct".to_string()
}

/// Command line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub client: Option<ClientKind>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

impl Config {
    /// Load configuration, searching the well-known locations when no explicit path is given
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(anyhow::anyhow!("Config file does not exist: {}", path.display()));
            }
            return Self::from_file(path).await;
        }

        for candidate in Self::candidate_paths() {
            if candidate.exists() {
                debug!("Loading config from {}", candidate.display());
                return Self::from_file(&candidate).await;
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Locations searched when `--config` is not given
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config").join("config.json")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("media-analyzer").join("config.json"));
        }
        paths
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Fill an empty OpenAI key from the environment
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.apply_api_key(key);
        }
    }

    fn apply_api_key(&mut self, key: String) {
        if key.is_empty() {
            return;
        }
        let section = self.clients.openai_api.get_or_insert_with(OpenAiConfig::default);
        if section.api_key.is_empty() {
            section.api_key = key;
        }
    }

    /// Apply command line overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(client) = overrides.client {
            self.clients.default = client;
        }

        if let Some(ref key) = overrides.api_key {
            let section = self.clients.openai_api.get_or_insert_with(OpenAiConfig::default);
            section.api_key = key.clone();
        }

        if let Some(ref url) = overrides.api_url {
            let section = self.clients.openai_api.get_or_insert_with(OpenAiConfig::default);
            section.api_url = url.clone();
        }

        if let Some(ref model) = overrides.model {
            match self.clients.default {
                ClientKind::Ollama => {
                    if let Some(ref mut section) = self.clients.ollama {
                        section.model = model.clone();
                    }
                }
                ClientKind::OpenaiApi => {
                    if let Some(ref mut section) = self.clients.openai_api {
                        section.model = model.clone();
                    }
                }
            }
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.clients.temperature) {
            return Err(anyhow::anyhow!("Temperature must be between 0.0 and 2.0"));
        }

        if let Some(ref ollama) = self.clients.ollama {
            validate_url("ollama.url", &ollama.url)?;
        }

        if let Some(ref openai) = self.clients.openai_api {
            validate_url("openai_api.api_url", &openai.api_url)?;
        }

        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow::anyhow!("{} must not be empty", field));
    }
    let parsed = url::Url::parse(value)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL ({}): {}", field, value, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow::anyhow!("{} must use http or https, got {}", field, other)),
    }
}
