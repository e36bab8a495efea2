//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `AnalyzeError` per categorizzare ogni errore dell'analisi
//! - Definisce `ClientError` per gli errori dei client vision (HTTP, parsing)
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `MediaNotFound` / `UnsupportedFormat`: file mancante o estensione non supportata
//! - `UnconfiguredClient`: client richiesto (o di default) senza configurazione
//! - `GenerationFailure`: la chiamata al modello vision è fallita
//! - `Io`: persistenza su disco fallita
//! - `TimeoutExceeded`: il processo esterno ha superato il limite di tempo
//! - `MalformedOutput`: artifact JSON mancante o con forma inattesa
//! - `Spawn`: il programma esterno non può essere avviato
//! - `Config`: configurazione non valida
//!
//! ## Esempio:
//! ```rust,ignore
//! if !path.exists() {
//!     return Err(AnalyzeError::MediaNotFound(path.display().to_string()));
//! }
//! ```

use std::time::Duration;

/// Errors produced while analyzing media, one file or a whole batch
#[derive(thiserror::Error, Debug)]
pub enum AnalyzeError {
    #[error("Media file not found: {0}")]
    MediaNotFound(String),

    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("Client '{0}' not configured")]
    UnconfiguredClient(String),

    #[error("Generation failed: {0}")]
    GenerationFailure(#[from] ClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout after {}s processing {target}", .limit.as_secs())]
    TimeoutExceeded { target: String, limit: Duration },

    #[error("Malformed analyzer output: {0}")]
    MalformedOutput(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for AnalyzeError {
    fn from(err: serde_json::Error) -> Self {
        AnalyzeError::MalformedOutput(err.to_string())
    }
}

/// Errors raised by a vision model client
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API response error: {status} {body}")]
    Response { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("API key not set for {0}")]
    MissingApiKey(String),

    #[error("failed to read media: {0}")]
    Io(#[from] std::io::Error),
}
