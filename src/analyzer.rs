//! # Single Image Analyzer
//!
//! Questo modulo analizza un singolo file media con un client vision.
//!
//! ## Responsabilità:
//! - Risolve il client (esplicito o di default) dal `ClientRegistry`
//! - Costruisce il prompt con `PromptBuilder`
//! - Invoca il client e normalizza il risultato in un `AnalysisRecord`
//! - Salva il record come `image_analysis.json` nella directory di output
//!
//! ## Contratto:
//! - `analyze()` non fallisce mai: ogni errore diventa un record con `error`
//! - `save()` propaga gli errori di I/O al chiamante
//!
//! ## Esempio struttura record:
//! ```json
//! {
//!   "image_path": "/abs/photo.jpg",
//!   "image_filename": "photo.jpg",
//!   "analysis": {
//!     "client": "ollama",
//!     "model": "llama3.2-vision",
//!     "prompt_used": "...",
//!     "description": "..."
//!   },
//!   "metadata": { "file_size": 1024, "mime_type": "image/jpeg", "analysis_successful": true }
//! }
//! ```

use crate::clients::{ClientRegistry, MediaRef};
use crate::error::AnalyzeError;
use crate::file_manager::FileManager;
use crate::prompt::PromptBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Fixed name of the single-item artifact
pub const ANALYSIS_FILE: &str = "image_analysis.json";

/// Normalized result of analyzing one media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub image_path: PathBuf,
    pub image_filename: String,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub metadata: RecordMetadata,
}

/// Exactly one of the two branches is ever present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Success { analysis: AnalysisDetails },
    Failure { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub client: String,
    pub model: String,
    pub prompt_used: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub analysis_successful: bool,
}

impl AnalysisRecord {
    pub fn success(
        image_path: PathBuf,
        details: AnalysisDetails,
        file_size: u64,
        mime_type: &str,
    ) -> Self {
        Self {
            image_filename: file_name_of(&image_path),
            image_path,
            outcome: AnalysisOutcome::Success { analysis: details },
            metadata: RecordMetadata {
                file_size: Some(file_size),
                mime_type: Some(mime_type.to_string()),
                analysis_successful: true,
            },
        }
    }

    pub fn failure(image_path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            image_filename: file_name_of(&image_path),
            image_path,
            outcome: AnalysisOutcome::Failure {
                error: error.into(),
            },
            metadata: RecordMetadata {
                file_size: None,
                mime_type: None,
                analysis_successful: false,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Success { .. })
    }

    pub fn analysis(&self) -> Option<&AnalysisDetails> {
        match &self.outcome {
            AnalysisOutcome::Success { analysis } => Some(analysis),
            AnalysisOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            AnalysisOutcome::Success { .. } => None,
            AnalysisOutcome::Failure { error } => Some(error),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.analysis().map(|a| a.description.as_str())
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions<'a> {
    pub client: Option<&'a str>,
    pub model: Option<&'a str>,
    pub prompt: Option<&'a str>,
}

/// Analyzes single media files with the configured clients
pub struct ImageAnalyzer {
    registry: ClientRegistry,
    prompts: PromptBuilder,
}

impl ImageAnalyzer {
    pub fn new(registry: ClientRegistry, prompts: PromptBuilder) -> Self {
        info!("ImageAnalyzer initialized with {} client(s)", registry.len());
        Self { registry, prompts }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Analyze one file; never fails, errors become a failure record
    pub async fn analyze(&self, media_path: &Path, options: &AnalyzeOptions<'_>) -> AnalysisRecord {
        info!("Starting image analysis for: {}", media_path.display());

        match self.try_analyze(media_path, options).await {
            Ok(record) => {
                info!("Image analysis completed successfully");
                record
            }
            Err(e) => {
                error!("Error during image analysis: {}", e);
                let path = if media_path.exists() {
                    absolute(media_path)
                } else {
                    media_path.to_path_buf()
                };
                AnalysisRecord::failure(path, e.to_string())
            }
        }
    }

    async fn try_analyze(
        &self,
        media_path: &Path,
        options: &AnalyzeOptions<'_>,
    ) -> Result<AnalysisRecord, AnalyzeError> {
        if !media_path.exists() {
            return Err(AnalyzeError::MediaNotFound(media_path.display().to_string()));
        }

        let handle = self.registry.resolve(options.client)?;
        let model = handle.effective_model(options.model);
        info!("Using client: {} (model {})", handle.name(), model);

        let mime_type = FileManager::mime_type(media_path);
        debug!("Detected MIME type: {}", mime_type);

        let prompt = self.prompts.build(options.prompt);
        let media = MediaRef::new(media_path, mime_type);

        info!("Analyzing image with {} using model {}", handle.name(), model);
        let description = handle.generate(&prompt, &media, model).await?;
        debug!("Analysis result length: {} characters", description.len());

        let file_size = tokio::fs::metadata(media_path).await?.len();

        Ok(AnalysisRecord::success(
            absolute(media_path),
            AnalysisDetails {
                client: handle.name().to_string(),
                model: model.to_string(),
                prompt_used: prompt,
                description,
            },
            file_size,
            mime_type,
        ))
    }

    /// Write `record` as `image_analysis.json` inside `output_dir`
    pub async fn save(record: &AnalysisRecord, output_dir: &Path) -> Result<PathBuf, AnalyzeError> {
        debug!("Saving analysis to directory: {}", output_dir.display());
        tokio::fs::create_dir_all(output_dir).await?;

        let output_file = output_dir.join(ANALYSIS_FILE);
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| AnalyzeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        tokio::fs::write(&output_file, content).await?;

        info!("Analysis saved successfully to: {}", output_file.display());
        Ok(output_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing::FakeClient;
    use crate::clients::ClientHandle;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn analyzer_with(client: FakeClient, dir: &TempDir) -> ImageAnalyzer {
        let handle = ClientHandle::new("ollama", Arc::new(client), "llama3.2-vision");
        let registry = ClientRegistry::new("ollama", vec![handle]);
        ImageAnalyzer::new(registry, PromptBuilder::new(dir.path().join("no-prompts")))
    }

    fn image_in(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0u8; 42]).unwrap();
        path
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let dir = TempDir::new().unwrap();
        let path = image_in(&dir, "cat.PNG");
        let analyzer = analyzer_with(FakeClient::replying("A cat on a sofa."), &dir);

        let record = analyzer
            .analyze(&path, &AnalyzeOptions { prompt: Some("What animal?"), ..Default::default() })
            .await;

        assert!(record.is_success());
        assert_eq!(record.image_filename, "cat.PNG");
        assert!(record.image_path.is_absolute());
        let analysis = record.analysis().unwrap();
        assert_eq!(analysis.client, "ollama");
        assert_eq!(analysis.model, "llama3.2-vision");
        assert_eq!(analysis.description, "A cat on a sofa.");
        assert!(analysis.prompt_used.contains("I want to know: What animal?"));
        assert_eq!(record.metadata.file_size, Some(42));
        assert_eq!(record.metadata.mime_type.as_deref(), Some("image/png"));
        assert!(record.metadata.analysis_successful);
    }

    #[tokio::test]
    async fn test_analyze_model_override() {
        let dir = TempDir::new().unwrap();
        let path = image_in(&dir, "a.jpg");
        let analyzer = analyzer_with(FakeClient::replying("ok"), &dir);

        let record = analyzer
            .analyze(&path, &AnalyzeOptions { model: Some("llava:34b"), ..Default::default() })
            .await;
        assert_eq!(record.analysis().unwrap().model, "llava:34b");

        let record = analyzer.analyze(&path, &AnalyzeOptions::default()).await;
        assert_eq!(record.analysis().unwrap().model, "llama3.2-vision");
    }

    #[tokio::test]
    async fn test_analyze_missing_file() {
        let dir = TempDir::new().unwrap();
        let analyzer = analyzer_with(FakeClient::replying("unused"), &dir);
        let missing = dir.path().join("ghost.jpg");

        let record = analyzer.analyze(&missing, &AnalyzeOptions::default()).await;
        assert!(!record.is_success());
        assert!(!record.metadata.analysis_successful);
        assert_eq!(record.image_path, missing);
        assert!(record.error().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_analyze_unconfigured_client() {
        let dir = TempDir::new().unwrap();
        let path = image_in(&dir, "a.jpg");
        let analyzer = analyzer_with(FakeClient::replying("unused"), &dir);

        let record = analyzer
            .analyze(&path, &AnalyzeOptions { client: Some("openai_api"), ..Default::default() })
            .await;
        assert_eq!(record.error(), Some("Client 'openai_api' not configured"));
        assert!(record.analysis().is_none());
    }

    #[tokio::test]
    async fn test_analyze_client_failure() {
        let dir = TempDir::new().unwrap();
        let path = image_in(&dir, "a.gif");
        let analyzer = analyzer_with(FakeClient::failing("connection refused"), &dir);

        let record = analyzer.analyze(&path, &AnalyzeOptions::default()).await;
        assert!(!record.is_success());
        assert!(record.error().unwrap().contains("connection refused"));
    }

    #[test]
    fn test_failure_record_json_shape() {
        let record = AnalysisRecord::failure(PathBuf::from("x.jpg"), "boom");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["error"], "boom");
        assert!(value.get("analysis").is_none());
        assert_eq!(value["metadata"], serde_json::json!({ "analysis_successful": false }));
    }

    #[tokio::test]
    async fn test_save_and_reload_preserves_unicode() {
        let dir = TempDir::new().unwrap();
        let record = AnalysisRecord::success(
            PathBuf::from("/photos/città.jpg"),
            AnalysisDetails {
                client: "ollama".to_string(),
                model: "llava".to_string(),
                prompt_used: "Descrivi".to_string(),
                description: "Un caffè sulla piazza, 東京 ☕".to_string(),
            },
            10,
            "image/jpeg",
        );

        let out_dir = dir.path().join("out").join("deeper");
        let saved = ImageAnalyzer::save(&record, &out_dir).await.unwrap();
        assert_eq!(saved, out_dir.join(ANALYSIS_FILE));

        let text = std::fs::read_to_string(&saved).unwrap();
        assert!(text.contains("Un caffè sulla piazza, 東京 ☕"));
        assert!(text.contains("\n  \"image_filename\""));

        let parsed: AnalysisRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[tokio::test]
    async fn test_save_into_file_path_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();

        let record = AnalysisRecord::failure(PathBuf::from("x.jpg"), "e");
        let result = ImageAnalyzer::save(&record, &blocker.join("sub")).await;
        assert!(matches!(result, Err(AnalyzeError::Io(_))));
    }
}
