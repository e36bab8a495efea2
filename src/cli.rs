//! # Command Line Contract
//!
//! Argomenti e exit code condivisi dai due binari.
//!
//! ## Responsabilità:
//! - `ImageArgs`: argomenti di `image-analyzer`, usati anche per
//!   interpretare le invocazioni in-process del batch
//! - Esito di una singola analisi (`ImageOutcome`) e relativo exit code
//! - Exit code di `media-folder`: `0` anche se tutti i file falliscono
//!
//! ## Exit code:
//! - `0` successo
//! - `1` validazione, analisi o batch fallito
//! - `130` interrotto dall'utente

use crate::analyzer::{AnalysisRecord, AnalyzeOptions, ImageAnalyzer};
use crate::batch::BatchResultMap;
use crate::config::{ClientKind, ConfigOverrides};
use crate::error::AnalyzeError;
use crate::file_manager::FileManager;
use crate::logging::LogLevel;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "image-analyzer")]
#[command(about = "Analyze images using LLM vision models")]
pub struct ImageArgs {
    /// Path to the image file to analyze
    pub image_path: PathBuf,

    /// Client to use for analysis (default: from config)
    #[arg(long, value_enum)]
    pub client: Option<ClientKind>,

    /// Model name to use (default: from config)
    #[arg(long)]
    pub model: Option<String>,

    /// API key for external services
    #[arg(long)]
    pub api_key: Option<String>,

    /// API URL for external services
    #[arg(long)]
    pub api_url: Option<String>,

    /// Custom prompt for image analysis
    #[arg(long)]
    pub prompt: Option<String>,

    /// Output directory for analysis results
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Path to custom config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Set the logging level
    #[arg(long, value_enum, default_value = "INFO")]
    pub log_level: LogLevel,

    /// Enable verbose output (equivalent to --log-level DEBUG)
    #[arg(short, long)]
    pub verbose: bool,
}

impl ImageArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            client: self.client,
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            api_url: self.api_url.clone(),
        }
    }

    pub fn options(&self) -> AnalyzeOptions<'_> {
        AnalyzeOptions {
            client: self.client.map(|kind| kind.as_str()),
            model: self.model.as_deref(),
            prompt: self.prompt.as_deref(),
        }
    }
}

/// How a single-image run ended
#[derive(Debug)]
pub enum ImageOutcome {
    /// The input is missing or not a supported image
    Rejected(String),
    /// The analysis produced a failure record; nothing was saved
    Failed(String),
    Saved {
        record: AnalysisRecord,
        output_file: PathBuf,
    },
}

impl ImageOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ImageOutcome::Saved { .. } => EXIT_SUCCESS,
            ImageOutcome::Rejected(_) | ImageOutcome::Failed(_) => EXIT_FAILURE,
        }
    }

    /// Error text for a run that did not save anything
    pub fn error(&self) -> Option<&str> {
        match self {
            ImageOutcome::Rejected(message) | ImageOutcome::Failed(message) => Some(message),
            ImageOutcome::Saved { .. } => None,
        }
    }
}

/// Checked before any configuration is loaded
pub fn validate_input(args: &ImageArgs) -> Option<ImageOutcome> {
    match FileManager::validate_image(&args.image_path) {
        Ok(()) => None,
        Err(e) => {
            error!("{}", e);
            error!("Image validation failed");
            Some(ImageOutcome::Rejected(e.to_string()))
        }
    }
}

/// Analyze `args.image_path` and save the record to `args.output_dir`
///
/// A failed analysis is an outcome, not an error; only saving can fail.
pub async fn analyze_and_save(
    analyzer: &ImageAnalyzer,
    args: &ImageArgs,
) -> Result<ImageOutcome, AnalyzeError> {
    let record = analyzer.analyze(&args.image_path, &args.options()).await;

    if let Some(message) = record.error() {
        error!("Analysis failed: {}", message);
        return Ok(ImageOutcome::Failed(message.to_string()));
    }

    info!("Saving results to {}", args.output_dir.display());
    let output_file = ImageAnalyzer::save(&record, &args.output_dir).await?;
    Ok(ImageOutcome::Saved { record, output_file })
}

/// `media-folder` succeeds whenever the batch ran, whatever the items did
pub fn batch_exit_code(outcome: &Result<BatchResultMap, AnalyzeError>) -> i32 {
    match outcome {
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchConfig, BatchEntry, FolderProcessor, ProcessInvoker, ProcessOutput};
    use crate::clients::testing::FakeClient;
    use crate::clients::{ClientHandle, ClientRegistry};
    use crate::file_manager::MediaKind;
    use crate::prompt::PromptBuilder;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn analyzer_with(client: FakeClient, dir: &TempDir) -> ImageAnalyzer {
        let handle = ClientHandle::new("ollama", Arc::new(client), "llava");
        let registry = ClientRegistry::new("ollama", vec![handle]);
        ImageAnalyzer::new(registry, PromptBuilder::new(dir.path().join("no-prompts")))
    }

    fn parse(image: &Path, output: &Path) -> ImageArgs {
        ImageArgs::try_parse_from([
            "image-analyzer".to_string(),
            image.display().to_string(),
            "--output-dir".to_string(),
            output.display().to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_parse_batch_style_arguments() {
        let args = ImageArgs::try_parse_from([
            "image-analyzer",
            "/m/a.jpg",
            "--prompt",
            "Who?",
            "--client",
            "openai_api",
            "--api-url",
            "https://api.openai.com/v1",
            "--api-key",
            "sk-1",
            "--model",
            "gpt-4o",
            "--output-dir",
            "/o/image_a",
        ])
        .unwrap();

        assert_eq!(args.client, Some(ClientKind::OpenaiApi));
        assert_eq!(args.options().client, Some("openai_api"));
        assert_eq!(args.options().model, Some("gpt-4o"));
        assert_eq!(args.overrides().api_key.as_deref(), Some("sk-1"));
        assert_eq!(args.output_dir, PathBuf::from("/o/image_a"));
        assert_eq!(args.log_level, LogLevel::Info);
    }

    #[test]
    fn test_missing_image_is_rejected_with_exit_1() {
        let dir = TempDir::new().unwrap();
        let outcome = validate_input(&parse(&dir.path().join("nope.jpg"), dir.path())).unwrap();
        assert!(matches!(outcome, ImageOutcome::Rejected(_)));
        assert_eq!(outcome.exit_code(), EXIT_FAILURE);

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "x").unwrap();
        let outcome = validate_input(&parse(&text, dir.path())).unwrap();
        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
    }

    #[tokio::test]
    async fn test_successful_analysis_saves_and_exits_0() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("cat.png");
        std::fs::write(&image, b"png").unwrap();
        let out = dir.path().join("out");
        let args = parse(&image, &out);
        assert!(validate_input(&args).is_none());

        let analyzer = analyzer_with(FakeClient::replying("A cat."), &dir);
        let outcome = analyze_and_save(&analyzer, &args).await.unwrap();

        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert!(outcome.error().is_none());
        match outcome {
            ImageOutcome::Saved { record, output_file } => {
                assert_eq!(record.description(), Some("A cat."));
                assert_eq!(output_file, out.join("image_analysis.json"));
                assert!(output_file.is_file());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_analysis_exits_1_without_saving() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("cat.png");
        std::fs::write(&image, b"png").unwrap();
        let out = dir.path().join("out");

        let analyzer = analyzer_with(FakeClient::failing("connection refused"), &dir);
        let outcome = analyze_and_save(&analyzer, &parse(&image, &out)).await.unwrap();

        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert!(outcome.error().unwrap().contains("connection refused"));
        assert!(!out.join("image_analysis.json").exists());
    }

    struct AlwaysFails;

    #[async_trait]
    impl ProcessInvoker for AlwaysFails {
        async fn invoke(
            &self,
            _program: &str,
            _args: &[String],
            _timeout: Duration,
        ) -> Result<ProcessOutput, AnalyzeError> {
            Ok(ProcessOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "boom".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_batch_exits_0_even_when_every_item_fails() {
        let media = TempDir::new().unwrap();
        std::fs::write(media.path().join("a.mp4"), b"v").unwrap();
        std::fs::write(media.path().join("b.jpg"), b"i").unwrap();
        let out = TempDir::new().unwrap();
        let config = BatchConfig {
            output_dir: Some(out.path().to_path_buf()),
            ..Default::default()
        };

        let outcome = FolderProcessor::new(config, Arc::new(AlwaysFails))
            .with_progress(false)
            .process_folder(media.path())
            .await;

        let results = outcome.as_ref().unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, entry)| !entry.is_success()));
        assert_eq!(batch_exit_code(&outcome), EXIT_SUCCESS);
    }

    #[test]
    fn test_batch_exit_code() {
        let mut results = BatchResultMap::new();
        results.insert("x.jpg", BatchEntry::failure(MediaKind::Image, "bad"));
        assert_eq!(batch_exit_code(&Ok(results)), EXIT_SUCCESS);
        assert_eq!(batch_exit_code(&Ok(BatchResultMap::new())), EXIT_SUCCESS);

        let missing = Err(AnalyzeError::MediaNotFound("/nope".to_string()));
        assert_eq!(batch_exit_code(&missing), EXIT_FAILURE);
    }
}
