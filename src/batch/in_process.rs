//! # In-Process Image Analysis
//!
//! Variante del batch che non lancia `image-analyzer` come processo: le
//! invocazioni del programma immagine vengono interpretate con gli stessi
//! argomenti della CLI ed eseguite su un `ImageAnalyzer` condiviso.
//!
//! ## Comportamento:
//! - Stesso artifact `image_analysis.json` nella directory dell'elemento
//! - Stessi exit code della CLI (`0` salvato, `1` fallito, `2` argomenti non validi)
//! - Client e chiavi vengono dalla configurazione dell'analyzer condiviso;
//!   `--api-key` e `--api-url` sono accettati ma ignorati
//! - Qualsiasi altro programma (il video analyzer) passa al `fallback`

use crate::analyzer::ImageAnalyzer;
use crate::batch::invoker::{ProcessInvoker, ProcessOutput};
use crate::cli::{self, ImageArgs, EXIT_FAILURE};
use crate::error::AnalyzeError;
use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Runs image invocations on a shared analyzer, everything else through `fallback`
pub struct InProcessInvoker {
    analyzer: Arc<ImageAnalyzer>,
    image_program: String,
    fallback: Arc<dyn ProcessInvoker>,
}

impl InProcessInvoker {
    pub fn new(
        analyzer: Arc<ImageAnalyzer>,
        image_program: impl Into<String>,
        fallback: Arc<dyn ProcessInvoker>,
    ) -> Self {
        Self {
            analyzer,
            image_program: image_program.into(),
            fallback,
        }
    }

    async fn run_image(&self, args: &ImageArgs) -> ProcessOutput {
        let outcome = match cli::validate_input(args) {
            Some(rejected) => Ok(rejected),
            None => cli::analyze_and_save(&self.analyzer, args).await,
        };

        match outcome {
            Ok(outcome) => ProcessOutput {
                exit_code: Some(outcome.exit_code()),
                stdout: String::new(),
                stderr: outcome.error().unwrap_or_default().to_string(),
            },
            Err(e) => ProcessOutput {
                exit_code: Some(EXIT_FAILURE),
                stdout: String::new(),
                stderr: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl ProcessInvoker for InProcessInvoker {
    async fn invoke(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, AnalyzeError> {
        if program != self.image_program {
            return self.fallback.invoke(program, args, timeout).await;
        }

        let argv = std::iter::once(program.to_string()).chain(args.iter().cloned());
        let image_args = match ImageArgs::try_parse_from(argv) {
            Ok(image_args) => image_args,
            Err(e) => {
                return Ok(ProcessOutput {
                    exit_code: Some(e.exit_code()),
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        };

        debug!("Analyzing {} in process", image_args.image_path.display());
        tokio::time::timeout(timeout, self.run_image(&image_args))
            .await
            .map_err(|_| AnalyzeError::TimeoutExceeded {
                target: program.to_string(),
                limit: timeout,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::path_resolver::IMAGE_ARTIFACT;
    use crate::batch::{BatchConfig, FolderProcessor};
    use crate::clients::testing::FakeClient;
    use crate::clients::{ClientHandle, ClientRegistry};
    use crate::prompt::PromptBuilder;
    use crate::tool_resolver::VIDEO_ANALYZER;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records delegated calls and leaves a video artifact behind
    #[derive(Default)]
    struct RecordingFallback {
        programs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProcessInvoker for RecordingFallback {
        async fn invoke(
            &self,
            program: &str,
            args: &[String],
            _timeout: Duration,
        ) -> Result<ProcessOutput, AnalyzeError> {
            self.programs.lock().unwrap().push(program.to_string());
            let at = args.iter().position(|a| a == "--output").unwrap();
            let body = serde_json::json!({ "final_description": "a video" });
            std::fs::write(
                std::path::Path::new(&args[at + 1]).join("analysis.json"),
                body.to_string(),
            )
            .unwrap();
            Ok(ProcessOutput {
                exit_code: Some(0),
                ..Default::default()
            })
        }
    }

    fn shared_analyzer(client: FakeClient, dir: &TempDir) -> Arc<ImageAnalyzer> {
        let handle = ClientHandle::new("ollama", Arc::new(client), "llava");
        let registry = ClientRegistry::new("ollama", vec![handle]);
        Arc::new(ImageAnalyzer::new(
            registry,
            PromptBuilder::new(dir.path().join("no-prompts")),
        ))
    }

    #[tokio::test]
    async fn test_batch_runs_images_in_process() {
        let media = TempDir::new().unwrap();
        for name in ["clip.mp4", "a.jpg", "b.png"] {
            std::fs::write(media.path().join(name), b"data").unwrap();
        }
        let out = TempDir::new().unwrap();
        let client = FakeClient::replying("A quiet street.");
        let analyzer = shared_analyzer(client, &out);
        let fallback = Arc::new(RecordingFallback::default());

        let config = BatchConfig {
            output_dir: Some(out.path().to_path_buf()),
            ..Default::default()
        };
        let invoker = InProcessInvoker::new(analyzer, config.image_program.clone(), fallback.clone());
        let results = FolderProcessor::new(config, Arc::new(invoker))
            .with_progress(false)
            .process_folder(media.path())
            .await
            .unwrap();

        assert_eq!(results.get("a.jpg").unwrap().description.as_deref(), Some("A quiet street."));
        assert_eq!(results.get("b.png").unwrap().description.as_deref(), Some("A quiet street."));
        assert_eq!(results.get("clip.mp4").unwrap().description.as_deref(), Some("a video"));
        assert!(out.path().join("image_a").join(IMAGE_ARTIFACT).is_file());
        assert_eq!(*fallback.programs.lock().unwrap(), vec![VIDEO_ANALYZER]);
    }

    #[tokio::test]
    async fn test_failed_analysis_becomes_exit_1() {
        let media = TempDir::new().unwrap();
        std::fs::write(media.path().join("a.jpg"), b"data").unwrap();
        let out = TempDir::new().unwrap();
        let analyzer = shared_analyzer(FakeClient::failing("model not loaded"), &out);

        let config = BatchConfig {
            output_dir: Some(out.path().to_path_buf()),
            ..Default::default()
        };
        let invoker = InProcessInvoker::new(
            analyzer,
            config.image_program.clone(),
            Arc::new(RecordingFallback::default()),
        );
        let results = FolderProcessor::new(config, Arc::new(invoker))
            .with_progress(false)
            .process_folder(media.path())
            .await
            .unwrap();

        let error = results.get("a.jpg").unwrap().error.clone().unwrap();
        assert!(error.starts_with("Return code 1: "), "{}", error);
        assert!(error.contains("model not loaded"), "{}", error);
    }

    #[tokio::test]
    async fn test_bad_arguments_exit_2() {
        let dir = TempDir::new().unwrap();
        let invoker = InProcessInvoker::new(
            shared_analyzer(FakeClient::replying("unused"), &dir),
            "image-analyzer",
            Arc::new(RecordingFallback::default()),
        );

        let output = invoker
            .invoke(
                "image-analyzer",
                &crate::args!["x.jpg", "--whisper-model", "medium"],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(output.exit_code, Some(2));
        assert!(output.stderr.contains("--whisper-model"));
    }
}
