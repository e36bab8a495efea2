//! # Folder Processor
//!
//! Driver del batch: scopre i media in una cartella e li analizza uno alla
//! volta lanciando gli analyzer esterni.
//!
//! ## Flusso per elemento:
//! 1. Path assoluto e directory di output dell'elemento
//! 2. Invocazione dell'analyzer con timeout (default 300s)
//! 3. Lettura dell'artifact JSON a path fisso ed estrazione della descrizione
//! 4. Checkpoint di tutta la mappa dei risultati su disco
//!
//! ## Isolamento:
//! Ogni errore di un elemento diventa una entry `{error, type}` e il batch
//! prosegue. Solo una cartella di input inesistente interrompe il batch.
//!
//! ## Ordine:
//! Tutti i video, poi tutte le immagini, sempre in sequenza.

use crate::batch::extract;
use crate::batch::invoker::ProcessInvoker;
use crate::batch::path_resolver::PathResolver;
use crate::batch::results::{BatchCheckpoint, BatchEntry, BatchResultMap};
use crate::config::{ClientKind, API_KEY_ENV};
use crate::error::AnalyzeError;
use crate::file_manager::{FileManager, MediaKind};
use crate::progress::{BatchStats, ProgressManager};
use crate::prompt::preview;
use crate::tool_resolver::{IMAGE_ANALYZER, VIDEO_ANALYZER};
use crate::utils::display_command;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Model used when none is given
pub const DEFAULT_MODEL: &str = "gemma3:latest";

/// Whisper model forwarded to the video analyzer
pub const DEFAULT_WHISPER_MODEL: &str = "medium";

/// Per-item bound on the external analyzer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Endpoint used when the model name implies OpenAI
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Error recorded when an analyzer succeeds without leaving its artifact
pub const NO_JSON_OUTPUT: &str = "No JSON output found";

/// Length of the description preview printed after each item
const PREVIEW_CHARS: usize = 100;

/// Settings of one batch run
#[derive(Clone)]
pub struct BatchConfig {
    pub model: String,
    /// Explicit client; when `None` it is inferred from the model name
    pub client: Option<ClientKind>,
    pub prompt: Option<String>,
    pub whisper_model: String,
    pub output_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub image_program: String,
    pub video_program: String,
    pub api_key: Option<String>,
    /// OpenAI-compatible endpoint; `OPENAI_API_URL` when unset
    pub api_url: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            client: None,
            prompt: None,
            whisper_model: DEFAULT_WHISPER_MODEL.to_string(),
            output_dir: None,
            timeout: DEFAULT_TIMEOUT,
            image_program: IMAGE_ANALYZER.to_string(),
            video_program: VIDEO_ANALYZER.to_string(),
            api_key: None,
            api_url: None,
        }
    }
}

impl std::fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchConfig")
            .field("model", &self.model)
            .field("client", &self.client)
            .field("prompt", &self.prompt)
            .field("whisper_model", &self.whisper_model)
            .field("output_dir", &self.output_dir)
            .field("timeout", &self.timeout)
            .field("image_program", &self.image_program)
            .field("video_program", &self.video_program)
            .field("api_key", &self.api_key.as_ref().map(|_| crate::utils::MASK))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl BatchConfig {
    /// Pick up the API key from the environment when none is set
    pub fn with_env_api_key(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty());
        }
        self
    }

    pub fn validate(&self) -> Result<(), AnalyzeError> {
        if self.model.trim().is_empty() {
            return Err(AnalyzeError::Config("model must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(AnalyzeError::Config("timeout must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Whether invocations are routed to the OpenAI API
    pub fn uses_openai(&self) -> bool {
        match self.client {
            Some(kind) => kind == ClientKind::OpenaiApi,
            None => self.model.to_lowercase().contains("gpt"),
        }
    }

    /// Endpoint forwarded with `--api-url` whenever OpenAI is used
    pub fn openai_api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(OPENAI_API_URL)
    }
}

/// Processes every media file of a folder through the external analyzers
pub struct FolderProcessor {
    config: BatchConfig,
    invoker: Arc<dyn ProcessInvoker>,
    show_progress: bool,
}

impl FolderProcessor {
    pub fn new(config: BatchConfig, invoker: Arc<dyn ProcessInvoker>) -> Self {
        Self {
            config,
            invoker,
            show_progress: true,
        }
    }

    /// Disable the progress bar (per-item lines still go to stdout)
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Where the checkpoint file is written
    pub fn results_path(&self) -> PathBuf {
        PathResolver::results_path(self.config.output_dir.as_deref())
    }

    fn program(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Video => &self.config.video_program,
            MediaKind::Image => &self.config.image_program,
        }
    }

    /// Command line arguments for one analyzer invocation
    pub fn build_args(&self, kind: MediaKind, media_path: &Path, item_dir: &Path) -> Vec<String> {
        let mut args = vec![media_path.to_string_lossy().to_string()];

        if let Some(ref prompt) = self.config.prompt {
            args.extend(crate::args!["--prompt", prompt]);
        }

        match self.config.client {
            Some(kind) => args.extend(crate::args!["--client", kind.as_str()]),
            None if self.config.uses_openai() => {
                args.extend(crate::args!["--client", ClientKind::OpenaiApi.as_str()]);
            }
            None => {}
        }

        if self.config.uses_openai() {
            args.extend(crate::args!["--api-url", self.config.openai_api_url()]);
            if let Some(ref key) = self.config.api_key {
                args.extend(crate::args!["--api-key", key]);
            }
        }

        args.extend(crate::args!["--model", self.config.model]);

        match kind {
            MediaKind::Video => {
                args.extend(crate::args!["--whisper-model", self.config.whisper_model]);
                args.extend(crate::args!["--output", item_dir.display()]);
            }
            MediaKind::Image => {
                args.extend(crate::args!["--output-dir", item_dir.display()]);
            }
        }

        args
    }

    fn secrets(&self) -> Vec<&str> {
        self.config.api_key.iter().map(String::as_str).collect()
    }

    /// Process all videos, then all images, checkpointing after every item
    pub async fn process_folder(&self, folder: &Path) -> Result<BatchResultMap, AnalyzeError> {
        let (videos, images) = FileManager::find_media(folder)?;
        let total = videos.len() + images.len();

        if total == 0 {
            println!("No video or image files found in directory");
            return Ok(BatchResultMap::new());
        }

        println!(
            "[Found files: {} videos, {} images, {} total]",
            videos.len(),
            images.len(),
            total
        );
        info!("Starting batch over {} files in {}", total, folder.display());

        let progress = if self.show_progress {
            ProgressManager::new(total as u64)
        } else {
            ProgressManager::hidden()
        };

        let mut checkpoint = BatchCheckpoint::new(self.results_path());

        let queue = videos
            .into_iter()
            .map(|path| (MediaKind::Video, path))
            .chain(images.into_iter().map(|path| (MediaKind::Image, path)));

        for (index, (kind, path)) in queue.enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            let label = kind.as_str().to_uppercase();

            progress.println(format!("\nProcessing {} {}/{}: {}", label, index + 1, total, name));
            progress.set_message(&format!("{} {}", label, name));

            let entry = self.process_item(kind, &path, &name, &progress).await;

            match (&entry.error, &entry.description) {
                (Some(error), _) => progress.println(format!("Error: {}", error)),
                (None, Some(description)) => progress.println(preview(description, PREVIEW_CHARS)),
                (None, None) => {}
            }

            if let Err(e) = checkpoint.record(&name, entry).await {
                error!("Failed to write checkpoint {}: {}", checkpoint.path().display(), e);
            }
            progress.advance();
        }

        let stats = BatchStats::from_results(checkpoint.results());
        progress.finish(&stats.format_summary());
        info!("{}", stats.format_summary());

        Ok(checkpoint.into_results())
    }

    /// Analyze one item; never fails, errors become failure entries
    async fn process_item(
        &self,
        kind: MediaKind,
        path: &Path,
        name: &str,
        progress: &ProgressManager,
    ) -> BatchEntry {
        let abs_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        match self.run_item(kind, &abs_path, name, progress).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("{} failed: {}", name, e);
                BatchEntry::failure(kind, e.to_string())
            }
        }
    }

    async fn run_item(
        &self,
        kind: MediaKind,
        abs_path: &Path,
        name: &str,
        progress: &ProgressManager,
    ) -> Result<BatchEntry, AnalyzeError> {
        // Kept alive until the artifact is read; a temp dir is removed on drop.
        let item_dir =
            PathResolver::prepare_item_dir(self.config.output_dir.as_deref(), kind, abs_path).await?;
        // A reused dir may still hold the artifact of another run or another file.
        PathResolver::clear_artifact(item_dir.path(), kind).await?;

        let program = self.program(kind);
        let args = self.build_args(kind, abs_path, item_dir.path());
        progress.println(format!(
            "Running command: {}",
            display_command(program, &args, &self.secrets())
        ));

        let start_time = Instant::now();
        let output = match self.invoker.invoke(program, &args, self.config.timeout).await {
            Ok(output) => output,
            Err(AnalyzeError::TimeoutExceeded { limit, .. }) => {
                return Err(AnalyzeError::TimeoutExceeded {
                    target: name.to_string(),
                    limit,
                })
            }
            Err(e) => return Err(e),
        };
        let processing_time = start_time.elapsed().as_secs_f64();

        if !output.success() {
            let message = match output.exit_code {
                Some(code) => format!("Return code {}: {}", code, output.stderr.trim_end()),
                None => format!("Terminated by signal: {}", output.stderr.trim_end()),
            };
            return Ok(BatchEntry::failure(kind, message));
        }

        let artifact_path = PathResolver::artifact_path(item_dir.path(), kind);
        if !artifact_path.is_file() {
            debug!("Expected artifact missing: {}", artifact_path.display());
            return Ok(BatchEntry::failure(kind, NO_JSON_OUTPUT));
        }

        let content = tokio::fs::read_to_string(&artifact_path).await?;
        let artifact: serde_json::Value = serde_json::from_str(&content)?;
        let extracted = extract::extract(&artifact)?;

        let transcript = match kind {
            MediaKind::Video => extracted.transcript,
            MediaKind::Image => None,
        };

        Ok(BatchEntry::success(
            kind,
            extracted.description,
            transcript,
            processing_time,
            abs_path.to_path_buf(),
        ))
    }
}
