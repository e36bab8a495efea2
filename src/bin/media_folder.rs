//! # Media Folder - Batch Entry Point
//!
//! Analizza tutti i video e le immagini di una cartella lanciando
//! `video-analyzer` e `image-analyzer` per ogni file.
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI e configura il logging
//! 2. Risolve i programmi analyzer (flag, env `*_BIN`, accanto all'eseguibile, PATH)
//! 3. Processa la cartella con checkpoint dopo ogni file
//! 4. Salva `media_descriptions.json` e stampa il summary
//!
//! Il processo termina con successo anche se tutti i file falliscono;
//! solo una cartella inesistente o una configurazione non valida danno exit 1.
//!
//! Con `--in-process` le immagini vengono analizzate da un `ImageAnalyzer`
//! condiviso, configurato come `image-analyzer`; i video passano sempre
//! dal processo esterno.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-folder ./holiday --output-dir ./analysis --model gpt-4.1-nano
//! media-folder ./holiday --output-dir ./analysis --in-process
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use media_analyzer::batch::folder_processor::{DEFAULT_MODEL, DEFAULT_WHISPER_MODEL};
use media_analyzer::batch::{print_summary, ProcessInvoker};
use media_analyzer::cli::{self, EXIT_INTERRUPTED, EXIT_SUCCESS};
use media_analyzer::logging::{self, LogLevel};
use media_analyzer::tool_resolver::{ToolResolver, IMAGE_ANALYZER, VIDEO_ANALYZER};
use media_analyzer::{
    BatchConfig, ClientKind, ClientRegistry, Config, ConfigOverrides, FolderProcessor, ImageAnalyzer,
    InProcessInvoker, PromptBuilder, SubprocessInvoker,
};

#[derive(Parser)]
#[command(name = "media-folder")]
#[command(about = "Describe every video and image in a folder")]
struct Args {
    /// Folder containing the media files
    folder: PathBuf,

    /// Directory for per-file outputs and media_descriptions.json
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Model to use (names containing "gpt" are sent to the OpenAI API)
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Client passed to the analyzers (default: inferred from the model)
    #[arg(long, value_enum)]
    client: Option<ClientKind>,

    /// OpenAI-compatible endpoint (default: https://api.openai.com/v1)
    #[arg(long)]
    api_url: Option<String>,

    /// Custom prompt for the analysis
    #[arg(short, long)]
    prompt: Option<String>,

    /// Whisper model for audio transcription
    #[arg(long, default_value = DEFAULT_WHISPER_MODEL)]
    whisper_model: String,

    /// Image analyzer program
    #[arg(long)]
    image_analyzer: Option<String>,

    /// Video analyzer program
    #[arg(long)]
    video_analyzer: Option<String>,

    /// Analyze images inside this process instead of spawning the image analyzer
    #[arg(long)]
    in_process: bool,

    /// Config file for in-process analysis
    #[arg(long, requires = "in_process")]
    config: Option<PathBuf>,

    /// Per-file timeout in seconds
    #[arg(short, long, default_value = "300")]
    timeout: u64,

    /// Set the logging level
    #[arg(long, value_enum, default_value = "INFO")]
    log_level: LogLevel,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(args.log_level, args.verbose)?;

    let resolver = ToolResolver::new();
    let image_program = program_for(&resolver, args.image_analyzer.clone(), IMAGE_ANALYZER, args.in_process);
    let video_program = program_for(&resolver, args.video_analyzer.clone(), VIDEO_ANALYZER, false);

    let config = BatchConfig {
        model: args.model.clone(),
        client: args.client,
        prompt: args.prompt.clone(),
        whisper_model: args.whisper_model.clone(),
        output_dir: args.output_dir.clone(),
        timeout: Duration::from_secs(args.timeout),
        image_program,
        video_program,
        api_key: None,
        api_url: args.api_url.clone(),
    }
    .with_env_api_key();
    config.validate()?;

    let invoker: Arc<dyn ProcessInvoker> = if args.in_process {
        Arc::new(in_process_invoker(&args, &config).await?)
    } else {
        Arc::new(SubprocessInvoker)
    };

    let processor = FolderProcessor::new(config, invoker);
    debug!("Batch config: {:?}", processor.config());
    let results_path = processor.results_path();

    let outcome = tokio::select! {
        outcome = processor.process_folder(&args.folder) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Batch interrupted by user");
            println!("\nInterrupted. Completed files are in {}", results_path.display());
            std::process::exit(EXIT_INTERRUPTED);
        }
    };

    let code = cli::batch_exit_code(&outcome);
    let results = match outcome {
        Ok(results) => results,
        Err(e) => {
            error!("{}", e);
            println!("Error: {}", e);
            std::process::exit(code);
        }
    };

    if !results.is_empty() {
        results.save(&results_path).await?;
        info!("Results written to {}", results_path.display());
        print_summary(&results, Some(&results_path));
    }

    if code != EXIT_SUCCESS {
        std::process::exit(code);
    }
    Ok(())
}

/// Explicit flag first, otherwise resolve and warn when nothing is installed
fn program_for(resolver: &ToolResolver, explicit: Option<String>, tool: &str, in_process: bool) -> String {
    if let Some(program) = explicit {
        return program;
    }
    if !in_process && !resolver.is_available(tool) {
        warn!(
            "{} not found (set {} or use --{}); its files will fail",
            tool,
            ToolResolver::env_override_name(tool),
            tool
        );
    }
    resolver.resolve(tool)
}

/// Shared analyzer built the way `image-analyzer` builds it
async fn in_process_invoker(args: &Args, batch: &BatchConfig) -> Result<InProcessInvoker> {
    let mut config = Config::load(args.config.as_deref()).await?;
    config.apply_env();
    config.apply_overrides(&ConfigOverrides {
        client: batch.client.or(batch.uses_openai().then_some(ClientKind::OpenaiApi)),
        model: Some(args.model.clone()),
        api_key: batch.api_key.clone(),
        api_url: batch.uses_openai().then(|| batch.openai_api_url().to_string()),
    });
    config.validate()?;

    let analyzer = ImageAnalyzer::new(ClientRegistry::from_config(&config)?, PromptBuilder::from_current_dir());
    info!("In-process image analysis with {} client(s)", analyzer.registry().len());
    Ok(InProcessInvoker::new(
        Arc::new(analyzer),
        batch.image_program.clone(),
        Arc::new(SubprocessInvoker),
    ))
}
