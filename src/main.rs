//! # Image Analyzer - Main Entry Point
//!
//! Questo è il punto di ingresso della CLI per l'analisi di una singola immagine.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Validazione dell'immagine in input
//! - Caricamento della configurazione e avvio dell'analisi
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (immagine, client, model, prompt, output)
//! 2. Configura il logging (`--log-level`, `--verbose` forza DEBUG)
//! 3. Valida che l'immagine esista e abbia un formato supportato
//! 4. Carica la configurazione e applica env e override da CLI
//! 5. Analizza, salva `image_analysis.json` e mostra un'anteprima
//!
//! ## Exit code:
//! - `0` analisi completata e salvata
//! - `1` validazione o analisi fallita
//! - `130` interrotto dall'utente (Ctrl-C)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-analyzer photo.jpg --prompt "What objects are in this image?"
//! image-analyzer photo.jpg --client openai_api --model gpt-4o --output-dir ./results
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, warn};

use media_analyzer::cli::{self, ImageArgs, ImageOutcome, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS};
use media_analyzer::logging;
use media_analyzer::prompt::preview;
use media_analyzer::{ClientRegistry, Config, FileManager, ImageAnalyzer, PromptBuilder};

const PREVIEW_CHARS: usize = 200;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ImageArgs::parse();

    logging::init(args.log_level, args.verbose)?;

    info!("Image Analyzer started");
    debug!("Image: {}", args.image_path.display());
    debug!("Output: {}", args.output_dir.display());

    if let Some(rejected) = cli::validate_input(&args) {
        std::process::exit(rejected.exit_code());
    }

    let code = tokio::select! {
        result = run(&args) => match result {
            Ok(code) => code,
            Err(e) => {
                error!("Unexpected error: {:#}", e);
                println!("Unexpected error: {:#}", e);
                EXIT_FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Analysis interrupted by user");
            println!("\nAnalysis interrupted by user");
            EXIT_INTERRUPTED
        }
    };

    if code != EXIT_SUCCESS {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(args: &ImageArgs) -> Result<i32> {
    let mut config = Config::load(args.config.as_deref()).await?;
    config.apply_env();
    config.apply_overrides(&args.overrides());
    config.validate()?;

    info!("Creating image analyzer");
    let analyzer = ImageAnalyzer::new(ClientRegistry::from_config(&config)?, PromptBuilder::from_current_dir());
    debug!(
        "Config loaded: {} client(s) configured, default {}",
        analyzer.registry().len(),
        analyzer.registry().default_client()
    );

    let outcome = cli::analyze_and_save(&analyzer, args).await?;
    report(&outcome);
    Ok(outcome.exit_code())
}

fn report(outcome: &ImageOutcome) {
    let (record, output_file) = match outcome {
        ImageOutcome::Saved { record, output_file } => (record, output_file),
        ImageOutcome::Rejected(message) | ImageOutcome::Failed(message) => {
            println!("Analysis failed: {}", message);
            return;
        }
    };

    let shown = std::path::absolute(output_file).unwrap_or_else(|_| output_file.clone());
    println!("✓ Analysis complete!");
    println!("Results saved to: {}", shown.display());

    let description = record.description().unwrap_or("No description available");
    println!("\nDescription:");
    println!("   {}", preview(description, PREVIEW_CHARS));

    if let Some(analysis) = record.analysis() {
        debug!("Client used: {}", analysis.client);
        debug!("Model used: {}", analysis.model);
    }
    if let Some(size) = record.metadata.file_size {
        debug!("File size: {}", FileManager::format_size(size));
    }
}
