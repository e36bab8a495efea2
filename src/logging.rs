//! # Logging Setup
//!
//! Inizializzazione condivisa di `tracing-subscriber` per entrambi i binari.
//! I log vanno su stderr; stdout resta per l'output destinato all'operatore.
//! `RUST_LOG`, se presente, ha la precedenza sul livello da CLI.

use tracing_subscriber::EnvFilter;

/// Level names accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn to_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

/// Effective level: `--verbose` forces DEBUG
pub fn effective_level(level: LogLevel, verbose: bool) -> tracing::Level {
    if verbose {
        tracing::Level::DEBUG
    } else {
        level.to_tracing()
    }
}

/// Install the global subscriber
pub fn init(level: LogLevel, verbose: bool) -> anyhow::Result<()> {
    let level = effective_level(level, verbose);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
