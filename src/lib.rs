//! # Media Analyzer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per i due binari e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione dei client vision e override da CLI/env
//! - `error`: Tipi di errore custom per analisi e client
//! - `clients`: Trait `VisionClient`, client Ollama/OpenAI e registry
//! - `prompt`: Costruzione del prompt da template
//! - `analyzer`: Analisi di un singolo file e persistenza del record
//! - `batch`: Driver per intere cartelle, con processi esterni o in-process
//! - `cli`: Argomenti ed exit code dei due binari
//! - `file_manager`: Discovery dei media e MIME type
//! - `progress`: Progress bar e statistiche del batch
//! - `tool_resolver`: Ricerca dei programmi analyzer
//! - `logging`: Setup di `tracing-subscriber`
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use media_analyzer::{AnalyzeOptions, ClientRegistry, Config, ImageAnalyzer, PromptBuilder};
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load(None).await?;
//! let registry = ClientRegistry::from_config(&config)?;
//! let analyzer = ImageAnalyzer::new(registry, PromptBuilder::from_current_dir());
//! let record = analyzer
//!     .analyze(std::path::Path::new("photo.jpg"), &AnalyzeOptions::default())
//!     .await;
//! ImageAnalyzer::save(&record, std::path::Path::new("output")).await?;
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod batch;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod logging;
pub mod progress;
pub mod prompt;
pub mod tool_resolver;
pub mod utils;

pub use analyzer::{AnalysisRecord, AnalyzeOptions, ImageAnalyzer};
pub use batch::{BatchConfig, BatchResultMap, FolderProcessor, InProcessInvoker, SubprocessInvoker};
pub use clients::{ClientHandle, ClientRegistry, VisionClient};
pub use config::{ClientKind, Config, ConfigOverrides};
pub use error::{AnalyzeError, ClientError};
pub use file_manager::{FileManager, MediaKind};
pub use prompt::PromptBuilder;
