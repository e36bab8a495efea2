//! # Batch Module
//!
//! Questo modulo contiene il driver che analizza un'intera cartella di media.
//!
//! ## Componenti:
//! - `folder_processor`: discovery, loop sequenziale, checkpoint
//! - `invoker`: astrazione sull'esecuzione dei processi esterni
//! - `in_process`: analisi delle immagini senza lanciare processi
//! - `extract`: contratto unico di estrazione della descrizione
//! - `path_resolver`: directory per elemento e path degli artifact
//! - `results`: mappa dei risultati, checkpoint e summary finale

pub mod extract;
pub mod folder_processor;
pub mod in_process;
pub mod invoker;
pub mod path_resolver;
pub mod results;

pub use folder_processor::{BatchConfig, FolderProcessor};
pub use in_process::InProcessInvoker;
pub use invoker::{ProcessInvoker, ProcessOutput, SubprocessInvoker};
pub use results::{print_summary, BatchCheckpoint, BatchEntry, BatchResultMap};
