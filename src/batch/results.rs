//! # Batch Results and Checkpointing
//!
//! Questo modulo gestisce la mappa dei risultati del batch e la sua persistenza.
//!
//! ## Strutture dati:
//! - `BatchEntry`: risultato per file (`description` o `error`, tipo, tempi, path)
//! - `BatchResultMap`: mappa filename -> entry, in ordine di elaborazione
//! - `BatchCheckpoint`: riscrive l'intero file JSON dopo ogni elemento
//!
//! ## Strategia di persistence:
//! - Un solo file `media_descriptions.json` nella directory di output
//! - Riscrittura completa (non append) dopo ogni file, riuscito o fallito
//! - Un'interruzione perde al massimo il file in elaborazione
//!
//! ## Esempio file:
//! ```json
//! {
//!   "clip.mp4": {
//!     "description": "...",
//!     "type": "video",
//!     "processing_time": 42.1,
//!     "transcript": "...",
//!     "file_path": "/media/clip.mp4"
//!   },
//!   "broken.jpg": { "error": "Return code 1: ...", "type": "image" }
//! }
//! ```
//! Due file con lo stesso nome in cartelle diverse condividono la chiave:
//! l'ultimo sovrascrive il primo.

use crate::error::AnalyzeError;
use crate::file_manager::MediaKind;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the batch artifact
pub const RESULTS_FILE: &str = "media_descriptions.json";

/// Result recorded for one file of the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl BatchEntry {
    pub fn success(
        media_type: MediaKind,
        description: String,
        transcript: Option<String>,
        processing_time: f64,
        file_path: PathBuf,
    ) -> Self {
        Self {
            description: Some(description),
            error: None,
            media_type,
            processing_time: Some(processing_time),
            transcript,
            file_path: Some(file_path),
        }
    }

    pub fn failure(media_type: MediaKind, error: impl Into<String>) -> Self {
        Self {
            description: None,
            error: Some(error.into()),
            media_type,
            processing_time: None,
            transcript: None,
            file_path: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Filename -> entry, iterated in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResultMap {
    entries: Vec<(String, BatchEntry)>,
    /// Position of each key in `entries`
    index: HashMap<String, usize>,
}

impl BatchResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an overwritten key keeps its original position
    pub fn insert(&mut self, name: impl Into<String>, entry: BatchEntry) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&position) => {
                debug!("Overwriting result for duplicate filename {}", name);
                self.entries[position].1 = entry;
            }
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, entry));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&BatchEntry> {
        self.index.get(name).map(|&position| &self.entries[position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BatchEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the whole map as pretty JSON, replacing any previous content
    pub async fn save(&self, path: &Path) -> Result<(), AnalyzeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AnalyzeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self, AnalyzeError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Serialize for BatchResultMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BatchResultMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = BatchResultMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of filename to batch entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = BatchResultMap::new();
                while let Some((key, entry)) = access.next_entry::<String, BatchEntry>()? {
                    results.insert(key, entry);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// The result map plus the file it is mirrored to
pub struct BatchCheckpoint {
    path: PathBuf,
    results: BatchResultMap,
}

impl BatchCheckpoint {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            results: BatchResultMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn results(&self) -> &BatchResultMap {
        &self.results
    }

    pub fn into_results(self) -> BatchResultMap {
        self.results
    }

    /// Record an entry and rewrite the checkpoint file
    pub async fn record(&mut self, name: &str, entry: BatchEntry) -> Result<(), AnalyzeError> {
        self.results.insert(name, entry);
        self.results.save(&self.path).await
    }
}

/// Render the end-of-batch report
pub fn format_summary(results: &BatchResultMap, results_file: Option<&Path>) -> String {
    use crate::progress::BatchStats;
    use std::fmt::Write;

    let rule = "=".repeat(50);
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(out, "RESULTS:");
    let _ = writeln!(out, "{}", rule);

    for (name, entry) in results.iter() {
        let _ = writeln!(out, "\n {} ({}):", name, entry.media_type.as_str().to_uppercase());
        match (&entry.error, &entry.description) {
            (Some(error), _) => {
                let _ = writeln!(out, "   Error: {}", error);
            }
            (None, Some(description)) => {
                let _ = writeln!(out, "  {}", description);
            }
            (None, None) => {
                let _ = writeln!(out, "  No description");
            }
        }
    }

    let stats = BatchStats::from_results(results);
    let _ = writeln!(
        out,
        "Successfully processed {} out of {} files",
        stats.total_successful(),
        results.len()
    );
    let _ = writeln!(out, "Videos: {}", stats.successful_videos);
    let _ = writeln!(out, "Images: {}", stats.successful_images);
    let _ = writeln!(out, "Failed: {}", stats.failed);
    if let Some(path) = results_file {
        let shown = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let _ = writeln!(out, "Results saved to: {}", shown.display());
    }
    out
}

/// Print the end-of-batch report to stdout
pub fn print_summary(results: &BatchResultMap, results_file: Option<&Path>) {
    print!("{}", format_summary(results, results_file));
}
