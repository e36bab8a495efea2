//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche del batch.
//!
//! ## Componenti principali:
//! - `ProgressManager`: barra di progresso `indicatif` sul numero di file
//! - `BatchStats`: contatori di video riusciti, immagini riuscite e fallimenti
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========>-------------------------------] 3/14 (21%) IMAGE beach.jpg
//! ```
//!
//! Le righe per l'operatore passano da `ProgressManager::println`, che scrive
//! sopra la barra quando è visibile e su stdout quando è nascosta.

use crate::batch::results::{BatchEntry, BatchResultMap};
use crate::file_manager::MediaKind;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A manager that never draws
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Set a custom message without incrementing
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Advance by one processed item
    pub fn advance(&self) {
        self.bar.inc(1);
    }

    /// Print an operator-facing line without corrupting the bar
    pub fn println(&self, line: impl AsRef<str>) {
        if self.bar.is_hidden() {
            println!("{}", line.as_ref());
        } else {
            self.bar.println(line.as_ref());
        }
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Outcome counters for a batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub successful_videos: usize,
    pub successful_images: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: &BatchEntry) {
        if entry.is_success() {
            match entry.media_type {
                MediaKind::Video => self.successful_videos += 1,
                MediaKind::Image => self.successful_images += 1,
            }
        } else {
            self.failed += 1;
        }
    }

    pub fn from_results(results: &BatchResultMap) -> Self {
        let mut stats = Self::new();
        for (_, entry) in results.iter() {
            stats.record(entry);
        }
        stats
    }

    pub fn total_successful(&self) -> usize {
        self.successful_videos + self.successful_images
    }

    pub fn total(&self) -> usize {
        self.total_successful() + self.failed
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Videos: {} | Images: {} | Failed: {}",
            self.total(),
            self.successful_videos,
            self.successful_images,
            self.failed
        )
    }
}
