//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery di media.
//!
//! ## Responsabilità:
//! - Discovery non ricorsiva di file media in una cartella
//! - Determinazione tipo file (immagine vs video) e MIME type
//! - Validazione dei file immagine passati alla CLI
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati supportati:
//! - **Immagini**: JPG, JPEG, PNG, GIF, WebP, BMP
//! - **Video**: MP4, AVI, MOV, MKV, WMV, FLV, WebM, M4V
//!
//! ## Ordine di discovery:
//! Per ogni estensione (nell'ordine della tabella) prima la variante minuscola,
//! poi quella maiuscola; dentro ogni estensione i file sono in ordine alfabetico.
//! Tutti i video precedono tutte le immagini.
//!
//! ## Esempio:
//! ```rust,ignore
//! let (videos, images) = FileManager::find_media(Path::new("/path/to/media"))?;
//! let mime = FileManager::mime_type(Path::new("photo.PNG")); // "image/png"
//! ```

use crate::error::AnalyzeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Video extensions, in discovery order
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v"];

/// Image extensions, in discovery order
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// MIME type used when the extension is not in the table
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Kind of media handled by the batch driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find videos and images directly inside `folder`, videos first
    pub fn find_media(folder: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), AnalyzeError> {
        if !folder.is_dir() {
            return Err(AnalyzeError::MediaNotFound(format!(
                "Directory not found: {}",
                folder.display()
            )));
        }

        let mut entries: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                AnalyzeError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
                }))
            })?;
            if entry.file_type().is_file() {
                entries.push(entry.into_path());
            }
        }
        entries.sort();

        let videos = Self::collect_by_extension(&entries, VIDEO_EXTENSIONS);
        let images = Self::collect_by_extension(&entries, IMAGE_EXTENSIONS);
        Ok((videos, images))
    }

    /// Emulates `*.ext` then `*.EXT` globbing over a sorted listing
    fn collect_by_extension(entries: &[PathBuf], extensions: &[&str]) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for ext in extensions {
            for variant in [ext.to_string(), ext.to_uppercase()] {
                found.extend(
                    entries
                        .iter()
                        .filter(|path| {
                            path.extension().and_then(|e| e.to_str()) == Some(variant.as_str())
                        })
                        .cloned(),
                );
            }
        }
        found
    }

    fn lowercase_extension(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Check if a file is an image
    pub fn is_image(path: &Path) -> bool {
        Self::lowercase_extension(path)
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// MIME type from the extension; unknown extensions fall back to `image/jpeg`
    pub fn mime_type(path: &Path) -> &'static str {
        match Self::lowercase_extension(path).as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("bmp") => "image/bmp",
            _ => DEFAULT_MIME_TYPE,
        }
    }

    /// Check that a path exists and is a supported image
    pub fn validate_image(path: &Path) -> Result<(), AnalyzeError> {
        if !path.exists() {
            return Err(AnalyzeError::MediaNotFound(path.display().to_string()));
        }
        if !Self::is_image(path) {
            let ext = Self::lowercase_extension(path).unwrap_or_default();
            return Err(AnalyzeError::UnsupportedFormat(format!(
                ".{} (supported: {})",
                ext,
                IMAGE_EXTENSIONS
                    .iter()
                    .map(|e| format!(".{}", e))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
