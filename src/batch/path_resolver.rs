//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path del batch.
//!
//! ## Layout con `--output-dir`:
//! ```text
//! <output>/
//! ├── media_descriptions.json
//! ├── video_clip/analysis.json
//! └── image_beach/image_analysis.json
//! ```
//! Senza output directory ogni elemento usa una directory temporanea,
//! cancellata appena l'artifact è stato letto.

use crate::batch::results::RESULTS_FILE;
use crate::error::AnalyzeError;
use crate::file_manager::MediaKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Artifact written by the video analyzer
pub const VIDEO_ARTIFACT: &str = "analysis.json";

/// Artifact written by the image analyzer
pub const IMAGE_ARTIFACT: &str = crate::analyzer::ANALYSIS_FILE;

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// `{video|image}_{stem}`
    pub fn item_dir_name(kind: MediaKind, media_path: &Path) -> Result<String, AnalyzeError> {
        let file_stem = media_path
            .file_stem()
            .ok_or_else(|| AnalyzeError::MediaNotFound(format!("Invalid file name: {}", media_path.display())))?
            .to_string_lossy();
        Ok(format!("{}_{}", kind.as_str(), file_stem))
    }

    pub fn artifact_name(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::Video => VIDEO_ARTIFACT,
            MediaKind::Image => IMAGE_ARTIFACT,
        }
    }

    pub fn artifact_path(item_dir: &Path, kind: MediaKind) -> PathBuf {
        item_dir.join(Self::artifact_name(kind))
    }

    /// Checkpoint file for a batch; the current directory when no output dir is set
    pub fn results_path(output_dir: Option<&Path>) -> PathBuf {
        match output_dir {
            Some(dir) => dir.join(RESULTS_FILE),
            None => PathBuf::from(RESULTS_FILE),
        }
    }

    /// Remove a leftover artifact so only the next invocation can produce it
    pub async fn clear_artifact(item_dir: &Path, kind: MediaKind) -> Result<(), AnalyzeError> {
        let artifact = Self::artifact_path(item_dir, kind);
        match tokio::fs::remove_file(&artifact).await {
            Ok(()) => {
                debug!("Removed stale artifact {}", artifact.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Create (or reuse) the per-item output directory
    pub async fn prepare_item_dir(
        output_dir: Option<&Path>,
        kind: MediaKind,
        media_path: &Path,
    ) -> Result<ItemDir, AnalyzeError> {
        match output_dir {
            Some(dir) => {
                let item_dir = dir.join(Self::item_dir_name(kind, media_path)?);
                tokio::fs::create_dir_all(&item_dir).await?;
                debug!("Resolved item dir: {} -> {}", media_path.display(), item_dir.display());
                Ok(ItemDir::Persistent(item_dir))
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix(&format!("{}_", kind.as_str()))
                    .tempdir()?;
                debug!("Using temporary dir {} for {}", temp.path().display(), media_path.display());
                Ok(ItemDir::Ephemeral(temp))
            }
        }
    }
}

/// Output directory of one item; the ephemeral variant is removed on drop
#[derive(Debug)]
pub enum ItemDir {
    Persistent(PathBuf),
    Ephemeral(TempDir),
}

impl ItemDir {
    pub fn path(&self) -> &Path {
        match self {
            ItemDir::Persistent(path) => path,
            ItemDir::Ephemeral(temp) => temp.path(),
        }
    }
}
