//! # Analyzer Program Resolver
//!
//! Finds the external single-item analyzers the batch driver shells out to:
//! - Environment override (`IMAGE_ANALYZER_BIN`, `VIDEO_ANALYZER_BIN`)
//! - Installed next to the running executable (cargo target dir, packaged install)
//! - System `PATH`
//!
//! When nothing matches, the bare program name is returned and the spawn
//! error surfaces as a per-item failure.

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Single-image analyzer shipped with this crate
pub const IMAGE_ANALYZER: &str = "image-analyzer";

/// External video analyzer
pub const VIDEO_ANALYZER: &str = "video-analyzer";

/// Resolves analyzer program paths
#[derive(Debug, Clone, Default)]
pub struct ToolResolver {
    exe_dir: Option<PathBuf>,
}

impl ToolResolver {
    pub fn new() -> Self {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        debug!("Executable directory: {:?}", exe_dir);
        Self { exe_dir }
    }

    /// Environment variable that overrides a tool location
    pub fn env_override_name(tool_name: &str) -> String {
        format!("{}_BIN", tool_name.replace('-', "_").to_uppercase())
    }

    /// Resolve a tool to the program string passed to the invoker
    pub fn resolve(&self, tool_name: &str) -> String {
        if let Ok(path) = env::var(Self::env_override_name(tool_name)) {
            if !path.is_empty() {
                debug!("Using {} from environment: {}", tool_name, path);
                return path;
            }
        }

        if let Some(ref dir) = self.exe_dir {
            let sibling = dir.join(executable_name(tool_name));
            if sibling.is_file() {
                debug!("Found {} next to executable: {:?}", tool_name, sibling);
                return sibling.to_string_lossy().to_string();
            }
        }

        if let Some(path) = find_in_system_path(tool_name) {
            debug!("Found {} in PATH: {:?}", tool_name, path);
            return path.to_string_lossy().to_string();
        }

        tool_name.to_string()
    }

    /// Check if a tool can be found anywhere
    pub fn is_available(&self, tool_name: &str) -> bool {
        let resolved = self.resolve(tool_name);
        Path::new(&resolved).is_file()
    }
}

fn executable_name(tool_name: &str) -> String {
    let extension = if cfg!(windows) { ".exe" } else { "" };
    format!("{}{}", tool_name, extension)
}

/// Find tool in system PATH
fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
    let tool_with_ext = executable_name(tool_name);
    env::split_paths(&env::var_os("PATH")?)
        .map(|dir| dir.join(&tool_with_ext))
        .find(|path| path.is_file())
}
