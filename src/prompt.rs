//! Analysis prompt construction.
//!
//! The template is read from `prompts/image.txt`, looked up from the base
//! directory and up to two parent levels. The `{prompt}` marker is replaced
//! once, either with `I want to know: <question>` or with nothing.

use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Substitution point inside a template
pub const PROMPT_MARKER: &str = "{prompt}";

const TEMPLATE_DIR: &str = "prompts";
const TEMPLATE_FILE: &str = "image.txt";

/// Used when no template file can be found
pub const FALLBACK_TEMPLATE: &str = "Analyze this image and provide a detailed description of what you see.
Include information about:
- Objects and people in the image
- Actions or activities taking place
- Setting and environment
- Colors, lighting, and composition
- Any text or signs visible

{prompt}

Provide a clear, detailed description in paragraph form.";

/// Builds analysis prompts from the first template found on disk
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    base_dir: PathBuf,
}

impl PromptBuilder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Search relative to the process working directory
    pub fn from_current_dir() -> Self {
        Self::new(".")
    }

    /// Candidate template locations, most specific first
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let up_one = self.base_dir.join("..");
        let up_two = up_one.join("..");
        [self.base_dir.clone(), up_one, up_two]
            .into_iter()
            .map(|dir| dir.join(TEMPLATE_DIR).join(TEMPLATE_FILE))
            .collect()
    }

    /// Load the template text, falling back to the built-in one
    pub fn load_template(&self) -> String {
        for path in self.candidate_paths() {
            if !path.is_file() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) if !text.is_empty() => {
                    info!("Prompt loaded from {}", path.display());
                    return text;
                }
                Ok(_) => debug!("Skipping empty prompt file {}", path.display()),
                Err(e) => warn!("Failed to read prompt file {}: {}", path.display(), e),
            }
        }

        warn!("Prompt file not found, using fallback prompt");
        FALLBACK_TEMPLATE.to_string()
    }

    /// Build the final prompt, injecting the optional user question
    pub fn build(&self, custom_question: Option<&str>) -> String {
        let template = self.load_template();
        Self::render(&template, custom_question)
    }

    /// Replace the marker in `template`; nothing else is touched
    pub fn render(template: &str, custom_question: Option<&str>) -> String {
        if !template.contains(PROMPT_MARKER) {
            warn!("Prompt template has no {} marker, custom question ignored", PROMPT_MARKER);
            return template.to_string();
        }

        let injection = match custom_question.filter(|q| !q.is_empty()) {
            Some(question) => {
                debug!("Injecting custom prompt: {}", preview(question, 50));
                format!("I want to know: {}", question)
            }
            None => String::new(),
        };

        template.replacen(PROMPT_MARKER, &injection, 1)
    }
}

/// First `limit` characters, with an ellipsis when cut
pub fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
