//! # Utility Functions Module
//!
//! Small helpers for building and printing external command lines.

/// Token printed in place of a secret
pub const MASK: &str = "*****";

/// Converts a vector of string-like items to Vec<String>.
///
/// # Example
/// ```rust
/// use media_analyzer::utils::to_string_vec;
///
/// let args = to_string_vec(["--model", "gemma3:latest", "--output-dir"]);
/// assert_eq!(args.len(), 3);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Macro for even more convenient argument building.
///
/// # Example
/// ```rust
/// use media_analyzer::args;
///
/// let timeout = 300;
/// let args = args!["--timeout", timeout];
/// assert_eq!(args, vec!["--timeout".to_string(), "300".to_string()]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Replace every occurrence of each non-empty secret with [`MASK`]
pub fn mask_secrets(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|secret| !secret.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret, MASK))
}

/// Render a command line for diagnostics, with secrets masked
pub fn display_command(program: &str, args: &[String], secrets: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    mask_secrets(&line, secrets)
}
