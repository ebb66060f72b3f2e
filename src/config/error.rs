//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Join `(field, message)` problems into one validation error.
    pub fn from_problems(problems: &[(&str, String)]) -> Self {
        let lines: Vec<String> = problems
            .iter()
            .map(|(field, message)| format!("[{field}] {message}"))
            .collect();
        Self::Validation(lines.join("; "))
    }
}
