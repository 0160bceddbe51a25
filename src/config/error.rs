//! Configuration error types.

use owo_colors::OwoColorize;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("{}", format_validation(.0))]
    Validation(Vec<String>),
}

fn format_validation(errors: &[String]) -> String {
    let mut out = format!("{}", "config validation failed:".red().bold());
    for error in errors {
        out.push_str(&format!("\n{} {}", "→".red(), error));
    }
    if errors.len() > 1 {
        out.push_str(&format!(
            "\n\n{} {} {}",
            "found".dimmed(),
            errors.len().to_string().red().bold(),
            "errors".dimmed()
        ));
    }
    out
}
