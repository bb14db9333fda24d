use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while converting Markdown to a Word document.
#[derive(Debug, Error)]
pub enum Error {
    /// The Markdown input could not be tokenized (malformed encoding).
    #[error("Failed to parse Markdown: {message}")]
    Parse { message: String },

    /// Translating the AST into document markup, or writing the package, failed.
    #[error("Failed to build document: {message}")]
    Build {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A template (or template variables) could not be read.
    #[error("Template error: {message}")]
    Template {
        message: String,
        path: Option<PathBuf>,
    },

    /// The TOML configuration is malformed.
    #[error("Invalid configuration: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an underlying failure of the package writer or XML reader.
    pub fn build_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Build {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
            path: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
