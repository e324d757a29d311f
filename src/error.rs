use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the style-checker library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Root directory handed to the locator is empty, missing or not a directory.
    #[error("Invalid folder path '{path}': {reason}")]
    InvalidInput {
        /// Offending path (empty when none was given)
        path: PathBuf,
        /// Why the path was rejected
        reason: String,
    },

    /// Invalid UTF-8 encountered in a source file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// The style guide asset could not be read.
    #[error("Error reading style guide '{path}': {message}")]
    StyleGuideUnavailable {
        /// Location of the style guide
        path: PathBuf,
        /// Underlying I/O error message
        message: String,
    },

    /// Prompt template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Transport-level failure talking to the LLM server.
    #[error("Request to '{url}' failed: {message}")]
    Http {
        /// Requested URL
        url: String,
        /// Error message
        message: String,
    },

    /// The LLM server answered with a non-success status.
    #[error("Request to '{url}' returned HTTP {status}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// Numeric HTTP status
        status: u16,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// A batch is already running and a second one was requested.
    #[error("A style check batch is already running")]
    BatchInProgress,

    /// The background worker thread could not be started.
    #[error("Failed to start worker thread: {message}")]
    Worker {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid input error for a rejected root directory.
    #[must_use]
    pub fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a style guide error from the underlying I/O failure.
    #[must_use]
    pub fn style_guide(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StyleGuideUnavailable {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        // tera nests the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }
        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a template validation error.
    #[must_use]
    pub fn template_validation(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Creates a transport error for the given URL.
    #[must_use]
    pub fn http(url: impl Into<String>, source: &reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            message: source.to_string(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the locator rejected its root directory.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Returns true if the error came from talking to the LLM server.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::HttpStatus { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
