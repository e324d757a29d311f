//! Loading of the style guide text injected into every prompt.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Style guide contents, loaded once per batch and shared read-only.
///
/// Cloning is cheap; all clones point at the same text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleGuide {
    path: PathBuf,
    text: Arc<str>,
}

impl StyleGuide {
    /// Reads the style guide at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StyleGuideUnavailable`] carrying the I/O error message
    /// when the file is missing, unreadable or not UTF-8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::style_guide(path, e))?;

        debug!("Loaded style guide {} ({} bytes)", path.display(), text.len());

        Ok(Self {
            path: path.to_path_buf(),
            text: Arc::from(text),
        })
    }

    /// Wraps text that did not come from disk.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            path: PathBuf::new(),
            text: Arc::from(text.into()),
        }
    }

    /// Returns the guide's full text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns where the guide was loaded from (empty for in-memory guides).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
