use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// A source file discovered by the locator.
///
/// Immutable once created; the batch consumes it for a single processing pass.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path to the file as found under the scan root
    pub path: PathBuf,

    /// Path relative to the scan root, for display
    pub relative_path: String,

    /// Extension (without the dot) that selected this file
    pub extension: String,
}

impl SourceFile {
    /// Creates a new source file reference.
    #[must_use]
    pub fn new(path: PathBuf, relative_path: String, extension: impl Into<String>) -> Self {
        Self {
            path,
            relative_path,
            extension: extension.into(),
        }
    }

    /// Returns the file name without its final extension, e.g. `Program` for `Program.cs`.
    #[must_use]
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Returns the bare file name, e.g. `Program.cs`.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative_path.clone())
    }

    /// Returns the directory containing the file.
    #[must_use]
    pub fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Reads the whole file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUtf8`] when the bytes are not valid UTF-8 and
    /// [`Error::Io`] for any other read failure.
    pub fn read_to_string(&self) -> Result<String> {
        read_source(&self.path)
    }
}

/// Reads a file as UTF-8, distinguishing encoding failures from I/O failures.
pub(crate) fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Error::invalid_utf8(path)
        } else {
            Error::io(path, e)
        }
    })
}
