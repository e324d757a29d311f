//! Glob-based exclusion applied while locating source files.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Skips files whose path, or any ancestor directory, matches an exclude glob.
///
/// Paths are matched relative to the scan root, so `bin/**` excludes
/// `<root>/bin` and everything below it.
#[derive(Debug, Clone)]
pub(crate) struct FileFilter {
    exclude: GlobSet,
    empty: bool,
}

impl FileFilter {
    /// Compiles the given patterns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a pattern is not a valid glob.
    pub(crate) fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(format!("Invalid glob pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }

        let exclude = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))?;

        Ok(Self {
            exclude,
            empty: patterns.is_empty(),
        })
    }

    /// Returns false when `relative` or one of its parents is excluded.
    pub(crate) fn should_process(&self, relative: &Path) -> bool {
        if self.empty {
            return true;
        }

        !relative
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.exclude.is_match(p))
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            exclude: GlobSet::empty(),
            empty: true,
        }
    }
}
