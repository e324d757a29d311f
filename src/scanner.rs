use crate::{
    config::Config,
    error::{Error, Result},
    file::SourceFile,
    filter::FileFilter,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Statistics collected during scanning.
#[derive(Debug, Default, Clone)]
pub(crate) struct ScanStats {
    /// Regular files visited
    pub visited_files: usize,

    /// Files whose name carried the target extension
    pub matched_files: usize,

    /// Matching files dropped by an exclude pattern
    pub excluded_files: usize,

    /// Entries the walk could not read
    pub errors: usize,
}

/// Locates source files with a given extension under a root directory.
#[derive(Debug, Clone)]
pub struct Scanner {
    root_dir: PathBuf,
    extension: String,
    recursive: bool,
    filter: FileFilter,
}

impl Scanner {
    /// Creates a recursive scanner for `extension` (without the leading dot).
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
            recursive: true,
            filter: FileFilter::default(),
        }
    }

    /// Creates a scanner from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclude pattern does not compile.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            filter: FileFilter::new(&config.exclude)?,
            ..Self::new(&config.root_dir, config.language.extension())
                .recursive(config.recursive)
        })
    }

    /// Limits the walk to the root's immediate children when `false`.
    #[must_use]
    pub const fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = enabled;
        self
    }

    /// Returns the root directory this scanner walks.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Returns the extension this scanner matches.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Scans the root directory and returns every file named `*.<extension>`.
    ///
    /// Results are sorted by relative path, so two scans of an unchanged tree
    /// return identical lists. An empty list is a valid result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the root is empty, missing or not a
    /// directory. Unreadable entries below the root are logged and skipped.
    pub fn scan(&self) -> Result<Vec<SourceFile>> {
        self.check_root()?;

        let suffix = format!(".{}", self.extension);
        let mut stats = ScanStats::default();
        let mut files = Vec::new();

        debug!(
            "Scanning {} for *{} (recursive: {})",
            self.root_dir.display(),
            suffix,
            self.recursive
        );

        let mut walker = WalkDir::new(&self.root_dir)
            .follow_links(false)
            .sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    stats.errors += 1;
                    continue;
                }
            };

            // The walk does not follow links; a link counts as a file unless it
            // points at a directory.
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && !entry.path().is_dir());
            if !is_file {
                continue;
            }
            stats.visited_files += 1;

            if !entry.file_name().to_string_lossy().ends_with(&suffix) {
                continue;
            }
            stats.matched_files += 1;

            let relative = pathdiff::diff_paths(entry.path(), &self.root_dir)
                .unwrap_or_else(|| entry.path().to_path_buf());

            if !self.filter.should_process(&relative) {
                trace!("Excluded by pattern: {}", relative.display());
                stats.excluded_files += 1;
                continue;
            }

            files.push(SourceFile::new(
                entry.into_path(),
                relative.to_string_lossy().into_owned(),
                self.extension.clone(),
            ));
        }

        // Sort for deterministic ordering
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        debug!(
            "Scan complete: {} visited, {} matched, {} excluded, {} errors",
            stats.visited_files, stats.matched_files, stats.excluded_files, stats.errors
        );

        Ok(files)
    }

    fn check_root(&self) -> Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(Error::invalid_input(&self.root_dir, "no folder selected"));
        }
        if !self.root_dir.exists() {
            return Err(Error::invalid_input(&self.root_dir, "directory does not exist"));
        }
        if !self.root_dir.is_dir() {
            return Err(Error::invalid_input(&self.root_dir, "path is not a directory"));
        }
        Ok(())
    }
}
