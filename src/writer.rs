use crate::{
    config::{Config, TimestampStyle},
    error::{Error, Result},
    file::SourceFile,
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Kind of artifact written for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// The exact prompt sent to the model
    Prompt,
    /// The rewritten code the model returned
    Rewritten,
}

impl ArtifactKind {
    /// Returns the artifact extension for a source with extension `source_ext`,
    /// e.g. `cs_prompt` or `cs_mod`.
    #[must_use]
    pub fn extension_for(self, source_ext: &str) -> String {
        match self {
            Self::Prompt => format!("{source_ext}_prompt"),
            Self::Rewritten => format!("{source_ext}_mod"),
        }
    }
}

/// Writes prompt and rewritten-code artifacts under timestamped names.
///
/// Names look like `<base>_<timestamp>.<ext>_prompt`. Existing files are
/// never overwritten: a clash within the same second gets a `_1`, `_2`, ...
/// counter before the extension.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: Option<PathBuf>,
    timestamp_style: TimestampStyle,
}

impl ArtifactWriter {
    /// Creates a writer. `None` places artifacts beside each source file.
    #[must_use]
    pub const fn new(output_dir: Option<PathBuf>, timestamp_style: TimestampStyle) -> Self {
        Self {
            output_dir,
            timestamp_style,
        }
    }

    /// Creates a writer from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.output_dir.clone(), config.timestamp_style)
    }

    /// Returns the directory artifacts for `source` are written to.
    #[must_use]
    pub fn target_dir(&self, source: &SourceFile) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| source.parent_dir().to_path_buf())
    }

    /// Captures the current local time in the configured layout.
    #[must_use]
    pub fn timestamp(&self) -> String {
        chrono::Local::now()
            .format(self.timestamp_style.format_str())
            .to_string()
    }

    /// Returns the first free artifact path for the given timestamp.
    #[must_use]
    pub fn artifact_path(&self, source: &SourceFile, kind: ArtifactKind, timestamp: &str) -> PathBuf {
        let dir = self.target_dir(source);
        let base = source.base_name();
        let extension = kind.extension_for(&source.extension);

        let candidate = dir.join(format!("{base}_{timestamp}.{extension}"));
        if !candidate.exists() {
            return candidate;
        }

        (1..)
            .map(|n| dir.join(format!("{base}_{timestamp}_{n}.{extension}")))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }

    /// Writes one artifact, capturing the timestamp at the moment of writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the target directory cannot be created or the
    /// file cannot be written.
    pub fn write(&self, source: &SourceFile, kind: ArtifactKind, content: &str) -> Result<PathBuf> {
        let dir = self.target_dir(source);
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

        let path = self.artifact_path(source, kind, &self.timestamp());
        write_file_atomic(&path, content)?;

        debug!("Wrote {:?} artifact ({} bytes) to {}", kind, content.len(), path.display());
        Ok(path)
    }
}

/// Writes a file through a temporary sibling and an atomic rename.
fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::config(format!("Invalid artifact path: {}", path.display())))?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::io(&temp_path, e))?;

    // Ensure data is flushed to disk
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn source_in(dir: &Path, name: &str) -> SourceFile {
        let path = dir.join(name);
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        SourceFile::new(path, name.to_string(), extension)
    }

    #[test]
    fn test_artifact_extensions() {
        assert_eq!(ArtifactKind::Prompt.extension_for("cs"), "cs_prompt");
        assert_eq!(ArtifactKind::Rewritten.extension_for("py"), "py_mod");
    }

    #[test]
    fn test_artifact_path_beside_source() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_in(temp.path(), "Program.cs");
        let writer = ArtifactWriter::new(None, TimestampStyle::Compact);

        let path = writer.artifact_path(&source, ArtifactKind::Prompt, "20240131_235959");

        assert_eq!(path, temp.path().join("Program_20240131_235959.cs_prompt"));
        assert_ne!(path, source.path);
    }

    #[test]
    fn test_artifact_path_in_output_dir() {
        let temp = assert_fs::TempDir::new().unwrap();
        let out = temp.child("out");
        let source = source_in(temp.path(), "app.js");
        let writer = ArtifactWriter::new(Some(out.path().to_path_buf()), TimestampStyle::DayFirst);

        let path = writer.artifact_path(&source, ArtifactKind::Rewritten, "310124_235959");

        assert_eq!(path, out.path().join("app_310124_235959.js_mod"));
    }

    #[test]
    fn test_artifact_path_avoids_collision() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_in(temp.path(), "a.py");
        temp.child("a_20240101_000000.py_mod").write_str("first").unwrap();
        temp.child("a_20240101_000000_1.py_mod").write_str("second").unwrap();
        let writer = ArtifactWriter::new(None, TimestampStyle::Compact);

        let path = writer.artifact_path(&source, ArtifactKind::Rewritten, "20240101_000000");

        assert_eq!(path, temp.path().join("a_20240101_000000_2.py_mod"));
    }

    #[test]
    fn test_write_never_overwrites() {
        let temp = assert_fs::TempDir::new().unwrap();
        let source = source_in(temp.path(), "Main.java");
        let writer = ArtifactWriter::new(None, TimestampStyle::Compact);

        let first = writer.write(&source, ArtifactKind::Prompt, "one").unwrap();
        let second = writer.write(&source, ArtifactKind::Prompt, "two").unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "one");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two");
    }

    #[test]
    fn test_write_creates_output_dir_and_leaves_no_temp() {
        let temp = assert_fs::TempDir::new().unwrap();
        let out = temp.child("nested/out");
        let source = source_in(temp.path(), "x.c");
        let writer = ArtifactWriter::new(Some(out.path().to_path_buf()), TimestampStyle::Compact);

        let path = writer.write(&source, ArtifactKind::Rewritten, "int x;").unwrap();

        assert!(path.starts_with(out.path()));
        let names: Vec<String> = fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".c_mod"));
    }

    #[test]
    fn test_timestamp_layouts() {
        let compact = ArtifactWriter::new(None, TimestampStyle::Compact).timestamp();
        let day_first = ArtifactWriter::new(None, TimestampStyle::DayFirst).timestamp();

        assert_eq!(compact.len(), "YYYYMMDD_HHMMSS".len());
        assert_eq!(day_first.len(), "DDMMYY_HHMMSS".len());
        assert_eq!(compact.as_bytes()[8], b'_');
        assert_eq!(day_first.as_bytes()[6], b'_');
    }
}
