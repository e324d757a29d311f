use crate::client::{
    DEFAULT_BASE_URL, DEFAULT_GENERATE_TIMEOUT, DEFAULT_LIST_TIMEOUT, DEFAULT_PROBE_TIMEOUT,
};
use crate::error::{Error, Result};
use crate::language::Language;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Location of the bundled style guide, relative to the install directory.
pub const DEFAULT_STYLE_GUIDE: &str = "style_guides/google_csharp_style_guide.txt";

/// Returns the first `base/relative` that exists, or `relative` unchanged.
fn locate_asset(relative: &Path, bases: &[PathBuf]) -> PathBuf {
    bases
        .iter()
        .map(|base| base.join(relative))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| relative.to_path_buf())
}

/// Resolves [`DEFAULT_STYLE_GUIDE`] so the binary works from any directory.
///
/// Looked up in order: the working directory, the executable's directory and
/// its parent, then the crate's source directory.
#[must_use]
pub fn default_style_guide_path() -> PathBuf {
    let mut bases = vec![PathBuf::new()];
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        bases.extend(exe_dir.parent().map(Path::to_path_buf));
        bases.insert(1, exe_dir);
    }
    bases.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")));

    locate_asset(Path::new(DEFAULT_STYLE_GUIDE), &bases)
}

/// Timestamp layout embedded in artifact file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampStyle {
    /// `YYYYMMDD_HHMMSS`
    #[default]
    Compact,
    /// `DDMMYY_HHMMSS`
    DayFirst,
}

impl TimestampStyle {
    /// Returns the `chrono` format string for this style.
    #[must_use]
    pub const fn format_str(self) -> &'static str {
        match self {
            Self::Compact => "%Y%m%d_%H%M%S",
            Self::DayFirst => "%d%m%y_%H%M%S",
        }
    }
}

/// Configuration for a scan or a style check batch.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to scan; empty means nothing was selected
    pub root_dir: PathBuf,

    /// Language whose extension selects source files
    pub language: Language,

    /// Model name passed to the generation endpoint
    pub model: Option<String>,

    /// Folder for artifacts; `None` writes them beside each source file
    pub output_dir: Option<PathBuf>,

    /// Location of the style guide text
    pub style_guide_path: PathBuf,

    /// Base URL of the local LLM server
    pub server_url: String,

    /// Upper bound for one generation request, streaming included
    pub generate_timeout: Duration,

    /// Timeout for the liveness probe
    pub probe_timeout: Duration,

    /// Timeout for listing running models
    pub list_timeout: Duration,

    /// Walk subdirectories (`false` looks at immediate children only)
    pub recursive: bool,

    /// Timestamp layout for artifact names
    pub timestamp_style: TimestampStyle,

    /// Glob patterns the locator skips
    pub exclude: Vec<String>,

    /// External prompt template replacing the built-in one
    pub template_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use style_checker::{Config, Language};
    ///
    /// let config = Config::builder()
    ///     .root_dir("./src")
    ///     .language(Language::Python)
    ///     .model("codellama:7b")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// The root directory is not checked here; the batch reports an empty or
    /// missing folder as a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A timeout is zero
    /// - The server URL is not an http(s) URL
    /// - An exclude pattern is not a valid glob
    /// - The template file is missing or malformed
    pub fn validate(&self) -> Result<()> {
        for (name, timeout) in [
            ("generate_timeout", self.generate_timeout),
            ("probe_timeout", self.probe_timeout),
            ("list_timeout", self.list_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::config(format!("{name} must be greater than 0")));
            }
        }

        let url = reqwest::Url::parse(&self.server_url).map_err(|e| {
            Error::config(format!("Invalid server URL '{}': {}", self.server_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Server URL must use http or https: {}",
                self.server_url
            )));
        }

        crate::filter::FileFilter::new(&self.exclude)?;

        if let Some(ref template_path) = self.template_path {
            crate::prompt::PromptBuilder::validate_template(template_path)?;
        }

        if let Some(ref model) = self.model {
            if model.trim().is_empty() {
                return Err(Error::config("model name must not be blank"));
            }
        }

        Ok(())
    }

    /// Returns true when no root directory has been selected.
    #[must_use]
    pub fn root_is_empty(&self) -> bool {
        self.root_dir.as_os_str().is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::new(),
            language: Language::default(),
            model: None,
            output_dir: None,
            style_guide_path: default_style_guide_path(),
            server_url: DEFAULT_BASE_URL.to_string(),
            generate_timeout: DEFAULT_GENERATE_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            list_timeout: DEFAULT_LIST_TIMEOUT,
            recursive: true,
            timestamp_style: TimestampStyle::default(),
            exclude: Vec::new(),
            template_path: None,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    language: Option<Language>,
    model: Option<String>,
    output_dir: Option<PathBuf>,
    style_guide_path: Option<PathBuf>,
    server_url: Option<String>,
    generate_timeout: Option<Duration>,
    probe_timeout: Option<Duration>,
    list_timeout: Option<Duration>,
    recursive: Option<bool>,
    timestamp_style: Option<TimestampStyle>,
    exclude: Vec<String>,
    template_path: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Sets the root directory to scan.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the target language.
    #[must_use]
    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Sets the model used for generation.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a dedicated output folder for artifacts.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Overrides the style guide location.
    #[must_use]
    pub fn style_guide_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.style_guide_path = Some(path.into());
        self
    }

    /// Sets the base URL of the LLM server.
    #[must_use]
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Sets the timeout for one generation request.
    #[must_use]
    pub fn generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = Some(timeout);
        self
    }

    /// Sets the timeout for the liveness probe.
    #[must_use]
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Sets the timeout for listing running models.
    #[must_use]
    pub fn list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = Some(timeout);
        self
    }

    /// Enables or disables walking into subdirectories.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.recursive = Some(enabled);
        self
    }

    /// Sets the timestamp layout for artifact names.
    #[must_use]
    pub fn timestamp_style(mut self, style: TimestampStyle) -> Self {
        self.timestamp_style = Some(style);
        self
    }

    /// Sets glob patterns the locator skips.
    #[must_use]
    pub fn exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    /// Sets the path to an external prompt template.
    ///
    /// The template must be valid Tera syntax and reference both
    /// `style_guide` and `code`.
    #[must_use]
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();
        let config = Config {
            root_dir: self.root_dir.unwrap_or(defaults.root_dir),
            language: self.language.unwrap_or(defaults.language),
            model: self.model,
            output_dir: self.output_dir,
            style_guide_path: self.style_guide_path.unwrap_or(defaults.style_guide_path),
            server_url: self
                .server_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.server_url),
            generate_timeout: self.generate_timeout.unwrap_or(defaults.generate_timeout),
            probe_timeout: self.probe_timeout.unwrap_or(defaults.probe_timeout),
            list_timeout: self.list_timeout.unwrap_or(defaults.list_timeout),
            recursive: self.recursive.unwrap_or(defaults.recursive),
            timestamp_style: self.timestamp_style.unwrap_or(defaults.timestamp_style),
            exclude: self.exclude,
            template_path: self.template_path,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_default_config() {
        let config = Config::builder().build().unwrap();

        assert!(config.root_is_empty());
        assert_eq!(config.language, Language::CSharp);
        assert_eq!(config.server_url, DEFAULT_BASE_URL);
        assert_eq!(config.generate_timeout, Duration::from_secs(120));
        assert_eq!(config.generate_timeout, DEFAULT_GENERATE_TIMEOUT);
        assert_eq!(config.probe_timeout, DEFAULT_PROBE_TIMEOUT);
        assert_eq!(config.list_timeout, DEFAULT_LIST_TIMEOUT);
        assert!(config.recursive);
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn test_default_style_guide_is_found() {
        let path = Config::default().style_guide_path;

        assert!(path.ends_with(DEFAULT_STYLE_GUIDE));
        assert!(path.is_file(), "{} should exist", path.display());
    }

    #[test]
    fn test_locate_asset_ignores_working_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("install/style_guides/guide.txt").write_str("rules").unwrap();
        let relative = Path::new("style_guides/guide.txt");

        let found = locate_asset(
            relative,
            &[temp.child("elsewhere").to_path_buf(), temp.child("install").to_path_buf()],
        );
        let missing = locate_asset(relative, &[temp.child("elsewhere").to_path_buf()]);

        assert_eq!(found, temp.child("install/style_guides/guide.txt").path());
        assert_eq!(missing, relative);
    }

    #[test]
    fn test_missing_root_dir_is_not_a_build_error() {
        let config = Config::builder()
            .root_dir("/nonexistent/path/that/should/not/exist")
            .build();

        assert!(config.is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::builder()
            .generate_timeout(Duration::ZERO)
            .build();

        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_invalid_server_url() {
        assert!(Config::builder().server_url("not a url").build().is_err());
        assert!(Config::builder().server_url("ftp://localhost").build().is_err());
    }

    #[test]
    fn test_server_url_trailing_slash_trimmed() {
        let config = Config::builder()
            .server_url("http://127.0.0.1:11434/")
            .build()
            .unwrap();

        assert_eq!(config.server_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_invalid_exclude_glob() {
        let result = Config::builder().exclude(vec!["[".to_string()]).build();

        assert!(result.is_err());
    }

    #[test]
    fn test_blank_model_rejected() {
        assert!(Config::builder().model("  ").build().is_err());
    }

    #[test]
    fn test_missing_template_rejected() {
        let temp = assert_fs::TempDir::new().unwrap();

        let result = Config::builder()
            .template_path(temp.child("missing.tera").path())
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(TimestampStyle::Compact.format_str(), "%Y%m%d_%H%M%S");
        assert_eq!(TimestampStyle::DayFirst.format_str(), "%d%m%y_%H%M%S");
    }
}
