//! Blocking client for the local LLM server (Ollama-compatible API).
//!
//! Three endpoints are used:
//! - `POST /api/generate` streams newline-delimited JSON chunks whose
//!   `response` fragments are concatenated into the generated text
//! - `GET /api/tags` is the liveness probe
//! - `GET /api/ps` lists the models currently loaded
//!
//! Every call blocks the calling thread. Never call it from the thread that
//! drives the user-facing output.

use crate::config::Config;
use crate::error::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default base URL of the local server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default bound on one generation request, streaming included.
pub const DEFAULT_GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for the liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default timeout for listing running models.
pub const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that turns a prompt into generated text.
///
/// Implemented by [`OllamaClient`]; the batch only sees this trait.
pub trait Generator: Send + Sync {
    /// Runs one generation, returning the concatenated text.
    ///
    /// # Errors
    ///
    /// Returns an error when the server cannot be reached, answers with a
    /// non-success status, times out, or the stream breaks mid-way.
    fn try_generate(&self, prompt: &str, model: &str) -> Result<String>;

    /// Runs one generation, collapsing every failure into an empty string.
    ///
    /// Callers cannot tell "server unreachable" from "model returned nothing";
    /// use [`Generator::try_generate`] when that matters.
    fn generate(&self, prompt: &str, model: &str) -> String {
        self.try_generate(prompt, model).unwrap_or_else(|e| {
            warn!("Generation failed, treating as empty response: {}", e);
            String::new()
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One line of the generation stream.
#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct PsResponse {
    /// Absent and `null` both mean nothing is loaded
    #[serde(default)]
    models: Option<Vec<RunningModel>>,
}

/// A model reported by `GET /api/ps`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunningModel {
    /// Model name, e.g. `codellama:7b`
    #[serde(default)]
    pub name: Option<String>,

    /// Size in bytes, when reported
    #[serde(default)]
    pub size: Option<u64>,
}

impl RunningModel {
    /// Returns the model name, or `Unknown` when the server omitted it.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// Result of the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// `GET /api/tags` answered 200
    Running,
    /// Any other status, or no answer at all
    Stopped,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("Running"),
            Self::Stopped => f.write_str("Stopped"),
        }
    }
}

/// Outcome of listing running models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelList {
    /// At least one model is loaded
    Models(Vec<String>),
    /// The server answered but nothing is loaded
    NoModels,
    /// The listing failed
    Error(String),
}

impl ModelList {
    /// Returns the first model, the default selection.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Models(names) => names.first().map(String::as_str),
            Self::NoModels | Self::Error(_) => None,
        }
    }
}

impl fmt::Display for ModelList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Models(names) => f.write_str(&names.join("\n")),
            Self::NoModels => f.write_str("No models running"),
            Self::Error(message) => write!(f, "Error fetching models: {message}"),
        }
    }
}

/// HTTP client for one LLM server. Construct once per batch and share by reference.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    generate_timeout: Duration,
    probe_timeout: Duration,
    list_timeout: Duration,
}

/// Builder for [`OllamaClient`].
#[derive(Debug)]
pub struct OllamaClientBuilder {
    base_url: String,
    generate_timeout: Duration,
    probe_timeout: Duration,
    list_timeout: Duration,
}

impl Default for OllamaClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            generate_timeout: DEFAULT_GENERATE_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            list_timeout: DEFAULT_LIST_TIMEOUT,
        }
    }
}

impl OllamaClientBuilder {
    /// Sets the server base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the timeout for one generation request.
    #[must_use]
    pub const fn generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    /// Sets the timeout for the liveness probe.
    #[must_use]
    pub const fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the timeout for listing running models.
    #[must_use]
    pub const fn list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be initialised.
    pub fn build(self) -> Result<OllamaClient> {
        // Always direct to the local server, never through a system proxy.
        let http = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| Error::http(&self.base_url, &e))?;

        Ok(OllamaClient {
            http,
            base_url: self.base_url,
            generate_timeout: self.generate_timeout,
            probe_timeout: self.probe_timeout,
            list_timeout: self.list_timeout,
        })
    }
}

impl OllamaClient {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn builder() -> OllamaClientBuilder {
        OllamaClientBuilder::default()
    }

    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be initialised.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::builder()
            .base_url(&config.server_url)
            .generate_timeout(config.generate_timeout)
            .probe_timeout(config.probe_timeout)
            .list_timeout(config.list_timeout)
            .build()
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Probes `GET /api/tags`; only a 200 answer counts as running.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        let url = self.endpoint("tags");
        match self.http.get(&url).timeout(self.probe_timeout).send() {
            Ok(response) if response.status() == StatusCode::OK => ServerStatus::Running,
            Ok(response) => {
                debug!("Liveness probe returned {}", response.status());
                ServerStatus::Stopped
            }
            Err(e) => {
                debug!("Liveness probe failed: {}", e);
                ServerStatus::Stopped
            }
        }
    }

    /// Lists the models currently loaded via `GET /api/ps`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success,
    /// or the body is not the expected JSON.
    pub fn running_models(&self) -> Result<Vec<RunningModel>> {
        let url = self.endpoint("ps");
        let response = self
            .http
            .get(&url)
            .timeout(self.list_timeout)
            .send()
            .map_err(|e| Error::http(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body: PsResponse = response.json().map_err(|e| Error::http(&url, &e))?;
        Ok(body.models.unwrap_or_default())
    }

    /// Lists running models, folding failures into [`ModelList::Error`].
    #[must_use]
    pub fn model_list(&self) -> ModelList {
        match self.running_models() {
            Ok(models) if models.is_empty() => ModelList::NoModels,
            Ok(models) => ModelList::Models(
                models
                    .iter()
                    .map(|m| m.display_name().to_string())
                    .collect(),
            ),
            Err(e) => {
                warn!("Error fetching models: {}", e);
                ModelList::Error(e.to_string())
            }
        }
    }
}

impl Generator for OllamaClient {
    fn try_generate(&self, prompt: &str, model: &str) -> Result<String> {
        let url = self.endpoint("generate");
        debug!("POST {} (model: {}, {} prompt bytes)", url, model, prompt.len());

        let response = self
            .http
            .post(&url)
            .timeout(self.generate_timeout)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: true,
            })
            .send()
            .map_err(|e| Error::http(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        decode_stream(BufReader::new(response)).map_err(|e| Error::Http {
            url,
            message: e.to_string(),
        })
    }
}

/// Concatenates the `response` fragments of a newline-delimited JSON stream.
///
/// Each line is decoded on its own. Blank, malformed, or fragment-less lines
/// contribute nothing. Fragments are joined in the order received.
///
/// # Errors
///
/// Returns an error only if reading from `reader` fails.
pub fn decode_stream<R: BufRead>(reader: R) -> std::io::Result<String> {
    let mut result = String::new();

    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        let line = line.strip_suffix(b"\r").unwrap_or(&line);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match serde_json::from_slice::<GenerateChunk>(line) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    warn!("Server reported an error in stream line {}: {}", index + 1, error);
                }
                if let Some(fragment) = chunk.response {
                    result.push_str(&fragment);
                }
                if chunk.done {
                    trace!("Stream marked done at line {}", index + 1);
                }
            }
            Err(e) => {
                trace!("Skipping malformed stream line {}: {}", index + 1, e);
            }
        }
    }

    Ok(result)
}
