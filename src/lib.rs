//! # style-checker
//!
//! Rewrites source files to follow a style guide using a locally hosted LLM.
//!
//! ## Features
//!
//! - Recursive discovery of source files by language extension
//! - Prompt rendering from a Tera template and a plain-text style guide
//! - Streaming client for an Ollama-compatible HTTP server
//! - Timestamped prompt and rewritten-code artifacts that never overwrite
//! - Background batches that report progress over a channel
//!
//! ## Quick Start
//!
//! ```no_run
//! use style_checker::{Config, Language, channel, run};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./src")
//!     .language(Language::CSharp)
//!     .model("codellama")
//!     .build()?;
//!
//! let (reporter, events) = channel();
//! let outcome = run(config, &reporter)?;
//! drop(reporter);
//!
//! for event in events {
//!     println!("{event}");
//! }
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! A batch runs in stages:
//! 1. **Scanner**: Finds files with the language's extension under the root
//! 2. **PromptBuilder**: Combines the style guide and each file into a prompt
//! 3. **Generator**: Streams the model's answer back as one string
//! 4. **ArtifactWriter**: Saves the prompt and the rewritten code beside the source
//!
//! [`BatchRunner`] runs the stages on a background thread and [`Reporter`]
//! carries one [`BatchEvent`] per step back to the caller.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod error;
mod file;
mod filter;
mod language;
mod processor;
mod prompt;
mod report;
mod scanner;
mod style_guide;
mod worker;
mod writer;

use std::sync::Arc;

pub use client::{
    decode_stream, Generator, ModelList, OllamaClient, OllamaClientBuilder, RunningModel,
    ServerStatus, DEFAULT_BASE_URL, DEFAULT_GENERATE_TIMEOUT, DEFAULT_LIST_TIMEOUT,
    DEFAULT_PROBE_TIMEOUT,
};
pub use config::{
    default_style_guide_path, Config, ConfigBuilder, TimestampStyle, DEFAULT_STYLE_GUIDE,
};
pub use error::{Error, Result};
pub use file::SourceFile;
pub use language::Language;
pub use processor::{FileOutcome, FileProcessor};
pub use prompt::{Prompt, PromptBuilder};
pub use report::{channel, BatchEvent, Reporter, Severity};
pub use scanner::Scanner;
pub use style_guide::StyleGuide;
pub use worker::{AbortReason, BatchOutcome, BatchRunner, BatchState, BatchStats, BatchWorker};
pub use writer::{ArtifactKind, ArtifactWriter};

/// Runs a complete style check batch on the current thread.
///
/// Talks to the server named in `config` and sends progress to `reporter`.
/// A batch that stops during validation is not an error; it is returned as
/// [`BatchOutcome::Aborted`].
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
///
/// # Examples
///
/// ```no_run
/// use style_checker::{channel, run, BatchOutcome, Config};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .model("codellama")
///     .build()?;
///
/// let (reporter, _events) = channel();
/// if let BatchOutcome::Completed(stats) = run(config, &reporter)? {
///     stats.print_summary();
/// }
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config, reporter: &Reporter) -> Result<BatchOutcome> {
    let client = OllamaClient::from_config(&config)?;
    Ok(BatchWorker::new(config, Arc::new(client)).run(reporter))
}
