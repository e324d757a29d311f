//! Progress events and the channel that carries them off the worker thread.
//!
//! The worker only ever sends [`BatchEvent`]s; the thread that owns the
//! user-facing output receives them and renders each one as a log line.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::worker::{AbortReason, BatchStats};

/// Severity of a pre-batch notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational, e.g. nothing to do
    Info,
    /// User error, e.g. no folder selected
    Warning,
    /// Resource failure, e.g. unreadable style guide
    Error,
}

/// One progress message from a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// The batch ended before processing any file.
    Aborted {
        /// How serious the reason is
        severity: Severity,
        /// Why the batch stopped
        reason: AbortReason,
    },

    /// Files are about to be processed.
    Started {
        /// Number of matched files
        total: usize,
        /// Model used for every file
        model: String,
    },

    /// Processing of one file began.
    FileStarted {
        /// Source file name
        file: String,
        /// Model used
        model: String,
    },

    /// The prompt artifact for a file was written.
    PromptWritten {
        /// Artifact path
        path: PathBuf,
    },

    /// The model answered and the rewritten code was saved.
    FileSucceeded {
        /// Source file name
        file: String,
        /// Rewritten-code artifact
        output: PathBuf,
        /// Time spent waiting for the model
        elapsed: Duration,
    },

    /// The model produced nothing for a file.
    FileSkipped {
        /// Source file name
        file: String,
        /// Transport error when the server could not be used
        reason: Option<String>,
    },

    /// Reading the file or writing an artifact failed.
    FileFailed {
        /// Source file name
        file: String,
        /// Error description
        error: String,
    },

    /// Every file has been handled.
    Completed(BatchStats),
}

impl BatchEvent {
    /// Returns the severity shown for this event.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Aborted { severity, .. } => *severity,
            Self::FileFailed { .. } => Severity::Error,
            Self::FileSkipped { .. } => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for BatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted { reason, .. } => write!(f, "{reason}"),
            Self::Started { total, model } => {
                write!(f, "Checking {total} file(s) with model '{model}'")
            }
            Self::FileStarted { file, model } => {
                write!(f, "Processing {file} with model '{model}'...")
            }
            Self::PromptWritten { path } => {
                write!(f, "Creating prompt file: {}", path.display())
            }
            Self::FileSucceeded {
                file,
                output,
                elapsed,
            } => write!(
                f,
                "Processed {} -> {} (in {:.2}s)",
                file,
                output.display(),
                elapsed.as_secs_f64()
            ),
            Self::FileSkipped { file, reason: None } => {
                write!(f, "No response from model for {file}.")
            }
            Self::FileSkipped {
                file,
                reason: Some(reason),
            } => write!(f, "No response from model for {file}. ({reason})"),
            Self::FileFailed { file, error } => write!(f, "Error processing {file}: {error}"),
            Self::Completed(_) => f.write_str("All files processed."),
        }
    }
}

/// Sending half of the progress channel, handed to the worker.
///
/// Sends never fail from the worker's point of view: if the receiving side
/// is gone, events are dropped.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: Sender<BatchEvent>,
}

impl Reporter {
    /// Sends one event.
    pub fn send(&self, event: BatchEvent) {
        tracing::trace!("event: {}", event);
        let _ = self.tx.send(event);
    }
}

/// Creates a connected reporter and receiver.
#[must_use]
pub fn channel() -> (Reporter, Receiver<BatchEvent>) {
    let (tx, rx) = mpsc::channel();
    (Reporter { tx }, rx)
}
