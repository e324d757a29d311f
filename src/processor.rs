use crate::{
    client::Generator,
    error::{Error, Result},
    file::SourceFile,
    prompt::PromptBuilder,
    report::{BatchEvent, Reporter},
    style_guide::StyleGuide,
    writer::{ArtifactKind, ArtifactWriter},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What happened to one file.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// The model answered and both artifacts were written.
    Succeeded {
        /// Prompt artifact
        prompt: PathBuf,
        /// Rewritten-code artifact
        output: PathBuf,
        /// Time spent in the model call
        elapsed: Duration,
    },
    /// The model returned nothing; only the prompt artifact exists.
    Skipped {
        /// Prompt artifact
        prompt: PathBuf,
        /// Transport error, when that is why nothing came back
        reason: Option<String>,
    },
    /// Reading the source or writing an artifact failed.
    Failed(Error),
}

/// Runs one source file through prompt, model and artifacts.
///
/// Holds only borrowed collaborators; the batch owns them and creates one
/// processor per run.
pub struct FileProcessor<'a> {
    generator: &'a dyn Generator,
    prompts: &'a PromptBuilder,
    writer: &'a ArtifactWriter,
    reporter: &'a Reporter,
    model: &'a str,
}

impl<'a> FileProcessor<'a> {
    /// Creates a processor that sends every prompt to `model`.
    #[must_use]
    pub fn new(
        generator: &'a dyn Generator,
        prompts: &'a PromptBuilder,
        writer: &'a ArtifactWriter,
        reporter: &'a Reporter,
        model: &'a str,
    ) -> Self {
        Self {
            generator,
            prompts,
            writer,
            reporter,
            model,
        }
    }

    /// Processes one file, reporting progress and never returning an error.
    ///
    /// Any failure is reported as [`BatchEvent::FileFailed`] and returned as
    /// [`FileOutcome::Failed`] so the batch can move on.
    pub fn process(&self, file: &SourceFile, style_guide: &StyleGuide) -> FileOutcome {
        let name = file.file_name();
        self.reporter.send(BatchEvent::FileStarted {
            file: name.clone(),
            model: self.model.to_string(),
        });

        let outcome = self
            .try_process(file, style_guide)
            .unwrap_or_else(FileOutcome::Failed);

        match &outcome {
            FileOutcome::Succeeded {
                output, elapsed, ..
            } => self.reporter.send(BatchEvent::FileSucceeded {
                file: name,
                output: output.clone(),
                elapsed: *elapsed,
            }),
            FileOutcome::Skipped { reason, .. } => self.reporter.send(BatchEvent::FileSkipped {
                file: name,
                reason: reason.clone(),
            }),
            FileOutcome::Failed(error) => {
                warn!("Error processing {}: {}", file.path.display(), error);
                self.reporter.send(BatchEvent::FileFailed {
                    file: name,
                    error: error.to_string(),
                });
            }
        }

        outcome
    }

    fn try_process(&self, file: &SourceFile, style_guide: &StyleGuide) -> Result<FileOutcome> {
        let code = file.read_to_string()?;
        let prompt = self.prompts.build(&file.file_name(), style_guide, &code)?;

        let prompt_path = self.writer.write(file, ArtifactKind::Prompt, prompt.as_str())?;
        self.reporter.send(BatchEvent::PromptWritten {
            path: prompt_path.clone(),
        });

        let start = Instant::now();
        let response = self.generator.try_generate(prompt.as_str(), self.model);
        let elapsed = start.elapsed();

        let text = match response {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                debug!("Empty response for {}", file.path.display());
                return Ok(FileOutcome::Skipped {
                    prompt: prompt_path,
                    reason: None,
                });
            }
            Err(e) => {
                warn!("No response for {}: {}", file.path.display(), e);
                return Ok(FileOutcome::Skipped {
                    prompt: prompt_path,
                    reason: Some(e.to_string()),
                });
            }
        };

        let output = self.writer.write(file, ArtifactKind::Rewritten, &text)?;

        Ok(FileOutcome::Succeeded {
            prompt: prompt_path,
            output,
            elapsed,
        })
    }
}
