use crate::{
    client::Generator,
    config::Config,
    error::{Error, Result},
    file::SourceFile,
    language::Language,
    processor::{FileOutcome, FileProcessor},
    prompt::PromptBuilder,
    report::{BatchEvent, Reporter, Severity},
    scanner::Scanner,
    style_guide::StyleGuide,
    writer::ArtifactWriter,
};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Why a batch stopped before processing any file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// No root directory was selected.
    NoFolder,
    /// No model was selected.
    NoModel,
    /// The root directory was rejected by the locator.
    InvalidFolder(String),
    /// The style guide could not be read.
    StyleGuide(String),
    /// The prompt template could not be loaded.
    Template(String),
    /// No file with the language's extension exists under the root.
    NoFiles {
        /// Language that was searched for
        language: Language,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFolder => f.write_str("Please select a folder first."),
            Self::NoModel => f.write_str("Please select a model first."),
            Self::InvalidFolder(message)
            | Self::StyleGuide(message)
            | Self::Template(message) => f.write_str(message),
            Self::NoFiles { language } => {
                write!(f, "No {language} files found in the selected folder.")
            }
        }
    }
}

/// Lifecycle of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BatchState {
    /// Nothing has run yet
    #[default]
    Idle,
    /// Checking folder, model, style guide and matches
    Validating,
    /// Working through the matched files
    Processing {
        /// 1-based index of the file in flight
        current: usize,
        /// Number of matched files
        total: usize,
    },
    /// Stopped before the first file
    Aborted(AbortReason),
    /// Every matched file was handled
    Completed,
}

impl BatchState {
    /// Returns true while the batch has not reached a terminal state.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Validating | Self::Processing { .. })
    }
}

/// Statistics collected during one batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BatchStats {
    /// Files matched by the locator
    pub total_files: usize,

    /// Files rewritten by the model
    pub succeeded: usize,

    /// Files the model returned nothing for
    pub skipped: usize,

    /// Files that could not be read or written
    pub failed: usize,

    /// Total execution time
    pub duration: Duration,
}

impl BatchStats {
    /// Serializes the statistics as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Style Check Summary                      ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Files Found:          {:>8}                        ║",
            self.total_files
        );
        println!(
            "║   - Rewritten:        {:>8}                        ║",
            self.succeeded
        );
        println!(
            "║   - No response:      {:>8}                        ║",
            self.skipped
        );
        println!(
            "║   - Failed:           {:>8}                        ║",
            self.failed
        );
        println!("║                                                       ║");
        println!(
            "║ Total Time:           {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Final result of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The batch stopped during validation
    Aborted(AbortReason),
    /// All files were handled, whatever their individual outcome
    Completed(BatchStats),
}

type SharedState = Arc<Mutex<BatchState>>;

fn set_state(state: &SharedState, next: BatchState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

/// Runs every matched file through the model, one at a time.
pub struct BatchWorker {
    config: Config,
    generator: Arc<dyn Generator>,
}

impl BatchWorker {
    /// Creates a worker. The generator is shared by every file in the batch.
    #[must_use]
    pub fn new(config: Config, generator: Arc<dyn Generator>) -> Self {
        Self { config, generator }
    }

    /// Runs the batch on the current thread.
    ///
    /// Blocks until every file has been handled; use [`BatchRunner::spawn`]
    /// to keep the calling thread free.
    pub fn run(&self, reporter: &Reporter) -> BatchOutcome {
        self.execute(reporter, &SharedState::default())
    }

    #[instrument(skip_all, fields(root_dir = %self.config.root_dir.display()))]
    fn execute(&self, reporter: &Reporter, state: &SharedState) -> BatchOutcome {
        let start_time = Instant::now();
        set_state(state, BatchState::Validating);

        let (model, style_guide, files, prompts) = match self.validate() {
            Ok(ready) => ready,
            Err((severity, reason)) => {
                info!("Batch aborted: {}", reason);
                reporter.send(BatchEvent::Aborted {
                    severity,
                    reason: reason.clone(),
                });
                set_state(state, BatchState::Aborted(reason.clone()));
                return BatchOutcome::Aborted(reason);
            }
        };

        let total = files.len();
        info!("Processing {} file(s) with model '{}'", total, model);
        reporter.send(BatchEvent::Started {
            total,
            model: model.to_string(),
        });

        let writer = ArtifactWriter::from_config(&self.config);
        let processor = FileProcessor::new(
            self.generator.as_ref(),
            &prompts,
            &writer,
            reporter,
            model,
        );

        let mut stats = BatchStats {
            total_files: total,
            ..BatchStats::default()
        };

        for (index, file) in files.iter().enumerate() {
            set_state(
                state,
                BatchState::Processing {
                    current: index + 1,
                    total,
                },
            );
            debug!("File {}/{}: {}", index + 1, total, file.relative_path);

            match processor.process(file, &style_guide) {
                FileOutcome::Succeeded { .. } => stats.succeeded += 1,
                FileOutcome::Skipped { .. } => stats.skipped += 1,
                FileOutcome::Failed(_) => stats.failed += 1,
            }
        }

        stats.duration = start_time.elapsed();
        info!(
            "Batch complete: {} rewritten, {} no response, {} failed in {:.2}s",
            stats.succeeded,
            stats.skipped,
            stats.failed,
            stats.duration.as_secs_f64()
        );

        reporter.send(BatchEvent::Completed(stats.clone()));
        set_state(state, BatchState::Completed);
        BatchOutcome::Completed(stats)
    }

    /// Checks the preconditions in order, stopping at the first that fails.
    fn validate(
        &self,
    ) -> std::result::Result<
        (&str, StyleGuide, Vec<SourceFile>, PromptBuilder),
        (Severity, AbortReason),
    > {
        if self.config.root_is_empty() {
            return Err((Severity::Warning, AbortReason::NoFolder));
        }

        let model = match self.config.model.as_deref() {
            Some(model) if !model.trim().is_empty() => model,
            _ => return Err((Severity::Warning, AbortReason::NoModel)),
        };

        let style_guide = StyleGuide::load(&self.config.style_guide_path).map_err(|e| {
            warn!("{}", e);
            (Severity::Error, AbortReason::StyleGuide(e.to_string()))
        })?;

        let files = Scanner::from_config(&self.config)
            .and_then(|scanner| scanner.scan())
            .map_err(|e| (Severity::Warning, AbortReason::InvalidFolder(e.to_string())))?;

        if files.is_empty() {
            return Err((
                Severity::Info,
                AbortReason::NoFiles {
                    language: self.config.language,
                },
            ));
        }

        let prompts = PromptBuilder::from_config(&self.config)
            .map_err(|e| (Severity::Error, AbortReason::Template(e.to_string())))?;

        Ok((model, style_guide, files, prompts))
    }
}

/// Resets a batch that ended without reaching a terminal state (e.g. a panic).
struct RunGuard(SharedState);

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_active() {
            *state = BatchState::Idle;
        }
    }
}

/// Starts batches on a background thread, at most one at a time.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    state: SharedState,
}

impl BatchRunner {
    /// Creates an idle runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the current batch state.
    #[must_use]
    pub fn state(&self) -> BatchState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true while a batch is validating or processing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    /// Starts `worker` on a dedicated thread and returns immediately.
    ///
    /// Progress arrives on the channel behind `reporter`. The returned handle
    /// may be joined or dropped; dropping it detaches the batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchInProgress`] if a batch is already running, or
    /// [`Error::Worker`] if the thread cannot be spawned.
    pub fn spawn(&self, worker: BatchWorker, reporter: Reporter) -> Result<JoinHandle<BatchOutcome>> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.is_active() {
                warn!("Rejected style check: a batch is already running");
                return Err(Error::BatchInProgress);
            }
            *state = BatchState::Validating;
        }

        let state = Arc::clone(&self.state);
        thread::Builder::new()
            .name("style-check-batch".to_string())
            .spawn(move || {
                let _guard = RunGuard(Arc::clone(&state));
                worker.execute(&reporter, &state)
            })
            .map_err(|e| {
                set_state(&self.state, BatchState::Idle);
                Error::Worker {
                    message: e.to_string(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::tests::FakeGenerator;
    use crate::report;
    use assert_fs::prelude::*;
    use std::path::Path;
    use std::sync::mpsc;

    fn guide(temp: &assert_fs::TempDir) -> std::path::PathBuf {
        let guide = temp.child("guides/style.txt");
        guide.write_str("Use four spaces.").unwrap();
        guide.path().to_path_buf()
    }

    fn config(root: &Path, style_guide: &Path) -> Config {
        Config::builder()
            .root_dir(root)
            .language(Language::Python)
            .model("codellama")
            .style_guide_path(style_guide)
            .build()
            .unwrap()
    }

    fn run(config: Config, generator: FakeGenerator) -> (BatchOutcome, Vec<BatchEvent>) {
        let (reporter, rx) = report::channel();
        let outcome = BatchWorker::new(config, Arc::new(generator)).run(&reporter);
        drop(reporter);
        (outcome, rx.iter().collect())
    }

    fn count_files(dir: &Path, suffix: &str) -> usize {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
            .count()
    }

    #[test]
    fn test_batch_processes_all_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        let style_guide = guide(&temp);
        temp.child("proj/a.py").write_str("x=1").unwrap();
        temp.child("proj/pkg/b.py").write_str("y=2").unwrap();
        temp.child("proj/notes.txt").write_str("skip").unwrap();

        let (outcome, events) = run(
            config(temp.child("proj").path(), &style_guide),
            FakeGenerator::always("x = 1\n"),
        );

        let BatchOutcome::Completed(stats) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(count_files(temp.path(), ".py_mod"), 2);
        assert_eq!(count_files(temp.path(), ".py_prompt"), 2);
        assert!(matches!(events.first(), Some(BatchEvent::Started { total: 2, .. })));
        assert_eq!(events.last().unwrap().to_string(), "All files processed.");
    }

    #[test]
    fn test_stats_to_json() {
        let stats = BatchStats {
            total_files: 3,
            succeeded: 1,
            skipped: 1,
            failed: 1,
            duration: Duration::from_millis(1500),
        };

        let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();

        assert_eq!(json["total_files"], 3);
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["duration"]["secs"], 1);
        assert_eq!(json["duration"]["nanos"], 500_000_000);
    }

    #[test]
    fn test_invalid_utf8_file_does_not_stop_batch() {
        let temp = assert_fs::TempDir::new().unwrap();
        let style_guide = guide(&temp);
        temp.child("proj/a.py").write_binary(&[0xff, 0xfe, 0x00, 0x80]).unwrap();
        temp.child("proj/b.py").write_str("print('ok')").unwrap();

        let (outcome, events) = run(
            config(temp.child("proj").path(), &style_guide),
            FakeGenerator::always("print(\"ok\")\n"),
        );

        let BatchOutcome::Completed(stats) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);

        let failed = events
            .iter()
            .position(|e| matches!(e, BatchEvent::FileFailed { file, .. } if file == "a.py"))
            .expect("a.py should fail");
        let succeeded = events
            .iter()
            .position(|e| matches!(e, BatchEvent::FileSucceeded { file, .. } if file == "b.py"))
            .expect("b.py should succeed");
        assert!(failed < succeeded);
        assert_eq!(count_files(temp.child("proj").path(), ".py_mod"), 1);
    }

    #[test]
    fn test_missing_style_guide_processes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("proj/a.py").write_str("x=1").unwrap();
        let generator = FakeGenerator::always("x = 1");

        let (reporter, rx) = report::channel();
        let generator = Arc::new(generator);
        let outcome = BatchWorker::new(
            config(temp.child("proj").path(), temp.child("missing.txt").path()),
            generator.clone(),
        )
        .run(&reporter);
        drop(reporter);
        let events: Vec<_> = rx.iter().collect();

        assert!(matches!(outcome, BatchOutcome::Aborted(AbortReason::StyleGuide(_))));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity(), Severity::Error);
        assert!(events[0].to_string().starts_with("Error reading style guide"));
        assert!(generator.prompts.lock().unwrap().is_empty());
        assert_eq!(count_files(temp.path(), "_prompt"), 0);
    }

    #[test]
    fn test_no_matching_files_is_informational() {
        let temp = assert_fs::TempDir::new().unwrap();
        let style_guide = guide(&temp);
        temp.child("proj/readme.md").write_str("# hi").unwrap();

        let (outcome, events) = run(
            config(temp.child("proj").path(), &style_guide),
            FakeGenerator::always("unused"),
        );

        assert_eq!(
            outcome,
            BatchOutcome::Aborted(AbortReason::NoFiles {
                language: Language::Python
            })
        );
        assert_eq!(events[0].severity(), Severity::Info);
        assert_eq!(
            events[0].to_string(),
            "No Python files found in the selected folder."
        );
        assert_eq!(count_files(temp.path(), "_prompt"), 0);
    }

    #[test]
    fn test_empty_root_is_warning() {
        let temp = assert_fs::TempDir::new().unwrap();
        let style_guide = guide(&temp);

        let (outcome, events) = run(config(Path::new(""), &style_guide), FakeGenerator::always(""));

        assert_eq!(outcome, BatchOutcome::Aborted(AbortReason::NoFolder));
        assert_eq!(events[0].severity(), Severity::Warning);
    }

    #[test]
    fn test_missing_root_is_warning() {
        let temp = assert_fs::TempDir::new().unwrap();
        let style_guide = guide(&temp);

        let (outcome, _) = run(
            config(temp.child("nope").path(), &style_guide),
            FakeGenerator::always(""),
        );

        assert!(matches!(outcome, BatchOutcome::Aborted(AbortReason::InvalidFolder(_))));
    }

    #[test]
    fn test_missing_model_is_warning() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .root_dir(temp.path())
            .style_guide_path(guide(&temp))
            .build()
            .unwrap();

        let (outcome, _) = run(config, FakeGenerator::always(""));

        assert_eq!(outcome, BatchOutcome::Aborted(AbortReason::NoModel));
    }

    #[test]
    fn test_output_dir_receives_artifacts() {
        let temp = assert_fs::TempDir::new().unwrap();
        let style_guide = guide(&temp);
        temp.child("proj/a.py").write_str("x=1").unwrap();
        let out = temp.child("out");

        let config = Config::builder()
            .root_dir(temp.child("proj").path())
            .language(Language::Python)
            .model("m")
            .style_guide_path(&style_guide)
            .output_dir(out.path())
            .build()
            .unwrap();
        let (outcome, _) = run(config, FakeGenerator::always("x = 1"));

        assert!(matches!(outcome, BatchOutcome::Completed(_)));
        assert_eq!(count_files(out.path(), ".py_mod"), 1);
        assert_eq!(count_files(temp.child("proj").path(), ".py_mod"), 0);
    }

    /// Blocks each generation until the test releases it.
    struct GatedGenerator {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl Generator for GatedGenerator {
        fn try_generate(&self, _prompt: &str, _model: &str) -> Result<String> {
            let _ = self.gate.lock().unwrap().recv();
            Ok("done".to_string())
        }
    }

    #[test]
    fn test_runner_rejects_second_batch_while_running() {
        let temp = assert_fs::TempDir::new().unwrap();
        let style_guide = guide(&temp);
        temp.child("proj/a.py").write_str("x=1").unwrap();
        let (release, gate) = mpsc::channel();
        let generator: Arc<dyn Generator> = Arc::new(GatedGenerator {
            gate: Mutex::new(gate),
        });

        let runner = BatchRunner::new();
        let (reporter, rx) = report::channel();
        let handle = runner
            .spawn(
                BatchWorker::new(config(temp.child("proj").path(), &style_guide), generator.clone()),
                reporter.clone(),
            )
            .unwrap();

        // Wait until the first file is in flight.
        for event in rx.iter() {
            if matches!(event, BatchEvent::PromptWritten { .. }) {
                break;
            }
        }
        assert!(runner.is_running());

        let second = runner.spawn(
            BatchWorker::new(config(temp.child("proj").path(), &style_guide), generator),
            reporter,
        );
        assert!(matches!(second, Err(Error::BatchInProgress)));

        release.send(()).unwrap();
        let outcome = handle.join().unwrap();

        assert!(matches!(outcome, BatchOutcome::Completed(_)));
        assert_eq!(runner.state(), BatchState::Completed);
        assert!(!runner.is_running());
    }

    #[test]
    fn test_runner_state_after_abort() {
        let temp = assert_fs::TempDir::new().unwrap();
        let style_guide = guide(&temp);
        let runner = BatchRunner::new();
        let (reporter, _rx) = report::channel();

        let handle = runner
            .spawn(
                BatchWorker::new(
                    config(temp.child("empty").path(), &style_guide),
                    Arc::new(FakeGenerator::always("")),
                ),
                reporter,
            )
            .unwrap();
        handle.join().unwrap();

        assert!(matches!(
            runner.state(),
            BatchState::Aborted(AbortReason::InvalidFolder(_))
        ));
    }
}
