use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use style_checker::{
    channel, BatchEvent, BatchOutcome, BatchRunner, BatchWorker, Config, Language, OllamaClient,
    Scanner, Severity, TimestampStyle, DEFAULT_BASE_URL,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "style-checker",
    version,
    author,
    about = "Rewrite source files to follow a style guide using a local LLM",
    long_about = "Rewrite source files to follow a style guide using a local LLM.\n\n\
    Every file with the selected language's extension is sent to an Ollama server \
    together with the style guide. The prompt and the rewritten code are saved \
    next to the original under timestamped names; the original is never touched.\n\n\
    USAGE EXAMPLES:\n  \
      # Check whether the server is up\n  \
      style-checker status\n\n  \
      # List the files a check would process\n  \
      style-checker scan --dir ./MyProject\n\n  \
      # Rewrite every C# file with the first running model\n  \
      style-checker check --dir ./MyProject\n\n  \
      # Rewrite Python files with a given model and guide\n  \
      style-checker check --dir ./app --language python --model codellama \\\n      \
        --style-guide ./guides/pep8.txt"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the LLM server
    #[arg(long, global = true, env = "STYLE_CHECKER_SERVER", default_value = DEFAULT_BASE_URL)]
    server: String,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite every matching file and save the results as artifacts
    Check(CheckArgs),
    /// List the files a check would process
    Scan(ScanArgs),
    /// Probe whether the LLM server is running
    Status,
    /// List the models currently loaded on the server
    Models,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Root directory to search for source files
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    dir: PathBuf,

    /// Language whose files are selected
    #[arg(short, long, value_enum, default_value = "csharp")]
    language: CliLanguage,

    /// Only look at the root directory, not its subdirectories
    #[arg(long)]
    no_recursive: bool,

    /// Glob pattern to skip (can be used multiple times)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    scan: ScanArgs,

    /// Model to use (defaults to the first running model)
    #[arg(short, long)]
    model: Option<String>,

    /// Style guide text file
    ///
    /// Defaults to the bundled `style_guides/google_csharp_style_guide.txt`,
    /// looked up in the working directory, then beside the executable.
    #[arg(short, long, value_name = "FILE")]
    style_guide: Option<PathBuf>,

    /// Directory for artifacts (defaults to beside each source file)
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Timestamp layout used in artifact names
    #[arg(long, value_enum, default_value = "compact")]
    timestamp: CliTimestamp,

    /// Path to custom Tera prompt template
    ///
    /// The template must use the `style_guide` and `code` variables;
    /// `language` and `file_name` are also available.
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Seconds to wait for one generation request
    #[arg(long, default_value_t = 120, value_name = "SECS")]
    timeout: u64,

    /// Print the batch statistics as JSON instead of the summary box
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliLanguage {
    #[value(name = "csharp")]
    CSharp,
    C,
    Cpp,
    Python,
    Java,
    #[value(name = "javascript")]
    JavaScript,
}

impl From<CliLanguage> for Language {
    fn from(l: CliLanguage) -> Self {
        match l {
            CliLanguage::CSharp => Self::CSharp,
            CliLanguage::C => Self::C,
            CliLanguage::Cpp => Self::Cpp,
            CliLanguage::Python => Self::Python,
            CliLanguage::Java => Self::Java,
            CliLanguage::JavaScript => Self::JavaScript,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTimestamp {
    /// 20240131_235959
    Compact,
    /// 310124_235959
    DayFirst,
}

impl From<CliTimestamp> for TimestampStyle {
    fn from(t: CliTimestamp) -> Self {
        match t {
            CliTimestamp::Compact => Self::Compact,
            CliTimestamp::DayFirst => Self::DayFirst,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    match cli.command {
        Command::Check(args) => check(&cli.server, args),
        Command::Scan(args) => scan(&args),
        Command::Status => {
            let client = client(&cli.server, None)?;
            println!("Ollama Server: {}", client.status());
            Ok(())
        }
        Command::Models => {
            let client = client(&cli.server, None)?;
            println!("{}", client.model_list());
            Ok(())
        }
    }
}

fn client(server: &str, generate_timeout: Option<Duration>) -> anyhow::Result<OllamaClient> {
    let mut builder = OllamaClient::builder().base_url(server);
    if let Some(timeout) = generate_timeout {
        builder = builder.generate_timeout(timeout);
    }
    builder.build().context("Failed to create HTTP client")
}

fn scan(args: &ScanArgs) -> anyhow::Result<()> {
    let language = Language::from(args.language);
    let config = Config::builder()
        .root_dir(&args.dir)
        .language(language)
        .recursive(!args.no_recursive)
        .exclude(args.exclude.clone())
        .build()
        .context("Failed to build configuration")?;

    let files = Scanner::from_config(&config)?
        .scan()
        .context("Failed to scan directory")?;

    if files.is_empty() {
        println!("No matching files found.");
        return Ok(());
    }

    println!("Found {} {} file(s):", files.len(), language);
    for file in &files {
        println!("{}", file.relative_path);
    }

    Ok(())
}

fn check(server: &str, args: CheckArgs) -> anyhow::Result<()> {
    let client = client(server, Some(Duration::from_secs(args.timeout)))?;

    let model = match args.model {
        Some(model) => model,
        None => client
            .model_list()
            .first()
            .map(str::to_string)
            .context("No running model found; pass --model or load a model on the server")?,
    };

    let mut builder = Config::builder()
        .root_dir(args.scan.dir)
        .language(args.scan.language.into())
        .recursive(!args.scan.no_recursive)
        .exclude(args.scan.exclude)
        .model(model)
        .server_url(server)
        .generate_timeout(Duration::from_secs(args.timeout))
        .timestamp_style(args.timestamp.into());

    if let Some(style_guide) = args.style_guide {
        builder = builder.style_guide_path(style_guide);
    }

    if let Some(out) = args.out {
        builder = builder.output_dir(out);
    }

    if let Some(template_path) = args.template {
        builder = builder.template_path(template_path);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let runner = BatchRunner::new();
    let (reporter, events) = channel();
    let handle = runner
        .spawn(BatchWorker::new(config, Arc::new(client)), reporter)
        .context("Failed to start style check")?;

    // Ends once the worker drops its reporter.
    for event in events {
        print_event(&event);
    }

    let outcome = handle
        .join()
        .map_err(|_| anyhow!("Style check thread panicked"))?;

    if let BatchOutcome::Completed(stats) = outcome {
        if args.json {
            println!("{}", stats.to_json()?);
        } else {
            stats.print_summary();
        }
    }

    Ok(())
}

fn print_event(event: &BatchEvent) {
    match event {
        BatchEvent::Aborted {
            severity: Severity::Warning,
            ..
        } => println!("Warning: {event}"),
        BatchEvent::Aborted {
            severity: Severity::Error,
            ..
        } => println!("Error: {event}"),
        _ => println!("{event}"),
    }
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("style_checker=info"),
        1 => EnvFilter::new("style_checker=debug"),
        _ => EnvFilter::new("style_checker=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .init();

    Ok(())
}
