use anyhow::Context;
use clap::{ArgGroup, Parser};
use job_insight::config::{Config, LoggingConfig, ReportFormat};
use job_insight::services::job_analyzer::report::JsonReport;
use job_insight::services::job_analyzer::{self, ReportFormatter};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "job-insight", version, about = "Rank bottlenecks in a job's plan and runtime telemetry")]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .multiple(true)
        .args(["plan", "runtime", "documents"])
))]
struct Cli {
    /// Vertex plan document
    #[arg(long, value_name = "PATH")]
    plan: Option<PathBuf>,

    /// Runtime statistics document
    #[arg(long, value_name = "PATH")]
    runtime: Option<PathBuf>,

    /// Documents of either kind, detected from their content
    #[arg(value_name = "FILE")]
    documents: Vec<PathBuf>,

    /// Output format: markdown or json
    #[arg(long)]
    format: Option<ReportFormat>,

    /// Entries per ranking view
    #[arg(long)]
    top_n: Option<usize>,

    /// Configuration file (default: conf/config.toml or config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Overrides are logged while loading, before the configured subscriber exists
    let mut config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        Config::load(cli.config.as_deref())
    })
    .context("Failed to load configuration")?;
    if let Some(top_n) = cli.top_n {
        config.analysis.top_n = top_n;
    }
    if let Some(format) = cli.format {
        config.report.format = format;
    }
    config.validate()?;

    let _guard = init_logging(&config.logging)?;
    tracing::info!(
        "Analyzing job (plan: {:?}, runtime: {:?}, detected: {})",
        cli.plan,
        cli.runtime,
        cli.documents.len()
    );

    let docs = job_analyzer::load_documents(cli.plan.as_deref(), cli.runtime.as_deref(), &config.analysis)
        .await
        .load_detected(&cli.documents, &config.analysis)
        .await;

    let analysis = job_analyzer::analyze(&docs, &config.analysis);
    let output = match config.report.format {
        ReportFormat::Markdown => ReportFormatter::new(config.analysis.time_unit).render(&analysis),
        ReportFormat::Json => {
            JsonReport::new(&analysis, docs.plan_path.as_deref(), docs.runtime_path.as_deref()).render()?
        },
    };
    println!("{}", output);

    Ok(())
}

/// Stderr subscriber used until the configured one is installed
///
/// Honors `RUST_LOG`, falling back to the default logging level.
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LoggingConfig::default().level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
}

/// Logs go to stderr, plus a non-blocking file writer when `logging.file` is set
///
/// The returned guard must live until exit so buffered file output is flushed.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::from_default_env());
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(file) = config.file.as_deref() else {
        tracing_subscriber::registry().with(filter).with(stderr_layer).init();
        return Ok(None);
    };

    let path = Path::new(file);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = path.file_name().context("logging.file has no file name")?;
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(Some(guard))
}
