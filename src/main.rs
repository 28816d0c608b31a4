use anyhow::{anyhow, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pageflow::config::{Settings, DEFAULT_CONFIG_PATH};
use pageflow::etl::Etl;
use pageflow::extractor::Extractor;
use pageflow::loader::Loader;
use pageflow::parser::JsonStringParser;
use pageflow::reader::HttpReader;
use pageflow::serializer::CsvSerializer;
use pageflow::stats::RunSummary;
use pageflow::transform::FilterAndSort;
use pageflow::writer::LocalFileWriter;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const EXIT_NO_QUERY: u8 = 1;
const EXIT_BAD_CONFIG: u8 = 2;
const EXIT_SINK_UNAVAILABLE: u8 = 3;
const EXIT_STARTUP: u8 = 4;

#[derive(Parser)]
#[command(name = "pageflow")]
#[command(about = "Fetch paginated JSON suggestions and write them as CSV")]
struct Cli {
    /// Query term appended to the API URL (e.g. a city name)
    query: Option<String>,

    /// TOML settings file; missing file means defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Output CSV path, overrides `csv_path`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read attempts per page, overrides `connection_attempts`
    #[arg(long, allow_negative_numbers = true)]
    attempts: Option<i64>,

    /// Seconds between read attempts, overrides `reconnection_delay`
    #[arg(long, allow_negative_numbers = true)]
    delay: Option<i64>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// A startup failure and the exit status it maps to
struct Fatal {
    status: u8,
    error: anyhow::Error,
}

impl Fatal {
    fn new(status: u8, error: anyhow::Error) -> Self {
        Self { status, error }
    }
}

fn make_spinner() -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {pos} pages, {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn run(cli: Cli) -> Result<RunSummary, Fatal> {
    let query = cli
        .query
        .ok_or_else(|| Fatal::new(EXIT_NO_QUERY, anyhow!("No query term given")))?;

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))
        .map_err(|e| Fatal::new(EXIT_BAD_CONFIG, e))?;
    if let Some(output) = cli.output {
        settings.csv_path = output;
    }
    if let Some(attempts) = cli.attempts {
        settings.connection_attempts = attempts;
    }
    if let Some(delay) = cli.delay {
        settings.reconnection_delay = delay;
    }

    let url = settings
        .source_url(&query)
        .context("Failed to build source URL")
        .map_err(|e| Fatal::new(EXIT_BAD_CONFIG, e))?;
    let csv_delimiter = settings
        .csv_delimiter_byte()
        .map_err(|e| Fatal::new(EXIT_BAD_CONFIG, e.into()))?;

    let writer = LocalFileWriter::create(&settings.csv_path)
        .context("Failed to open output")
        .map_err(|e| Fatal::new(EXIT_SINK_UNAVAILABLE, e))?;

    let reader = HttpReader::new(url.clone(), settings.request_timeout())
        .context("Failed to build HTTP client")
        .map_err(|e| Fatal::new(EXIT_STARTUP, e))?;

    if settings.max_attempts() == 0 {
        warn!(
            connection_attempts = settings.connection_attempts,
            "Attempt budget is zero, nothing will be extracted"
        );
    }

    let parser = JsonStringParser::new(settings.attributes_delimiter.clone());

    info!(
        url = %url,
        output = %writer.path().display(),
        key_delimiter = parser.delimiter(),
        attributes = ?settings.attributes_wanted,
        "Starting run"
    );

    let extractor = Extractor::new(
        reader,
        parser,
        settings.max_attempts(),
        settings.retry_delay(),
    );
    let loader = Loader::new(writer, CsvSerializer::new(csv_delimiter));
    let transformation = FilterAndSort::new(&settings.attributes_wanted);
    let etl = Etl::new(extractor, loader, transformation).with_progress(make_spinner());

    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("pageflow-worker")
        .enable_io()
        .enable_time()
        .build()
        .context("Failed to start async runtime")
        .map_err(|e| Fatal::new(EXIT_STARTUP, e))?;

    Ok(rt.block_on(etl.run()))
}

fn print_summary(summary: &RunSummary, duration: Duration) {
    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", duration.as_secs_f64());
    println!();
    println!("Pages read:         {}", summary.pages_read);
    println!("Read failures:      {}", summary.read_failures);
    println!("Records extracted:  {}", summary.records_extracted);
    println!("Batches loaded:     {}", summary.batches_loaded);
    println!("Records loaded:     {}", summary.records_loaded);
    println!("Failed writes:      {}", summary.failed_writes);
    println!("Failed units:       {}", summary.failed_units);
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    let start = Instant::now();
    match run(cli) {
        Ok(summary) => {
            if summary.failed_writes > 0 || summary.failed_units > 0 {
                warn!(
                    failed_writes = summary.failed_writes,
                    failed_units = summary.failed_units,
                    "Some pages were not written, see the log for lost data"
                );
            }
            print_summary(&summary, start.elapsed());
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(Fatal { status, error }) => {
            error!("Error: {:#}", error);
            eprintln!("Error: {:#}", error);
            ExitCode::from(status)
        }
    }
}
