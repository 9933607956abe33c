//! punchcard CLI - command-line interface for the punchcard library
//!
//! Commands:
//! - resolve: Show which source handles a resource
//! - ensure: Print the canonical key of a resource (or null)
//! - fetch: Fetch the activity punch card of a resource
//! - open: Open the resource's public page
//! - config: Print the effective configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use punchcard::types::{DAYS_PER_WEEK, HOURS_PER_DAY};
use punchcard::{
    ActivityGrid, ActivityPoint, Dispatcher, PrintOpener, ReqwestTransport, RetrieveError,
    RetrieverConfig, SystemOpener, PRODUCER_NAME, VERSION,
};

/// punchcard - day/hour activity punch cards for GitHub repositories and Wikipedia users
#[derive(Parser)]
#[command(name = "punchcard")]
#[command(version = VERSION)]
#[command(about = "Resolve a repository or wiki user and fetch its activity punch card", long_about = None)]
struct Cli {
    /// Config file (defaults to $PUNCHCARD_CONFIG, then ./punchcard.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which source handles a resource and its canonical key
    Resolve {
        /// Resource (owner/repo, user@xx.wikipedia.org, or a URL)
        resource: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the canonical key of a resource, or null if it is not recognized
    Ensure {
        /// Resource (owner/repo, user@xx.wikipedia.org, or a URL)
        resource: String,
    },

    /// Fetch the activity punch card of a resource
    Fetch {
        /// Resource (owner/repo, user@xx.wikipedia.org, or a URL)
        resource: String,

        /// Output format (defaults to grid on a terminal, json otherwise)
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Open the public page of a resource
    Open {
        /// Resource (owner/repo, user@xx.wikipedia.org, or a URL)
        resource: String,

        /// Print the URL instead of launching a browser
        #[arg(long)]
        print: bool,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// JSON array of [day, hour, count] triples
    Json,
    /// One [day, hour, count] triple per line
    Ndjson,
    /// 7x24 text heatmap
    Grid,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return report(CliFailure::Io(e)),
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "punchcard=debug" } else { "punchcard=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(io::stderr))
        .init();
}

fn report(e: CliFailure) -> ExitCode {
    if let CliFailure::NotRecognized = e {
        return ExitCode::FAILURE;
    }
    eprintln!(
        "{}",
        serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
    );
    ExitCode::FAILURE
}

async fn run(cli: Cli) -> Result<(), CliFailure> {
    let config = RetrieverConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve { resource, json } => cmd_resolve(&config, &resource, json),
        Commands::Ensure { resource } => cmd_ensure(&config, &resource),
        Commands::Fetch { resource, format } => cmd_fetch(&config, &resource, format).await,
        Commands::Open { resource, print } => cmd_open(&config, &resource, print),
        Commands::Config => cmd_config(&config),
    }
}

fn cmd_resolve(config: &RetrieverConfig, resource: &str, json: bool) -> Result<(), CliFailure> {
    let dispatcher = Dispatcher::new(config)?;
    let source = dispatcher.resolve(resource)?;
    let key = source.normalize(resource).unwrap_or_default();

    if json {
        let out = ResolveReport {
            source: source.kind().as_str(),
            key,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}\t{}", source.kind(), key);
    }
    Ok(())
}

fn cmd_ensure(config: &RetrieverConfig, resource: &str) -> Result<(), CliFailure> {
    let dispatcher = Dispatcher::new(config)?;
    match dispatcher.ensure(resource) {
        Some(key) => {
            println!("{key}");
            Ok(())
        }
        None => {
            println!("null");
            Err(CliFailure::NotRecognized)
        }
    }
}

async fn cmd_fetch(
    config: &RetrieverConfig,
    resource: &str,
    format: Option<OutputFormat>,
) -> Result<(), CliFailure> {
    let dispatcher = Dispatcher::new(config)?;
    let series = dispatcher.fetch(resource).await?;

    let format = format.unwrap_or(if atty::is(atty::Stream::Stdout) {
        OutputFormat::Grid
    } else {
        OutputFormat::Json
    });
    print!("{}", format_series(&series, format)?);
    Ok(())
}

fn cmd_open(config: &RetrieverConfig, resource: &str, print: bool) -> Result<(), CliFailure> {
    let transport = Arc::new(ReqwestTransport::new(config)?);
    let dispatcher = if print {
        Dispatcher::with_io(config, transport, Arc::new(PrintOpener))
    } else {
        Dispatcher::with_io(config, transport, Arc::new(SystemOpener))
    };
    dispatcher.open(resource)?;
    Ok(())
}

fn cmd_config(config: &RetrieverConfig) -> Result<(), CliFailure> {
    let out = ConfigReport {
        producer: PRODUCER_NAME,
        version: VERSION,
        config,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

// Helper functions

fn format_series(series: &[ActivityPoint], format: OutputFormat) -> Result<String, CliFailure> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(series)? + "\n"),
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for point in series {
                out.push_str(&serde_json::to_string(point)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Grid => Ok(render_grid(&ActivityGrid::from_series(series))),
    }
}

const DAY_LABELS: [&str; DAYS_PER_WEEK] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const SHADES: [char; 5] = [' ', '.', 'o', 'O', '@'];

fn render_grid(grid: &ActivityGrid) -> String {
    let max = grid.max();
    let mut out = String::from("    ");
    for hour in 0..HOURS_PER_DAY {
        out.push_str(&format!("{:>3}", hour));
    }
    out.push('\n');

    for (label, row) in DAY_LABELS.iter().zip(grid.rows()) {
        out.push_str(label);
        out.push(' ');
        for &count in row {
            let shade = if count == 0 || max == 0 {
                SHADES[0]
            } else {
                // 1..=4, never blank for a non-empty cell
                let level = 1 + (count.saturating_mul(3) / max) as usize;
                SHADES[level.min(SHADES.len() - 1)]
            };
            out.push_str("  ");
            out.push(shade);
        }
        out.push('\n');
    }

    out.push_str(&format!("total {} max {}\n", grid.total(), max));
    out
}

#[derive(Debug)]
enum CliFailure {
    Io(io::Error),
    Retrieve(RetrieveError),
    Json(serde_json::Error),
    NotRecognized,
}

impl From<io::Error> for CliFailure {
    fn from(e: io::Error) -> Self {
        CliFailure::Io(e)
    }
}

impl From<RetrieveError> for CliFailure {
    fn from(e: RetrieveError) -> Self {
        CliFailure::Retrieve(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CliFailure::NotRecognized => CliError {
                code: "NOT_RECOGNIZED".to_string(),
                message: "Resource not recognized".to_string(),
                hint: None,
            },
            CliFailure::Retrieve(e) => {
                let (code, hint) = match &e {
                    RetrieveError::InvalidInput => ("INVALID_INPUT", Some("Pass a non-empty resource")),
                    RetrieveError::UnknownFormat(_) => (
                        "UNKNOWN_FORMAT",
                        Some("Use owner/repo, user@xx.wikipedia.org, or a GitHub/Wikipedia URL"),
                    ),
                    RetrieveError::InvalidResource { .. } => ("INVALID_RESOURCE", None),
                    RetrieveError::Fetch(_) => {
                        ("FETCH_ERROR", Some("Check the resource exists and try again later"))
                    }
                    RetrieveError::Open { .. } => {
                        ("OPEN_ERROR", Some("Use --print to show the URL instead"))
                    }
                    RetrieveError::Config(_) => ("CONFIG_ERROR", Some("Check punchcard.toml and PUNCHCARD_* variables")),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ResolveReport {
    source: &'static str,
    key: String,
}

#[derive(serde::Serialize)]
struct ConfigReport<'a> {
    producer: &'static str,
    version: &'static str,
    config: &'a RetrieverConfig,
}
