//! hsloader - load HeapStats snapshot and resource log records into
//! Elasticsearch.
//!
//! Prints `Succeeded` or `Failed` once every input has been processed and
//! all bulk requests have drained.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hsloader_core::{
    BatchPublisher, BulkSink, ElasticsearchSink, ProgressContext, log_error,
};

mod config;
mod settings;

use config::Config;
use settings::{Overrides, Settings, expand_files};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// HeapStats snapshot files
    Snapshot,
    /// HeapStats resource log files
    Log,
}

#[derive(Parser)]
#[command(name = "hsloader")]
#[command(about = "Load HeapStats snapshot and resource log data into Elasticsearch")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Kind of input files
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Elasticsearch host
    #[arg(long)]
    host: Option<String>,

    /// Elasticsearch HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Documents per bulk request
    #[arg(long)]
    bulk: Option<usize>,

    /// IANA zone the records were written in (default: system zone)
    #[arg(long)]
    timezone: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Bulk requests in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Prefix of every index name; empty for none
    #[arg(long)]
    index_prefix: Option<String>,

    /// Enable debug logging and full error chains
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Config file path (default: ./hsloader.toml or ~/.config/hsloader/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Input files or glob patterns
    files: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Show effective configuration
    Config,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            bulk: self.bulk,
            timezone: self.timezone.clone(),
            timeout: self.timeout,
            concurrency: self.concurrency,
            index_prefix: self.index_prefix.clone(),
            debug: self.debug,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let progress = ProgressContext::new();
    let multi = if progress.is_tty() {
        Some(progress.multi())
    } else {
        None
    };
    hsloader_core::init_logging(cli.quiet, cli.debug, multi);

    match run(cli, &progress) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// `Ok(succeeded)` once the run completed; `Err` for configuration errors.
fn run(cli: Cli, progress: &ProgressContext) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let settings = Settings::resolve(&config, &cli.overrides())?;

    if let Some(Command::Config) = cli.command {
        print_config(&settings);
        return Ok(true);
    }

    let mode = cli
        .mode
        .context("--mode is required (snapshot or log)")?;
    let files = expand_files(&cli.files)?;
    hsloader_core::install_signal_handlers().context("Failed to register signal handlers")?;

    log::info!("Loading {} {:?} files into {}", files.len(), mode, settings.sink.bulk_url());
    let sink = ElasticsearchSink::new(settings.sink.clone())
        .context("Failed to create Elasticsearch client")?;
    let publisher = BatchPublisher::new(Arc::new(sink) as Arc<dyn BulkSink>, settings.publisher);

    let mut parse_failed = false;
    match mode {
        Mode::Snapshot => {
            let mut parser = hsloader_snapshot::JsonDumpParser::new();
            hsloader_snapshot::run(&mut parser, &files, &publisher, settings.options, progress);
        }
        Mode::Log => {
            let mut source = hsloader_log::JsonDumpSource::new(files);
            if let Err(e) = hsloader_log::run(&mut source, &publisher, settings.options, progress) {
                log_error("log files", &e, settings.options.debug);
                parse_failed = true;
            }
        }
    }

    let result = match publisher.close() {
        Ok(result) => {
            log::info!(
                "Bulk: {} requests, {} documents ({} failed)",
                result.batches,
                hsloader_core::fmt_num(result.documents),
                result.failed_documents
            );
            result
        }
        Err(e) => {
            log_error("bulk publisher", &e, settings.options.debug);
            publisher.result()
        }
    };

    println!("{}", result.status_line());
    if parse_failed {
        anyhow::bail!("log files could not be parsed");
    }
    Ok(result.succeeded)
}

fn print_config(settings: &Settings) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Bulk endpoint", &settings.sink.bulk_url()]);
    table.add_row(vec![
        "Index prefix",
        if settings.sink.index_prefix.is_empty() {
            "(none)"
        } else {
            settings.sink.index_prefix.as_str()
        },
    ]);
    table.add_row(vec![
        "Timeout",
        &format!("{}s", settings.sink.timeout.as_secs()),
    ]);
    table.add_row(vec!["Bulk size", &settings.publisher.bulk_size.to_string()]);
    table.add_row(vec![
        "Concurrency",
        &settings.publisher.concurrency.to_string(),
    ]);
    table.add_row(vec!["Time zone", &settings.options.zone.to_string()]);

    eprintln!("\n{table}");
}
