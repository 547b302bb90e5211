//! autoclick: Submit Autoclicker host binary
//!
//! Wires the settings store, the coordinator service and page contexts
//! into one process.
//!
//! Usage:
//!   autoclick run <page.json>... [--once]   - Automate page fixtures
//!   autoclick console                       - Interactive control surface
//!   autoclick send '<json>'                 - One raw coordinator message
//!   autoclick --help                        - Show help

mod cli;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ac_coordinator::{Coordinator, CoordinatorHandle, IndicatorSink};
use ac_core::{HostConfig, Indicator, MemoryStore, SettingsStore, SqliteStore, StoreBackend};
use ac_engine::{FixturePage, ObservableScope, PageContext, PageFixture, ScanOutcome};
use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq)]
enum RunMode {
    /// Automate the given page fixtures
    Run { pages: Vec<PathBuf>, once: bool },
    /// Interactive control surface
    Console,
    /// Send one raw JSON message
    Send(String),
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = match parse_args(std::env::args().skip(1)) {
        Ok(mode) => mode,
        Err(message) => {
            eprintln!("autoclick: {}", message);
            eprintln!("Try 'autoclick --help'.");
            std::process::exit(2);
        }
    };

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("autoclick {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    dotenvy::dotenv().ok();

    let config = HostConfig::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = open_store(&config)?;
    let coordinator =
        Arc::new(Coordinator::new(store.clone()).with_indicator(Arc::new(LogIndicator)));
    let (handle, service) = ac_coordinator::spawn(coordinator.clone());

    let result = match mode {
        RunMode::Run { pages, once } => run_pages(&config, store, &coordinator, handle, &pages, once).await,
        RunMode::Console => cli::run_console(coordinator, handle).await,
        RunMode::Send(raw) => send_raw(handle, &raw).await,
        RunMode::Help | RunMode::Version => Ok(()),
    };

    // Every handle is gone by now, so the service winds down on its own.
    let _ = service.await;
    result
}

/// Parse command line arguments (without the program name)
fn parse_args<I>(args: I) -> Result<RunMode, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(RunMode::Help);
    };

    match command.as_str() {
        "--help" | "-h" | "help" => Ok(RunMode::Help),
        "--version" | "-v" => Ok(RunMode::Version),
        "console" => Ok(RunMode::Console),
        "send" => {
            let raw: Vec<String> = args.collect();
            if raw.is_empty() {
                return Err("send needs a JSON message".to_string());
            }
            Ok(RunMode::Send(raw.join(" ")))
        }
        "run" => {
            let mut pages = Vec::new();
            let mut once = false;
            for arg in args {
                match arg.as_str() {
                    "--once" => once = true,
                    flag if flag.starts_with('-') => return Err(format!("unknown flag: {}", flag)),
                    path => pages.push(PathBuf::from(path)),
                }
            }
            if pages.is_empty() {
                return Err("run needs at least one page fixture".to_string());
            }
            Ok(RunMode::Run { pages, once })
        }
        other => Err(format!("unknown command: {}", other)),
    }
}

fn print_help() {
    println!("autoclick - Submit button auto-activation");
    println!();
    println!("Usage:");
    println!("  autoclick run <page.json>... [--once]  Automate page fixtures until Ctrl+C");
    println!("  autoclick console                      Interactive control surface");
    println!("  autoclick send '<json>'                Send one message to the coordinator");
    println!("  autoclick --help                       Show this help message");
    println!("  autoclick --version                    Show version");
    println!();
    println!("Environment Variables:");
    println!("  AUTOCLICK_STORE      Store backend: sqlite or memory (default: sqlite)");
    println!("  AUTOCLICK_DB_PATH    SQLite file (default: data/autoclick.db)");
    println!("  AUTOCLICK_TICK_MS    Periodic rescan interval (default: 2000)");
    println!("  AUTOCLICK_LOG        Log filter when RUST_LOG is unset (default: info)");
}

fn open_store(config: &HostConfig) -> anyhow::Result<Arc<dyn SettingsStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory settings store");
            Ok(Arc::new(MemoryStore::with_area(config.store.area.clone())))
        }
        StoreBackend::Sqlite => {
            let path = PathBuf::from(&config.store.db_path);
            let store = SqliteStore::open(&path, config.store.area.clone())
                .map_err(|e| anyhow::anyhow!("Failed to open settings store: {}", e))?;
            info!("Using settings store at {}", path.display());
            Ok(Arc::new(store))
        }
    }
}

/// Badge renderer for a terminal host
struct LogIndicator;

impl IndicatorSink for LogIndicator {
    fn render(&self, url: &str, indicator: Indicator) {
        info!(url, badge = indicator.text(), color = indicator.color(), "Badge updated");
    }
}

async fn run_pages(
    config: &HostConfig,
    store: Arc<dyn SettingsStore>,
    coordinator: &Coordinator,
    handle: CoordinatorHandle,
    paths: &[PathBuf],
    once: bool,
) -> anyhow::Result<()> {
    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let fixture = PageFixture::from_json_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?;
        pages.push(FixturePage::from_fixture(fixture));
    }

    let tick = Duration::from_millis(config.engine.tick_interval_ms);
    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let channel = Arc::new(handle);
    let mut contexts = Vec::with_capacity(pages.len());
    for (index, page) in pages.iter().enumerate() {
        let context = PageContext::new(Arc::new(page.clone()), store.clone(), channel.clone(), tick)
            .with_outcomes(page_outcomes(index, tx.clone()))
            .spawn();
        info!(page = %context.id(), url = %page.url(), "Page context started");
        contexts.push(context);
    }
    drop(tx);

    if let Some(first) = pages.first() {
        if let Err(e) = coordinator.focus_page(&first.url()).await {
            tracing::warn!(error = %e, "Failed to render badge");
        }
    }

    if once {
        // Each context evaluates once right after it starts.
        let mut finished = HashSet::new();
        while finished.len() < contexts.len() {
            let Some((index, outcome)) = outcomes.recv().await else {
                break;
            };
            if finished.insert(index) {
                print_outcome(&outcome);
            }
        }
    } else {
        info!("Press Ctrl+C to exit");
        loop {
            tokio::select! {
                outcome = outcomes.recv() => match outcome {
                    Some((_, outcome)) => print_outcome(&outcome),
                    None => break,
                },
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
            }
        }
    }

    info!("Shutting down...");
    for context in contexts {
        context.shutdown().await;
    }
    info!("Shutdown complete");
    Ok(())
}

/// Outcome sender for one page that tags every outcome with `index`.
fn page_outcomes(
    index: usize,
    merged: mpsc::UnboundedSender<(usize, ScanOutcome)>,
) -> mpsc::UnboundedSender<ScanOutcome> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(outcome) = rx.recv().await {
            if merged.send((index, outcome)).is_err() {
                break;
            }
        }
    });
    tx
}

fn print_outcome(outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Activated(report) => {
            let mode = if report.dry_run { "dry-run" } else { "live" };
            println!("{} activated \"{}\" ({}) at {}", report.origin, report.label, mode, report.at);
        }
        ScanOutcome::ActivationFailed { label, error } => {
            println!("activation of \"{}\" failed: {}", label, error);
        }
        other => tracing::debug!(outcome = ?other, "Scan finished"),
    }
}

async fn send_raw(handle: CoordinatorHandle, raw: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw).context("Message is not valid JSON")?;
    let response = handle.handle_json(value).await;
    println!("{}", serde_json::to_string_pretty(&response.to_json())?);
    Ok(())
}
