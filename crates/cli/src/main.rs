use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};

use olya_core::{
    config::{self, AppConfig},
    ingest::{DataLoader, DataWatcher, RecordCache, WatchEvent},
    report::{ReportStore, RunReport},
    run::{PlanningRun, PlanningSnapshot, RunSettings, Strategy},
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Quiet period collecting bursts of filesystem events into one rerun.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(300);
/// Conflicts listed in the console summary.
const SUMMARY_CONFLICTS: usize = 10;

/// Transshipment planning runs over a data directory.
#[derive(Debug, Parser)]
#[command(name = "olya", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Run once and persist the report; keeps watching when `watch` is configured.
    Run,
    /// Run once, then recompute whenever the data directory changes.
    Watch,
    /// Compare voyage subsets listed in a JSON file of `{name, voyage_ids}`.
    Compare {
        /// Strategies file.
        path: PathBuf,
    },
    /// Summarise the most recent report.
    Latest,
}

impl Command {
    fn watches(&self, config: &AppConfig) -> bool {
        match self {
            Self::Run => config.watch,
            Self::Watch => true,
            Self::Compare { .. } | Self::Latest => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let command = Cli::parse().command.unwrap_or(Command::Run);
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    let watch = command.watches(&config);

    // watcher events carry absolute paths; cache keys must match them
    let data_dir = fs::canonicalize(&config.data_dir).unwrap_or_else(|_| config.data_dir.clone());
    let loader = DataLoader::new(data_dir, RecordCache::new());
    let settings = RunSettings::from(&config);

    match command {
        Command::Run | Command::Watch => {
            let report = run_once(loader.clone(), settings.clone(), config.output_dir.clone()).await?;
            print_summary(&report);
            if watch {
                watch_loop(loader, settings, config.output_dir).await?;
            }
        }
        Command::Compare { path } => {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let strategies: Vec<Strategy> = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse strategies in {}", path.display()))?;
            let comparisons = tokio::task::spawn_blocking(move || -> Result<_> {
                let snapshot = PlanningSnapshot::from_input(loader.load()?, settings.expansion);
                Ok(PlanningRun::new(settings).compare_strategies(&snapshot, &strategies))
            })
            .await??;
            println!("{}", serde_json::to_string_pretty(&comparisons)?);
        }
        Command::Latest => match ReportStore::new(&config.output_dir).latest()? {
            Some(report) => print_summary(&report),
            None => println!("No reports in {}", config.output_dir.display()),
        },
    }

    Ok(())
}

async fn run_once(loader: DataLoader, settings: RunSettings, output_dir: PathBuf) -> Result<RunReport> {
    tokio::task::spawn_blocking(move || -> Result<RunReport> {
        let snapshot = PlanningSnapshot::from_input(loader.load()?, settings.expansion);
        let outcome = PlanningRun::new(settings).execute(&snapshot);
        let report = RunReport::from_outcome(&outcome, Utc::now());
        let path = ReportStore::new(output_dir).save(&report)?;
        info!("Report written to {}", path.display());
        Ok(report)
    })
    .await?
}

async fn watch_loop(loader: DataLoader, settings: RunSettings, output_dir: PathBuf) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(64);
    let _watcher = DataWatcher::spawn(loader.root(), tx)?;

    while let Some(event) = rx.recv().await {
        let mut changed = Vec::new();
        absorb(event, &mut changed);
        tokio::time::sleep(WATCH_DEBOUNCE).await;
        while let Ok(event) = rx.try_recv() {
            absorb(event, &mut changed);
        }
        if changed.is_empty() {
            continue;
        }

        for path in &changed {
            loader.cache().invalidate(path);
        }
        info!(files = changed.len(), "Data changed, recomputing");
        match run_once(loader.clone(), settings.clone(), output_dir.clone()).await {
            Ok(report) => print_summary(&report),
            Err(err) => error!("Planning run failed: {err:#}"),
        }
    }

    Ok(())
}

fn absorb(event: WatchEvent, changed: &mut Vec<PathBuf>) {
    match event {
        WatchEvent::Changed(paths) => {
            for path in paths {
                if !changed.contains(&path) {
                    changed.push(path);
                }
            }
        }
        WatchEvent::Error(err) => warn!("Watcher error: {err:#}"),
    }
}

fn print_summary(report: &RunReport) {
    let counts = &report.counts;
    println!(
        "{} | nodes {} | voyages {} | matches {} ({} overlapping) | conflicts {} critical, {} minor | skipped {}",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.nodes.join(","),
        counts.voyages,
        counts.matches,
        counts.overlaps,
        counts.critical_conflicts,
        counts.minor_conflicts,
        counts.skipped_records,
    );
    for conflict in report.conflicts.iter().take(SUMMARY_CONFLICTS) {
        println!("  [{:?}] {}", conflict.severity, conflict.description);
    }
    if report.conflicts.len() > SUMMARY_CONFLICTS {
        println!("  ... {} more", report.conflicts.len() - SUMMARY_CONFLICTS);
    }
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("olya.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
