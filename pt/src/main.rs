//! pt - duty progress tracker
//!
//! CLI entry point: wires the cache, cooldown gate, service client, and
//! mirror together and dispatches commands.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{info, warn};

use progtrack::cache::ResponseCache;
use progtrack::cli::{Cli, Command, OutputFormat};
use progtrack::config::Config;
use progtrack::cooldown::{CooldownGate, GateConfig};
use progtrack::domain::DutyId;
use progtrack::events::{EventBus, GameEvent};
use progtrack::gateway::{CachedProgress, HttpProgressClient, ProgressClient};
use progtrack::lookup::{DutyLookup, StaticDutyLookup};
use progtrack::mirror::ProgressMirror;
use progtrack::tracker::ActionTracker;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("progtrack")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("progtrack.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

/// Wired-together core components
struct App {
    mirror: Arc<ProgressMirror>,
    cache: Arc<ResponseCache>,
}

fn build_app(config: &Config) -> Result<App> {
    config.validate()?;

    let cache = Arc::new(ResponseCache::new(config.cache.ttl()));
    let http = HttpProgressClient::from_config(&config.remote)?;
    let client: Arc<dyn ProgressClient> = Arc::new(CachedProgress::new(http, Arc::clone(&cache)));
    let gate = Arc::new(CooldownGate::new(GateConfig::from(&config.cooldowns)));
    let mirror = Arc::new(ProgressMirror::new(client, gate));

    Ok(App { mirror, cache })
}

fn load_lookup(config: &Config) -> Result<StaticDutyLookup> {
    match &config.catalog.duties_file {
        Some(path) => StaticDutyLookup::from_file(path),
        None => {
            warn!("No duties-file configured; duty catalog is empty");
            Ok(StaticDutyLookup::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("progtrack loaded config: service={}", config.remote.base_url);

    match cli.command {
        Some(Command::Status { duty, format }) => cmd_status(&config, duty, format).await,
        Some(Command::Complete { duty }) => cmd_complete(&config, duty).await,
        Some(Command::CompleteBulk { duties }) => cmd_complete_bulk(&config, &duties).await,
        Some(Command::Points { duty, format }) => cmd_points(&config, duty, format).await,
        Some(Command::Refresh) => cmd_refresh(&config).await,
        Some(Command::Reset) => cmd_reset(&config),
        Some(Command::Watch { log, follow }) => cmd_watch(&config, &log, follow).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Show completion status for one duty
async fn cmd_status(config: &Config, duty: DutyId, format: OutputFormat) -> Result<()> {
    let app = build_app(config)?;
    let completed = app.mirror.is_duty_completed(duty).await;

    match format {
        OutputFormat::Text => {
            let state = if completed {
                "completed".green()
            } else {
                "not completed".yellow()
            };
            println!("duty {}: {}", duty, state);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "duty": duty,
                    "completed": completed,
                    "checked-at": chrono::Utc::now().to_rfc3339(),
                })
            );
        }
    }
    Ok(())
}

/// Mark one duty as completed
async fn cmd_complete(config: &Config, duty: DutyId) -> Result<()> {
    let app = build_app(config)?;
    match app.mirror.mark_duty_completed(duty).await {
        Ok(true) => {
            println!("{} duty {} marked completed", "ok:".green(), duty);
            Ok(())
        }
        Ok(false) => {
            println!("duty {} is already recorded as completed", duty);
            Ok(())
        }
        Err(error) => Err(eyre::eyre!("could not mark duty {} completed: {}", duty, error)),
    }
}

/// Mark several duties as completed in one service call
async fn cmd_complete_bulk(config: &Config, duties: &[DutyId]) -> Result<()> {
    let app = build_app(config)?;
    let report = app
        .mirror
        .mark_duties_completed_bulk(duties)
        .await
        .map_err(|error| eyre::eyre!("bulk completion failed: {}", error))?;

    println!(
        "{} {} newly completed, {} already recorded",
        "ok:".green(),
        report.newly_completed.len(),
        report.already_local.len()
    );
    if !report.rejected.is_empty() {
        let rejected: Vec<String> = report.rejected.iter().map(|duty| duty.to_string()).collect();
        println!("{} rejected as invalid: {}", "warning:".yellow(), rejected.join(", "));
    }
    Ok(())
}

/// List a duty's progress points
async fn cmd_points(config: &Config, duty: DutyId, format: OutputFormat) -> Result<()> {
    let app = build_app(config)?;
    let points = app
        .mirror
        .point_catalog(duty)
        .await
        .map_err(|error| eyre::eyre!("could not fetch points for duty {}: {}", duty, error))?;

    match format {
        OutputFormat::Text => {
            if points.is_empty() {
                println!("duty {} has no progress points", duty);
            }
            for point in points {
                let marker = if point.completed { "[x]".green() } else { "[ ]".normal() };
                println!("{} {:>8}  {}", marker, point.id, point.name);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&points)?);
        }
    }
    Ok(())
}

/// Reconcile local completion state with the remote service
async fn cmd_refresh(config: &Config) -> Result<()> {
    let app = build_app(config)?;
    let lookup = load_lookup(config)?;
    if lookup.is_empty() {
        println!("{}", "Duty catalog is empty; nothing to refresh.".yellow());
        return Ok(());
    }

    let stats = app
        .mirror
        .refresh_from_remote(&lookup)
        .await
        .map_err(|error| eyre::eyre!("refresh failed: {}", error))?;

    println!(
        "{} checked {} duties: {} completed ({} from the game client), {} custom skipped",
        "ok:".green(),
        stats.checked,
        stats.completed,
        stats.from_client,
        stats.skipped_custom
    );
    Ok(())
}

/// Clear all local state
fn cmd_reset(config: &Config) -> Result<()> {
    let app = build_app(config)?;
    app.mirror.reset();
    println!("{} local progress state cleared", "ok:".green());
    Ok(())
}

/// Replay a JSONL event log through the tracking pipeline
async fn cmd_watch(config: &Config, log: &PathBuf, follow: bool) -> Result<()> {
    if !config.tracking.enabled {
        println!("{}", "Tracking is disabled in the config.".yellow());
        return Ok(());
    }

    let app = build_app(config)?;
    let sweeper = Arc::clone(&app.cache).spawn_sweeper(config.cache.sweep_interval());
    let lookup: Arc<dyn DutyLookup> = Arc::new(load_lookup(config)?);
    let tracker = Arc::new(ActionTracker::new(
        Arc::clone(&app.mirror),
        lookup,
        config.tracking.policy(),
    ));

    let bus = EventBus::with_default_capacity();
    let tracker_task = tokio::spawn(Arc::clone(&tracker).run(bus.subscribe()));
    info!(log = %log.display(), follow, started = %chrono::Utc::now().to_rfc3339(), "event replay started");

    let mut emitted = 0u64;
    let mut malformed = 0u64;
    let mut offset = 0usize;
    loop {
        let content =
            fs::read_to_string(log).context(format!("Failed to read event log {}", log.display()))?;

        let chunk = if follow {
            // Consume only complete lines; a partial trailing line waits
            // for the next pass
            let complete = content[offset..]
                .rfind('\n')
                .map(|index| offset + index + 1)
                .unwrap_or(offset);
            let chunk = content[offset..complete].to_string();
            offset = complete;
            chunk
        } else {
            content
        };

        for line in chunk.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<GameEvent>(line) {
                Ok(event) => {
                    bus.emit(event);
                    emitted += 1;
                }
                Err(error) => {
                    malformed += 1;
                    warn!(%error, "skipping malformed event line");
                }
            }
        }

        if !follow {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    // Let the fire-and-forget writes drain before summarizing
    tokio::time::sleep(Duration::from_millis(300)).await;

    println!("Replayed {} events ({} malformed lines skipped)", emitted, malformed);
    let completed = app.mirror.completed_duties();
    if !completed.is_empty() {
        let ids: Vec<String> = completed.iter().map(|duty| duty.to_string()).collect();
        println!("Duties recorded completed: {}", ids.join(", "));
    }
    if let Some(duty) = tracker.current_duty() {
        let points = app.mirror.seen_points(duty);
        println!("Session duty {}: {} progress points recorded", duty, points.len());
    }

    tracker_task.abort();
    sweeper.abort();
    Ok(())
}
