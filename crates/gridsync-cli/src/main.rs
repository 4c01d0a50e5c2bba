//! gridsync - scheduled synchronisation between local trees and a data grid
//!
//! Manages named synchronisation jobs, runs them on demand or on their cron
//! schedules, and keeps a durable per-file history of every run. The remote
//! side is served from a directory root (a mounted grid share or a second
//! disk).

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use gridsync_engine::{EngineOptions, SyncEngine, SyncScheduler, UnboundedCapacity};
use gridsync_remote::FsRemote;
use gridsync_store::{
    default_state_dir, ConfigRepository, CronTrigger, ReportingRepository, SyncConfigItem,
    STATUS_OK, SYNC_KINDS,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// gridsync - scheduled synchronisation between local trees and a data grid
#[derive(Parser)]
#[command(
    name = "gridsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Scheduled synchronisation between local trees and a data grid",
    long_about = "gridsync computes the minimal set of transfers needed to reconcile\n\
                  a local directory tree with a remote collection tree, executes them\n\
                  with capacity checks and partial-failure tolerance, and persists a\n\
                  structured history of every run."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Directory root served as the remote grid
    #[arg(long, value_name = "DIR")]
    grid_root: PathBuf,

    /// Directory holding the state documents (default: ~/.gridsync)
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// TOML file with transfer policy options
    #[arg(short, long, value_name = "FILE")]
    options: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage synchronisation configurations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run one configuration now and wait for it to finish
    Run {
        /// Configuration UUID
        uuid: Uuid,
    },
    /// Show the run history of one configuration
    Reports {
        /// Configuration UUID
        uuid: Uuid,
        /// Also list per-file events
        #[arg(long)]
        events: bool,
    },
    /// Arm the cron timers and run until interrupted
    Watch,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Add a configuration
    Add {
        /// Job kind
        #[arg(
            long,
            value_parser = clap::builder::PossibleValuesParser::new(
                SYNC_KINDS.iter().map(|(label, _)| *label).collect::<Vec<_>>(),
            ),
        )]
        kind: String,
        /// Local directory or file
        #[arg(long)]
        local: PathBuf,
        /// Remote collection or data object path
        #[arg(long)]
        remote: String,
        /// Five-field cron expression
        #[arg(long)]
        cron: String,
    },
    /// List all configurations with their next fire times
    List,
    /// Delete a configuration
    Delete {
        /// Configuration UUID
        uuid: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.quiet, cli.verbose)?;
    info!("gridsync v{} starting", env!("CARGO_PKG_VERSION"));

    let state_dir = match cli.state_dir {
        Some(dir) => dir,
        None => default_state_dir()?,
    };
    let configs = Arc::new(ConfigRepository::open(
        state_dir.join("synchronisation.json"),
    )?);
    let reports = Arc::new(ReportingRepository::open(
        state_dir.join("synchronisation_events.json"),
    )?);

    match cli.command {
        Commands::Config { action } => config_command(&configs, action),
        Commands::Run { uuid } => {
            let engine = build_engine(&cli.grid_root, cli.options.as_ref(), configs, reports)?;
            run_command(&engine, uuid).await
        }
        Commands::Reports { uuid, events } => reports_command(&reports, uuid, events),
        Commands::Watch => {
            let engine = build_engine(
                &cli.grid_root,
                cli.options.as_ref(),
                configs.clone(),
                reports,
            )?;
            watch_command(engine, configs).await
        }
    }
}

fn init_logging(debug: bool, quiet: bool, verbose: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log filter")?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn load_options(path: Option<&PathBuf>) -> Result<EngineOptions> {
    match path {
        None => Ok(EngineOptions::default()),
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("could not read options file '{}'", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("invalid options file '{}'", path.display()))
        }
    }
}

fn build_engine(
    grid_root: &PathBuf,
    options_file: Option<&PathBuf>,
    configs: Arc<ConfigRepository>,
    reports: Arc<ReportingRepository>,
) -> Result<Arc<SyncEngine>> {
    if !grid_root.is_dir() {
        bail!("grid root '{}' is not a directory", grid_root.display());
    }
    let options = load_options(options_file)?;
    Ok(Arc::new(SyncEngine::new(
        Arc::new(FsRemote::new(grid_root)),
        configs,
        reports,
        Arc::new(UnboundedCapacity),
        options,
    )))
}

fn config_command(configs: &ConfigRepository, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Add {
            kind,
            local,
            remote,
            cron,
        } => {
            let item = SyncConfigItem::new(kind, local, remote, cron);
            item.validate()?;
            let uuid = configs.add(item)?;
            println!("{} {uuid}", style("Added").green().bold());
            Ok(())
        }
        ConfigAction::List => {
            let items = configs.all();
            if items.is_empty() {
                println!("no configurations");
                return Ok(());
            }
            let now = Utc::now();
            for item in items {
                let next = CronTrigger::parse(&item.cron)
                    .ok()
                    .and_then(|t| t.next_occurrence(now))
                    .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
                println!(
                    "{}  {}  {} -> {}  [{}]  next: {}",
                    style(item.uuid).cyan(),
                    item.kind,
                    item.local.display(),
                    item.remote,
                    item.cron,
                    next,
                );
            }
            Ok(())
        }
        ConfigAction::Delete { uuid } => {
            if configs.delete(uuid)? {
                println!("{} {uuid}", style("Deleted").green().bold());
            } else {
                bail!("no configuration with uuid {uuid}");
            }
            Ok(())
        }
    }
}

async fn run_command(engine: &Arc<SyncEngine>, uuid: Uuid) -> Result<()> {
    let summary = engine.run_once(uuid).await?;
    let line = format!(
        "{} transferred, {} failed of {} planned (report {})",
        summary.succeeded, summary.failed, summary.planned, summary.report_id,
    );
    if summary.failed == 0 {
        println!("{} {line}", style("Done").green().bold());
    } else {
        println!("{} {line}", style("Partial").yellow().bold());
    }
    Ok(())
}

fn reports_command(reports: &ReportingRepository, uuid: Uuid, with_events: bool) -> Result<()> {
    let history = reports.find_reports_by_config(uuid);
    if history.is_empty() {
        println!("no reports for configuration {uuid}");
        return Ok(());
    }
    for report in history {
        let end = report
            .end_date
            .map_or_else(|| "running".to_string(), |at| at.to_rfc3339());
        println!(
            "{}  {}  {}/{} ok  {} bytes  {} .. {}",
            style(report.uuid).cyan(),
            report.start_date.to_rfc3339(),
            report.total_files_processed_successfully,
            report.total_files_processed,
            report.total_bytes_processed,
            report.start_date.to_rfc3339(),
            end,
        );
        if with_events {
            for event in &report.events {
                let status = if event.status == STATUS_OK {
                    style(event.status.clone()).green()
                } else {
                    style(event.status.clone()).red()
                };
                println!("    {status}  {} -> {}  {} bytes", event.source, event.destination, event.bytes);
            }
        }
    }
    Ok(())
}

async fn watch_command(engine: Arc<SyncEngine>, configs: Arc<ConfigRepository>) -> Result<()> {
    let scheduler = SyncScheduler::start(engine, configs);
    println!(
        "{} {} timers armed, press Ctrl-C to stop",
        style("Watching").green().bold(),
        scheduler.timer_count().await,
    );
    tokio::signal::ctrl_c().await.context("signal handler failed")?;
    scheduler.shutdown();
    println!("stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_options_file_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("options.toml");
        std::fs::write(
            &path,
            "resource = \"hot_1\"\nmin_free_space = 1024\nscope = \"Size\"\n",
        )
        .unwrap();

        let options = load_options(Some(&path)).unwrap();
        assert_eq!(options.resource.as_deref(), Some("hot_1"));
        assert_eq!(options.min_free_space, 1024);
        assert!(options.check_free_space);

        let defaults = load_options(None).unwrap();
        assert!(defaults.resource.is_none());
    }

    #[test]
    fn test_malformed_options_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("options.toml");
        std::fs::write(&path, "min_free_space = \"lots\"").unwrap();
        assert!(load_options(Some(&path)).is_err());
    }
}
