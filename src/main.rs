//! Kanbe kanban board server
//!
//! Serves the board over HTTP and runs the daily recurrence and backup jobs.
//! Maintenance subcommands run the same jobs once, or export a board.

use anyhow::{Context, Result};
use clap::Parser;
use kanbe::api;
use kanbe::backup;
use kanbe::board::BoardService;
use kanbe::cli::export::ExportArgs;
use kanbe::cli::{Cli, Command};
use kanbe::clock::system_clock;
use kanbe::config::{Config, ConfigLoader, ConfigPaths};
use kanbe::db::Database;
use kanbe::export::BoardExport;
use kanbe::scheduler;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    // Load configuration with tier merging; --config beats KANBE_CONFIG_PATH
    let paths = ConfigPaths::discover().with_explicit_file(cli.config.as_ref().map(PathBuf::from));
    let loader = ConfigLoader::load_with_paths(paths)?;
    if let Some(path) = loader.config_path() {
        info!(path = %path.display(), "configuration loaded");
    }
    let mut config = loader.into_config();

    // Override from CLI arguments
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    let service = open_service(&config)?;

    match cli.command {
        Some(Command::Recur) => {
            let report = service.run_recurrence()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(Command::Backup) => {
            let path = backup::run_backup(service.db(), &config.backup, service.now())?;
            println!("{}", path.display());
        }
        Some(Command::Export(args)) => {
            run_export(&service, args)?;
        }
        Some(Command::Serve) | None => {
            run_server(service, config).await?;
        }
    }

    Ok(())
}

/// Initialize logging based on --log. `RUST_LOG` wins over --verbose.
fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()))
    };

    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)
                .with_context(|| format!("cannot open log file {}", filename))?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter())
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn open_service(config: &Config) -> Result<BoardService> {
    config.ensure_db_dir()?;
    let db = Database::open(&config.server.db_path)
        .with_context(|| format!("cannot open database {}", config.server.db_path.display()))?
        .with_history_limit(config.history.max_events);
    info!(path = %config.server.db_path.display(), "database ready");

    Ok(BoardService::new(db, system_clock(), config.board.clone()))
}

async fn run_server(service: BoardService, config: Config) -> Result<()> {
    let handle = api::start_server(service.clone(), &config.server.bind, config.server.port).await?;
    let jobs = scheduler::spawn_daily_jobs(service, &config.schedule, config.backup.clone())?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    if let Some(jobs) = jobs {
        jobs.abort();
    }
    handle.shutdown().await;
    Ok(())
}

fn run_export(service: &BoardService, args: ExportArgs) -> Result<()> {
    let export = BoardExport::collect(service, &args.user)?;
    let compress = args.should_compress();

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            export.write_to(BufWriter::new(file), compress)?;
            eprintln!(
                "Exported {} tasks in {} columns to {}",
                export.tasks.len(),
                export.columns.len(),
                path.display()
            );
        }
        None => {
            export.write_to(std::io::stdout().lock(), compress)?;
        }
    }
    Ok(())
}
