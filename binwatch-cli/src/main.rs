//! Command-line front end for binwatch: bootstrap a SQLite database, record
//! janitor status updates, and read dashboards and notifications as JSON.

mod config;

use std::{
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context as _, Result};
use binwatch_core::{
    model::{AuditSchema, BinId, JanitorId},
    ports::BinStore,
    service::{BinService, StatusUpdate, UpdateResponse},
};
use binwatch_store_sqlite::SqliteBinStore;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::{signal, time};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AuditSetting, Config};

#[derive(Debug, Parser)]
#[command(name = "binwatch", version, about = "Track waste bin status updates")]
struct Cli {
    /// Configuration file to use instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database tables.
    Init {
        /// Audit table to create; defaults to the configured schema.
        #[arg(long, value_enum)]
        audit: Option<AuditArg>,
    },
    /// Change a bin's status on behalf of a janitor.
    Update {
        /// Acting janitor id.
        #[arg(long, allow_negative_numbers = true)]
        actor: i64,
        /// Bin to change.
        #[arg(long, allow_negative_numbers = true)]
        bin: i64,
        /// New status, e.g. `full` or `needs_attention`.
        #[arg(long)]
        status: String,
        /// Optional action such as `emptied`.
        #[arg(long)]
        action: Option<String>,
    },
    /// Print a janitor's dashboard stats.
    Dashboard {
        /// Janitor whose bins to show.
        #[arg(long)]
        janitor: i64,
        /// Keep polling until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Print the newest notifications.
    Notifications {
        /// How many to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AuditArg {
    #[value(name = "none")]
    None,
    #[value(name = "bin_history")]
    BinHistory,
    #[value(name = "bin_logs")]
    BinLogs,
}

impl From<AuditArg> for AuditSchema {
    fn from(arg: AuditArg) -> Self {
        match arg {
            AuditArg::None => Self::None,
            AuditArg::BinHistory => Self::BinHistory,
            AuditArg::BinLogs => Self::BinLogs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    init_tracing(&config.log.level);

    let store = Arc::new(open_store(&config.storage.database_path).await?);

    match cli.command {
        Command::Init { audit } => {
            let schema = match audit {
                Some(arg) => AuditSchema::from(arg),
                None => config.audit.schema.fixed().unwrap_or_default(),
            };
            store.bootstrap(schema).await?;
            info!(path = %config.storage.database_path, ?schema, "database initialized");
            Ok(ExitCode::SUCCESS)
        }
        Command::Update {
            actor,
            bin,
            status,
            action,
        } => {
            let service = service(&store, &config).await?;
            let response = run_update(&service, actor, bin, status, action).await;
            print_json(&response)?;
            Ok(ExitCode::from(exit_status(&response)))
        }
        Command::Dashboard { janitor, watch } => {
            let service = service(&store, &config).await?;
            if watch {
                watch_dashboard(&service, JanitorId(janitor), config.dashboard.refresh_secs).await?;
            } else {
                let stats = service.dashboard(Some(JanitorId(janitor))).await?;
                print_json(&stats)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Notifications { limit } => {
            let service = service(&store, &config).await?;
            let notifications = service.recent_notifications(limit).await?;
            print_json(&notifications)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run one status update and shape its JSON response.
async fn run_update(
    service: &BinService,
    actor: i64,
    bin: i64,
    status: String,
    action: Option<String>,
) -> UpdateResponse {
    let request = StatusUpdate::new(BinId(bin), status, action);
    let result = service.update_bin_status(Some(JanitorId(actor)), &request).await;
    if let Err(err) = &result {
        warn!(bin_id = bin, janitor_id = actor, error = %err, "status update rejected");
    }
    UpdateResponse::from(result)
}

/// Process exit status for an update response: 0 on success, 1 when rejected.
fn exit_status(response: &UpdateResponse) -> u8 {
    u8::from(!response.is_success())
}

/// Logs go to stderr so stdout carries only JSON.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "binwatch={level},binwatch_core={level},binwatch_store_sqlite={level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

async fn open_store(database_path: &str) -> Result<SqliteBinStore> {
    if let Some(parent) = Path::new(database_path).parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = SqliteBinStore::open(database_path)
        .await
        .with_context(|| format!("opening {database_path}"))?;
    debug!(path = database_path, "database opened");
    Ok(store)
}

/// Resolve the audit table once and build the service around the store.
async fn service(store: &Arc<SqliteBinStore>, config: &Config) -> Result<BinService> {
    let audit = match config.audit.schema {
        AuditSetting::Auto => {
            let detected = store.detect_audit_schema().await?;
            debug!(?detected, "audit schema detected");
            detected
        }
        setting => setting.fixed().unwrap_or_default(),
    };
    let port: Arc<dyn BinStore> = Arc::<SqliteBinStore>::clone(store);
    Ok(BinService::new(port, audit).with_bin_limit(config.dashboard.bin_limit))
}

async fn watch_dashboard(service: &BinService, janitor: JanitorId, refresh_secs: u64) -> Result<()> {
    let mut ticker = time::interval(Duration::from_secs(refresh_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.dashboard(Some(janitor)).await {
                    Ok(stats) => print_json(&stats)?,
                    Err(err) => warn!(janitor_id = %janitor, error = %err, "dashboard refresh failed"),
                }
            }
            interrupted = signal::ctrl_c() => {
                interrupted.context("listening for ctrl-c")?;
                info!("dashboard watch stopped");
                return Ok(());
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
