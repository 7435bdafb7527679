//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use console::style;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Settings;
use crate::models::{Aggregation, EntityKind, ReportDatasetKey};
use crate::queue::{QueueClient, QueueMetric, SqsQueueClient};
use crate::reports::HttpReportProvider;
use crate::repository::{
    run_migrations, AsyncSqlitePool, ControlRepository, EntityRepository, ReportDatasetRepository,
};
use crate::services::{IngestionWorker, MetadataNotifier, PayloadRouter, RefreshService};

#[derive(Parser)]
#[command(name = "amstream")]
#[command(about = "Marketing stream ingestion and report refresh worker")]
#[command(version)]
pub struct Cli {
    /// Settings file (default: <data_dir>/amstream.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Run the queue ingestion worker until interrupted
    Worker,

    /// Inspect or change the worker control record
    Control {
        #[command(subcommand)]
        command: ControlCommands,
    },

    /// Refresh the report dataset for one key
    Refresh {
        /// Account the dataset belongs to
        #[arg(long)]
        account: String,
        /// Two-letter marketplace country code
        #[arg(long)]
        country: String,
        /// Bucket start, RFC 3339 (e.g. 2026-08-01T00:00:00Z)
        #[arg(long)]
        timestamp: String,
        /// Aggregation: daily or hourly
        #[arg(long, default_value = "daily")]
        aggregation: String,
        /// Entity kind: target or product
        #[arg(long, default_value = "target")]
        entity: String,
    },

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum ControlCommands {
    /// Show the current control record
    Status,
    /// Enable ingestion
    Start,
    /// Disable ingestion
    Stop,
    /// Set the message rate (messages/second, 0 = unlimited)
    Speed {
        messages_per_second: u32,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => cmd_init(&settings).await,
        Commands::Worker => cmd_worker(&settings).await,
        Commands::Control { command } => match command {
            ControlCommands::Status => cmd_control_status(&settings).await,
            ControlCommands::Start => cmd_control_enable(&settings, true).await,
            ControlCommands::Stop => cmd_control_enable(&settings, false).await,
            ControlCommands::Speed {
                messages_per_second,
            } => cmd_control_speed(&settings, messages_per_second).await,
        },
        Commands::Refresh {
            account,
            country,
            timestamp,
            aggregation,
            entity,
        } => cmd_refresh(&settings, &account, &country, &timestamp, &aggregation, &entity).await,
        Commands::Status => cmd_status(&settings).await,
    }
}

/// Open a migrated pool; the data directory must already exist.
async fn open_pool(settings: &Settings) -> anyhow::Result<AsyncSqlitePool> {
    std::fs::create_dir_all(&settings.data_dir)?;
    let pool = AsyncSqlitePool::from_path(&settings.database_path());
    run_migrations(pool.database_url()).await?;
    Ok(pool)
}

async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let pool = open_pool(settings).await?;

    // First read creates the control record (enabled, unlimited)
    let control = ControlRepository::new(pool).get_or_init().await?;

    println!(
        "  {} Database ready at {}",
        style("✓").green(),
        settings.database_path().display()
    );
    println!(
        "  {} Ingestion {}",
        style("✓").green(),
        if control.enabled { "enabled" } else { "disabled" }
    );

    if settings.queue.url.is_empty() {
        println!(
            "{} No queue URL configured. Set AMSTREAM_QUEUE_URL or [queue] url.",
            style("!").yellow()
        );
    }

    Ok(())
}

async fn cmd_worker(settings: &Settings) -> anyhow::Result<()> {
    let pool = open_pool(settings).await?;
    let control = ControlRepository::new(pool.clone());

    // Startup checks fail fast: a worker that cannot reach its database
    // or queue has nothing useful to do
    control.get_or_init().await?;

    let queue = SqsQueueClient::connect(&settings.queue).await?;
    if let Err(err) = queue.check().await {
        error!("queue check failed: {}", err);
        anyhow::bail!("cannot start worker: {}", err);
    }
    info!(url = %settings.queue.url, "queue reachable");

    let router = Arc::new(PayloadRouter::new(EntityRepository::new(pool)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, draining");
            let _ = shutdown_tx.send(true);
        }
    });

    let worker = IngestionWorker::new(
        control,
        Arc::new(queue),
        router,
        settings.worker.clone(),
        settings.queue.wait_secs,
        shutdown_rx,
    );
    worker.run().await?;
    Ok(())
}

async fn cmd_control_status(settings: &Settings) -> anyhow::Result<()> {
    let pool = open_pool(settings).await?;
    let record = ControlRepository::new(pool).get_or_init().await?;

    let state = if record.enabled {
        style("running").green()
    } else {
        style("stopped").red()
    };
    println!("{:<20} {}", "Ingestion:", state);
    let rate = if record.messages_per_second == 0 {
        "unlimited".to_string()
    } else {
        format!("{}/s", record.messages_per_second)
    };
    println!("{:<20} {}", "Rate:", rate);
    println!("{:<20} {}", "Updated:", record.updated_at.to_rfc3339());
    Ok(())
}

async fn cmd_control_enable(settings: &Settings, enabled: bool) -> anyhow::Result<()> {
    let pool = open_pool(settings).await?;
    ControlRepository::new(pool).set_enabled(enabled).await?;
    println!(
        "  {} Ingestion {}",
        style("✓").green(),
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

async fn cmd_control_speed(settings: &Settings, messages_per_second: u32) -> anyhow::Result<()> {
    let pool = open_pool(settings).await?;
    ControlRepository::new(pool)
        .set_rate(messages_per_second)
        .await?;
    if messages_per_second == 0 {
        println!("  {} Rate limit removed", style("✓").green());
    } else {
        println!(
            "  {} Rate set to {}/s",
            style("✓").green(),
            messages_per_second
        );
    }
    Ok(())
}

async fn cmd_refresh(
    settings: &Settings,
    account: &str,
    country: &str,
    timestamp: &str,
    aggregation: &str,
    entity: &str,
) -> anyhow::Result<()> {
    let bucket_start = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| anyhow::anyhow!("invalid --timestamp {}: {}", timestamp, e))?
        .with_timezone(&Utc);
    let aggregation = Aggregation::from_str(aggregation)
        .ok_or_else(|| anyhow::anyhow!("invalid --aggregation {} (daily|hourly)", aggregation))?;
    let entity_kind = EntityKind::from_str(entity)
        .ok_or_else(|| anyhow::anyhow!("invalid --entity {} (target|product)", entity))?;

    if settings.reports.base_url.is_empty() {
        anyhow::bail!("no reports base URL configured. Set AMSTREAM_REPORTS_URL or [reports] base_url.");
    }

    let key = ReportDatasetKey {
        account_id: account.to_string(),
        country_code: country.to_uppercase(),
        bucket_start,
        aggregation,
        entity_kind,
    };

    let pool = open_pool(settings).await?;
    let datasets = ReportDatasetRepository::new(pool);
    datasets.ensure_row(&key).await?;

    let provider = HttpReportProvider::new(
        &settings.reports.base_url,
        Duration::from_secs(settings.reports.timeout_secs),
    )?;
    let service = RefreshService::new(
        datasets.clone(),
        Arc::new(provider),
        MetadataNotifier::disabled(),
    );

    service.refresh(&key).await?;

    let row = datasets
        .get(&key)
        .await?
        .ok_or_else(|| anyhow::anyhow!("dataset row disappeared during refresh"))?;
    println!(
        "  {} {} is {}",
        style("✓").green(),
        key,
        style(row.status.as_str()).bold()
    );
    if let Some(report_id) = &row.report_id {
        println!("{:<20} {}", "Report:", report_id);
    }
    Ok(())
}

async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.database_path();
    if !db_path.exists() {
        println!(
            "{} System not initialized. Run 'amstream init' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    let pool = open_pool(settings).await?;
    let control = ControlRepository::new(pool.clone()).get_or_init().await?;
    let datasets = ReportDatasetRepository::new(pool);

    println!("\n{}", style("amstream Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<24} {}", "Data Directory:", settings.data_dir.display());
    println!(
        "{:<24} {}",
        "Ingestion:",
        if control.enabled {
            style("running").green()
        } else {
            style("stopped").red()
        }
    );
    if control.messages_per_second > 0 {
        println!("{:<24} {}/s", "Rate:", control.messages_per_second);
    }

    let counts = datasets.status_counts().await?;
    if !counts.is_empty() {
        println!("\n{}", style("Report Datasets").bold());
        for (status, count) in counts {
            println!("  {:<22} {}", format!("{}:", status), count);
        }
    }

    if settings.queue.url.is_empty() {
        println!("\n{} No queue URL configured.", style("!").yellow());
        return Ok(());
    }

    // Queue gauges are best effort and must not fail the command
    match SqsQueueClient::connect(&settings.queue).await {
        Ok(queue) => {
            println!("\n{}", style("Queue").bold());
            println!("{:<24} {}", "Depth:", queue.approximate_depth().await);
            println!(
                "{:<24} {}s",
                "Oldest message:",
                queue.oldest_message_age_secs().await
            );
            match queue.dead_letter_target().await {
                Some(target) => println!("{:<24} {}", "Dead letter:", target),
                None => println!("{:<24} none", "Dead letter:"),
            }

            let now = Utc::now();
            let received = queue
                .windowed_counts(QueueMetric::Received, now - chrono::Duration::minutes(10), now)
                .await;
            let deleted = queue
                .windowed_counts(QueueMetric::Deleted, now - chrono::Duration::minutes(10), now)
                .await;
            println!(
                "{:<24} {} received / {} deleted",
                "Last 10 minutes:",
                received.iter().sum::<u64>(),
                deleted.iter().sum::<u64>()
            );
        }
        Err(err) => {
            println!("\n{} Queue unreachable: {}", style("!").yellow(), err);
        }
    }

    Ok(())
}
