use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use siphon_client::ReqwestFetcher;
use siphon_core::interval::parse_interval;
use siphon_core::traits::{Fetcher, RecordStore};
use siphon_core::{
    ConfigFile, MappingResolver, NullStore, Scheduler, SchedulerConfig, SiphonConfig, SourceJob,
    TracingTickReporter,
};
use siphon_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(
    name = "siphon",
    version,
    about = "Periodically fetch JSON documents and store mapped fields as table rows"
)]
struct Cli {
    /// Tick interval: minute, quarter-hour, half-hour, three-quarter-hour,
    /// hour, day, or a duration such as "1m30s" (unparseable -> one hour)
    #[arg(env = "SIPHON_INTERVAL")]
    interval: String,

    /// Configuration file with connection parameters and `file:` sources
    #[arg(short, long, env = "SIPHON_CONFIG", default_value = "config.txt")]
    config: PathBuf,

    /// Directory that relative mapping locators are resolved against
    #[arg(long, env = "SIPHON_MAPPINGS_DIR", default_value = ".")]
    mappings_dir: PathBuf,

    /// Run a single tick immediately and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Resolve, fetch and assemble, but do not write to the database
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Maximum number of source jobs running at once within a tick
    #[arg(long, env = "SIPHON_MAX_CONCURRENT_JOBS", default_value_t = 16)]
    max_concurrent_jobs: usize,

    /// Per-request timeout for document fetches, in seconds
    #[arg(long, env = "SIPHON_FETCH_TIMEOUT_SECS", default_value_t = 30)]
    fetch_timeout_secs: u64,

    /// Size of the database connection pool
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("siphon=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_file = ConfigFile::new(&cli.config);
    let config = config_file
        .load()
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(cli.fetch_timeout_secs))
        .context("Failed to create HTTP client")?;
    let resolver = MappingResolver::new(&cli.mappings_dir);
    let scheduler_config = SchedulerConfig::default()
        .with_interval(parse_interval(&cli.interval))
        .with_max_concurrent_jobs(cli.max_concurrent_jobs);

    tracing::info!(
        config = %cli.config.display(),
        sources = config.sources.len(),
        database = %config.connection.database,
        "Configuration loaded"
    );

    // Dry runs reject the same connection params as real runs.
    let db_config = database_config(&config, cli.max_connections)?;

    if cli.dry_run {
        let job = SourceJob::new(resolver, fetcher, NullStore, &config.connection.database);
        return drive(config_file, job, scheduler_config, cli.once).await;
    }

    let db = Database::connect(&db_config)
        .await
        .context("Failed to connect to database")?;
    db.health_check().await?;

    let store = db.record_repo(&config.connection.id_column);
    let job = SourceJob::new(resolver, fetcher, store, &config.connection.database);
    drive(config_file, job, scheduler_config, cli.once).await
}

fn database_config(config: &SiphonConfig, max_connections: u32) -> Result<DatabaseConfig> {
    DatabaseConfig::from_params(config.connection.clone(), max_connections)
        .context("Invalid database configuration")
}

async fn drive<F, S>(
    config_file: ConfigFile,
    job: SourceJob<F, S>,
    scheduler_config: SchedulerConfig,
    once: bool,
) -> Result<()>
where
    F: Fetcher,
    S: RecordStore,
{
    let scheduler = Scheduler::new(config_file, job, scheduler_config);
    let reporter = TracingTickReporter;

    if once {
        let summary = scheduler.run_tick(1, &reporter).await;
        print_summary(&summary);
        return Ok(());
    }

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current tick");
            shutdown.cancel();
        }
    });

    scheduler.run(cancel_token, &reporter).await;
    Ok(())
}

fn print_summary(summary: &siphon_core::TickSummary) {
    println!("{}", summary.started_at.to_rfc3339());
    for outcome in &summary.outcomes {
        match outcome {
            siphon_core::JobOutcome::Persisted { source, table, id } if id.is_dry_run() => {
                println!("  {source}: would create record in {table}");
            }
            siphon_core::JobOutcome::Persisted { source, table, id } => {
                println!("  {source}: created record {id} in {table}");
            }
            siphon_core::JobOutcome::Failed {
                source,
                stage,
                error,
            } => {
                println!("  {source}: failed at {stage}: {error}");
            }
        }
    }
}
