//! Standalone worker-pool process: runs collection jobs without exposing
//! the HTTP surface (spec.md §5, "Worker").

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use collector_engine::config::EngineConfig;
use collector_engine::queue::Queue;
use collector_engine::store::Store;
use collector_engine::upstream::UpstreamClient;
use collector_engine::worker::WorkerPool;

#[derive(Parser)]
#[command(name = "collector-worker")]
#[command(about = "Runs the collection engine's worker pool against the durable job queue")]
struct Cli {
    /// Override the number of worker loops (defaults to WORKERS_COUNT or 3).
    #[arg(long)]
    workers: Option<usize>,

    /// Override the database connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env()?;
    if let Some(workers) = cli.workers {
        config.workers_count = workers;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    tracing::info!(workers_count = config.workers_count, "starting collector-worker");

    let pool = PgPoolOptions::new()
        .max_connections(config.workers_count as u32 + 2)
        .connect(&config.database_url)
        .await?;

    let store = Store::new(pool);
    let queue = Queue::new(
        store.pool().clone(),
        config.queue_base_delay_ms,
        config.queue_max_delay_ms,
        config.queue_lease_ms,
    );
    let upstream = UpstreamClient::new(
        config.upstream_base_url.clone(),
        config.upstream_rps,
        config.upstream_burst,
        config.upstream_concurrency,
        config.upstream_request_timeout_ms,
        config.upstream_transient_retries,
    )?;

    let worker_pool = WorkerPool::spawn(store, queue, upstream, config).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    worker_pool.shutdown().await;
    Ok(())
}
