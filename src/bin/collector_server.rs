//! REST API server: the Controller Contract from spec.md §6, backed by a
//! Postgres-persisted task/queue/store and a pool of collection workers.

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use collector_engine::api::build_router;
use collector_engine::config::EngineConfig;
use collector_engine::queue::Queue;
use collector_engine::service::TaskService;
use collector_engine::store::Store;
use collector_engine::upstream::UpstreamClient;
use collector_engine::worker::WorkerPool;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::from_env()?;
    tracing::info!(bind_addr = %config.bind_addr, "starting collector-server");

    let pool = PgPoolOptions::new()
        .max_connections(10)
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

    let worker_pool = WorkerPool::spawn(store.clone(), queue.clone(), upstream, config.clone()).await?;

    let service = TaskService::new(store, queue, config.clone());
    let app = build_router(service)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(bind_addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker_pool.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
