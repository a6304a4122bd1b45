//! WorkerPool — spawns `workers_count` independent `Worker` loops sharing
//! one `Store`/`Queue`/`UpstreamClient`, grounded on
//! `bpmn_integration::pending_dispatch_worker`'s pattern of a
//! `watch::Sender<bool>` fanned out to every spawned task for cooperative
//! shutdown.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::queue::Queue;
use crate::store::Store;
use crate::upstream::UpstreamClient;

use super::runner::Worker;

pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Recovers any leases left behind by a crashed worker, then spawns
    /// `config.workers_count` workers (spec.md §4.2 "Durability", §5).
    pub async fn spawn(store: Store, queue: Queue, upstream: UpstreamClient, config: EngineConfig) -> EngineResult<Self> {
        let recovered = queue.recover_expired_leases().await?;
        if recovered > 0 {
            tracing::info!(recovered, "recovered jobs from expired leases");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(config.workers_count);

        for idx in 0..config.workers_count {
            let worker = Worker::new(
                format!("worker-{idx}"),
                store.clone(),
                queue.clone(),
                upstream.clone(),
                config.clone(),
            );
            let rx = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                worker.run(rx).await;
            }));
        }

        Ok(Self { shutdown_tx, handles })
    }

    /// Signal every worker to stop after its current job and wait for them
    /// to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
