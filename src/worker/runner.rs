//! Worker — drives one task from `pending` to a terminal state
//! (spec.md §4.4). Loop shape grounded on
//! `bpmn_integration::worker::JobWorker::run`: reserve, backoff when idle,
//! `tokio::select!` against a shutdown signal.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{Comment, GroupStatus, Job, MetricsDelta, Post, Task, TaskStatus};
use crate::error::{EngineError, EngineResult};
use crate::queue::Queue;
use crate::store::{GroupUpsert, Store};
use crate::upstream::{CommentSort, ResolvedGroup, UpstreamClient};

const BACKOFF_IDLE_MS: u64 = 1_000;
const BACKOFF_ERROR_MS: u64 = 5_000;
const COMMENT_PAGE_SIZE: u32 = 100;
const POST_PAGE_SIZE: u32 = 100;
const STORE_WRITE_RETRIES: u32 = 3;

pub struct Worker {
    worker_id: String,
    store: Store,
    queue: Queue,
    upstream: UpstreamClient,
    config: EngineConfig,
}

impl Worker {
    pub fn new(worker_id: String, store: Store, queue: Queue, upstream: UpstreamClient, config: EngineConfig) -> Self {
        Self {
            worker_id,
            store,
            queue,
            upstream,
            config,
        }
    }

    /// Run the reserve/drive/ack loop until the shutdown signal fires.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(worker_id = %self.worker_id, "worker started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.queue.reserve().await {
                Ok(Some(job)) => {
                    self.drive_job(job).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(BACKOFF_IDLE_MS)) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "reserve failed");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(BACKOFF_ERROR_MS)) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "worker stopped");
    }

    /// Steps 1-7 of spec.md §4.4.
    async fn drive_job(&self, job: Job) {
        let task = match self.store.tasks.get_task(job.task_id).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "task missing for job, acking");
                let _ = self.queue.ack(job.id).await;
                return;
            }
        };

        if task.status.is_terminal() {
            let _ = self.queue.ack(job.id).await;
            return;
        }

        let outcome = match self.config.task_default_timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(Duration::from_millis(timeout_ms), self.collect(&task)).await {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Timeout(format!(
                        "task exceeded {timeout_ms}ms budget"
                    ))),
                }
            }
            None => self.collect(&task).await,
        };

        match outcome {
            Ok(()) => {
                let finished_at = Utc::now();
                let execution_time_ms = self.execution_time_ms_since_start(task.id, finished_at).await;
                if let Err(e) = self
                    .store
                    .tasks
                    .update_task_status(
                        task.id,
                        TaskStatus::Completed,
                        None,
                        Some(finished_at),
                        Some(execution_time_ms),
                        None,
                    )
                    .await
                {
                    tracing::error!(task_id = %task.id, error = %e, "failed to finalize task as completed");
                }
                tracing::info!(task_id = %task.id, execution_time_ms, "task completed");
                let _ = self.queue.ack(job.id).await;
            }
            Err(EngineError::UpstreamTransient(msg)) | Err(EngineError::StoreUnavailable(msg))
                if job.attempts + 1 < job.max_attempts =>
            {
                tracing::warn!(task_id = %task.id, job_id = %job.id, error = %msg, "transient failure, retrying");
                let _ = self.queue.nack(job.id, &msg, None).await;
            }
            Err(e) => {
                let finished_at = Utc::now();
                let execution_time_ms = self.execution_time_ms_since_start(task.id, finished_at).await;
                let _ = self
                    .store
                    .tasks
                    .update_task_status(
                        task.id,
                        TaskStatus::Failed,
                        None,
                        Some(finished_at),
                        Some(execution_time_ms),
                        Some(e.to_string()),
                    )
                    .await;
                tracing::error!(task_id = %task.id, error = %e, "task failed");
                // The task is already terminal at this point (aggregate
                // failure per spec.md §4.7: auth, store outage, timeout,
                // cancel, retries exhausted), so dead-letter the job
                // directly instead of nack, which would re-queue it.
                let _ = self.queue.dead(job.id, &e.to_string()).await;
            }
        }
    }

    /// `executionTime` (spec.md §3) is measured against the row's
    /// persisted `started_at`, not the pre-`collect()` snapshot in `task`:
    /// `update_task_status` only sets `started_at` once via `COALESCE`, so
    /// the snapshot taken before `collect()` ran can be stale or absent on
    /// a retried job.
    async fn execution_time_ms_since_start(&self, task_id: Uuid, finished_at: chrono::DateTime<Utc>) -> i64 {
        match self.store.tasks.get_task(task_id).await {
            Ok(t) => t
                .started_at
                .map(|s| (finished_at - s).num_milliseconds())
                .unwrap_or(0),
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "failed to reload task for execution_time_ms");
                0
            }
        }
    }

    /// Cooperative cancellation check at a sub-unit boundary (spec.md §5:
    /// "between pages, between groups, between posts"). Returns
    /// `EngineError::Cancelled` once the flag is observed; the caller's
    /// `?` unwinds straight to `drive_job`'s terminal-failure arm.
    async fn check_cancelled(&self, task_id: Uuid) -> EngineResult<()> {
        if self.store.tasks.is_cancel_requested(task_id).await? {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// The actual collection algorithm: resolve groups, then walk posts and
    /// comments pagewise, in order, writing through the Store and updating
    /// metrics as we go.
    async fn collect(&self, task: &Task) -> EngineResult<()> {
        self.store
            .tasks
            .update_task_status(task.id, TaskStatus::Processing, Some(Utc::now()), None, None, None)
            .await?;

        let vk_ids: Vec<String> = task.groups.iter().map(|g| g.vk_id.clone()).collect();
        let resolved = self.upstream.resolve_groups(&vk_ids).await?;

        self.store
            .tasks
            .increment_metrics(
                task.id,
                MetricsDelta {
                    groups_total: vk_ids.len() as i64,
                    ..Default::default()
                },
            )
            .await?;

        let mut valid_groups: Vec<(String, String)> = Vec::new();
        for item in resolved {
            match item {
                ResolvedGroup::Resolved { vk_id, name } => {
                    self.write_group(task.id, &vk_id, &name, GroupStatus::Valid).await?;
                    valid_groups.push((vk_id, name));
                }
                ResolvedGroup::Rejected { vk_id, synthetic_name } => {
                    self.write_group(task.id, &vk_id, &synthetic_name, GroupStatus::Invalid)
                        .await?;
                    self.store
                        .tasks
                        .increment_metrics(
                            task.id,
                            MetricsDelta {
                                errors: 1,
                                ..Default::default()
                            },
                        )
                        .await?;
                }
            }
        }

        for (vk_id, _name) in valid_groups {
            self.check_cancelled(task.id).await?;
            self.collect_group(task.id, &vk_id).await?;
            self.store
                .tasks
                .increment_metrics(
                    task.id,
                    MetricsDelta {
                        groups_processed: 1,
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok(())
    }

    async fn write_group(
        &self,
        task_id: Uuid,
        vk_id: &str,
        name: &str,
        status: GroupStatus,
    ) -> EngineResult<()> {
        self.store
            .groups
            .upsert_groups(
                task_id,
                vec![GroupUpsert {
                    vk_id: vk_id.to_string(),
                    name: name.to_string(),
                    status,
                }],
            )
            .await?;
        Ok(())
    }

    /// Iterate posts pagewise for one group, then comments pagewise for
    /// each post (spec.md §4.4 step 4).
    async fn collect_group(&self, task_id: Uuid, group_vk_id: &str) -> EngineResult<()> {
        let mut pager = self.upstream.list_posts(group_vk_id.to_string(), POST_PAGE_SIZE, None);

        while let Some(page) = pager.next_page(task_id).await? {
            self.check_cancelled(task_id).await?;
            let page_len = page.len() as i64;
            self.upsert_posts_with_retry(&page).await?;
            self.store
                .tasks
                .increment_metrics(
                    task_id,
                    MetricsDelta {
                        posts_total: page_len,
                        ..Default::default()
                    },
                )
                .await?;

            for post in &page {
                self.check_cancelled(task_id).await?;
                self.collect_comments(task_id, post.vk_post_id).await?;
                self.store
                    .tasks
                    .increment_metrics(
                        task_id,
                        MetricsDelta {
                            posts_processed: 1,
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }

        Ok(())
    }

    async fn collect_comments(&self, task_id: Uuid, post_vk_id: i64) -> EngineResult<()> {
        let mut pager = self
            .upstream
            .list_comments(post_vk_id, CommentSort::Asc, COMMENT_PAGE_SIZE);

        while let Some(page) = pager.next_page().await? {
            self.check_cancelled(task_id).await?;
            let page_len = page.len() as i64;
            self.upsert_comments_with_retry(&page).await?;
            self.store
                .tasks
                .increment_metrics(
                    task_id,
                    MetricsDelta {
                        comments_total: page_len,
                        comments_processed: page_len,
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok(())
    }

    /// Retry a store batch write up to `M` times before failing the task
    /// (spec.md §4.7, "Store write failure").
    async fn upsert_posts_with_retry(&self, posts: &[Post]) -> EngineResult<()> {
        let mut attempt = 0;
        loop {
            match self.store.posts.upsert_posts(posts).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < STORE_WRITE_RETRIES => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "post upsert failed, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn upsert_comments_with_retry(&self, comments: &[Comment]) -> EngineResult<()> {
        let mut attempt = 0;
        loop {
            match self.store.comments.upsert_comments(comments).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < STORE_WRITE_RETRIES => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "comment upsert failed, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
