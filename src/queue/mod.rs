//! Queue — durable FIFO-with-priority job queue, spec.md §4.2.
//!
//! Directly grounded on the teacher's
//! `bpmn_integration::pending_dispatches::PendingDispatchStore` +
//! `pending_dispatch_worker::PendingDispatchWorker`: a Postgres-backed
//! store using `FOR UPDATE SKIP LOCKED` for claims, a lease column for
//! crash recovery, and a single active reservation per key (there:
//! `payload_hash`; here: `task_id`).

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{backoff_delay_ms, Job, JobState};
use crate::error::{EngineError, EngineResult};

#[derive(Clone)]
pub struct Queue {
    pool: PgPool,
    base_delay_ms: u64,
    max_delay_ms: u64,
    lease_ms: u64,
}

pub struct EnqueueInput {
    pub task_id: Uuid,
    pub payload: serde_json::Value,
    pub delay_ms: u64,
    pub priority: i32,
    pub max_attempts: i32,
}

/// Outcome of `enqueue`: either a fresh job, or the id of the job already
/// live for this task (spec.md §4.2, "enqueue... is a no-op returning the
/// existing id").
pub enum EnqueueOutcome {
    Created(Uuid),
    AlreadyLive(Uuid),
}

impl Queue {
    pub fn new(pool: PgPool, base_delay_ms: u64, max_delay_ms: u64, lease_ms: u64) -> Self {
        Self {
            pool,
            base_delay_ms,
            max_delay_ms,
            lease_ms,
        }
    }

    /// Enqueue of a job whose `taskId` already has an active or waiting job
    /// is a no-op returning the existing id (spec.md §4.2, §8 property 6).
    pub async fn enqueue(&self, input: EnqueueInput) -> EngineResult<EnqueueOutcome> {
        let mut tx = self.pool.begin().await?;

        if let Some(row) = sqlx::query(
            "SELECT id FROM jobs WHERE task_id = $1 \
             AND state IN ('waiting', 'active', 'delayed') FOR UPDATE",
        )
        .bind(input.task_id)
        .fetch_optional(&mut *tx)
        .await?
        {
            let id: Uuid = row.try_get("id")?;
            return Ok(EnqueueOutcome::AlreadyLive(id));
        }

        let id = Uuid::new_v4();
        let run_at = Utc::now() + ChronoDuration::milliseconds(input.delay_ms as i64);
        let state = if input.delay_ms > 0 {
            JobState::Delayed
        } else {
            JobState::Waiting
        };

        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, task_id, payload, attempts, max_attempts, priority,
                 run_at, state, last_error, lease_until)
            VALUES ($1, $2, $3, 0, $4, $5, $6, $7, NULL, NULL)
            "#,
        )
        .bind(id)
        .bind(input.task_id)
        .bind(&input.payload)
        .bind(input.max_attempts)
        .bind(input.priority)
        .bind(run_at)
        .bind(state.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(EnqueueOutcome::Created(id))
    }

    /// Reserve the next eligible job: highest priority first, FIFO by
    /// `run_at` within a priority class; delayed jobs become eligible once
    /// `run_at <= now`. Uses `FOR UPDATE SKIP LOCKED` so multiple workers
    /// never reserve the same row.
    pub async fn reserve(&self) -> EngineResult<Option<Job>> {
        let now = Utc::now();
        let lease_until = now + ChronoDuration::milliseconds(self.lease_ms as i64);

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            SELECT id FROM jobs
            WHERE state IN ('waiting', 'delayed') AND run_at <= $1
            ORDER BY priority DESC, run_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let id: Uuid = row.try_get("id")?;

        sqlx::query(
            "UPDATE jobs SET state = 'active', lease_until = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(lease_until)
        .execute(&mut *tx)
        .await?;

        let job = fetch_job(&mut tx, id).await?;
        tx.commit().await?;
        Ok(Some(job))
    }

    /// Re-queue any job whose lease expired while the reserving worker was
    /// down (spec.md §4.2, "Durability"). Called once at worker-pool
    /// startup.
    pub async fn recover_expired_leases(&self) -> EngineResult<u64> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE jobs SET state = 'waiting', lease_until = NULL \
             WHERE state = 'active' AND lease_until < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Acknowledge successful completion. Only called after the worker has
    /// committed the task's terminal state and final metrics (spec.md
    /// §4.2, "at-least-once").
    pub async fn ack(&self, job_id: Uuid) -> EngineResult<()> {
        sqlx::query("UPDATE jobs SET state = 'completed', lease_until = NULL WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Negative-acknowledge: retry with exponential backoff, or dead-letter
    /// if `maxAttempts` exhausted.
    pub async fn nack(
        &self,
        job_id: Uuid,
        error: &str,
        retry_in_ms: Option<u64>,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT attempts, max_attempts FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("job {job_id}")))?;
        let attempts: i32 = row.try_get("attempts")?;
        let max_attempts: i32 = row.try_get("max_attempts")?;
        let attempts = attempts + 1;

        if attempts >= max_attempts {
            sqlx::query(
                "UPDATE jobs SET state = 'failed', attempts = $2, last_error = $3, \
                 lease_until = NULL WHERE id = $1",
            )
            .bind(job_id)
            .bind(attempts)
            .bind(error)
            .execute(&mut *tx)
            .await?;
        } else {
            let delay_ms =
                retry_in_ms.unwrap_or_else(|| backoff_delay_ms(attempts, self.base_delay_ms, self.max_delay_ms));
            let run_at = Utc::now() + ChronoDuration::milliseconds(delay_ms as i64);
            sqlx::query(
                "UPDATE jobs SET state = 'delayed', attempts = $2, last_error = $3, \
                 run_at = $4, lease_until = NULL WHERE id = $1",
            )
            .bind(job_id)
            .bind(attempts)
            .bind(error)
            .bind(run_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Move a job straight to dead-letter (e.g. on a permanent/auth error
    /// that should not be retried at all).
    pub async fn dead(&self, job_id: Uuid, reason: &str) -> EngineResult<()> {
        sqlx::query(
            "UPDATE jobs SET state = 'failed', last_error = $2, lease_until = NULL WHERE id = $1",
        )
        .bind(job_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn fetch_job(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> EngineResult<Job> {
    let row = sqlx::query(
        r#"
        SELECT id, task_id, payload, attempts, max_attempts, priority,
               run_at, state, last_error, lease_until
        FROM jobs WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_one(&mut **tx)
    .await?;

    let state: String = row.try_get("state")?;
    Ok(Job {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        payload: row.try_get("payload")?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        priority: row.try_get("priority")?,
        run_at: row.try_get("run_at")?,
        state: JobState::parse(&state)
            .ok_or_else(|| EngineError::Internal(format!("unknown job state {state}")))?,
        last_error: row.try_get("last_error")?,
        lease_until: row.try_get("lease_until")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        PgPool::connect(&url).await.ok()
    }

    #[tokio::test]
    #[ignore = "requires a live DATABASE_URL"]
    async fn enqueue_twice_is_single_flight() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let queue = Queue::new(pool, 1_000, 60_000, 30_000);
        let task_id = Uuid::new_v4();
        let input = || EnqueueInput {
            task_id,
            payload: serde_json::json!({}),
            delay_ms: 0,
            priority: 0,
            max_attempts: 3,
        };

        let first = queue.enqueue(input()).await.unwrap();
        let second = queue.enqueue(input()).await.unwrap();

        let (EnqueueOutcome::Created(a) | EnqueueOutcome::AlreadyLive(a)) = first;
        let (EnqueueOutcome::Created(b) | EnqueueOutcome::AlreadyLive(b)) = second;
        assert_eq!(a, b);
    }
}
