//! TaskStore — spec.md §4.1: createTask, getTask, listTasks,
//! updateTaskStatus, incrementMetrics.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{Metrics, MetricsDelta, Task, TaskGroupInput, TaskStatus, TaskType};
use crate::error::{EngineError, EngineResult};

#[derive(Clone)]
pub struct TaskStore {
    pool: PgPool,
}

pub struct CreateTaskInput {
    pub task_type: TaskType,
    pub priority: i32,
    pub groups: Vec<TaskGroupInput>,
    pub parameters: serde_json::Value,
    pub created_by: Option<String>,
}

#[derive(Default)]
pub struct ListTasksFilter {
    pub page: i64,
    pub limit: i64,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
}

pub struct ListTasksResult {
    pub items: Vec<Task>,
    pub total: i64,
}

impl TaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Assigns an id, stamps timestamps, status=pending, metrics zeroed.
    pub async fn create_task(&self, input: CreateTaskInput) -> EngineResult<Task> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let groups = Task::normalize_groups(input.groups);
        let groups_json = serde_json::to_value(&groups)
            .map_err(|e| EngineError::Internal(format!("serializing groups: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO tasks
                (id, task_type, status, priority, groups, metrics, parameters,
                 result, error, execution_time_ms, started_at, finished_at,
                 cancel_requested, created_by, created_at, updated_at)
            VALUES ($1, $2, 'pending', $3, $4, $5, $6,
                    NULL, NULL, NULL, NULL, NULL,
                    false, $7, $8, $8)
            "#,
        )
        .bind(id)
        .bind(input.task_type.as_str())
        .bind(input.priority)
        .bind(&groups_json)
        .bind(serde_json::to_value(Metrics::default()).unwrap())
        .bind(&input.parameters)
        .bind(&input.created_by)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Task {
            id,
            task_type: input.task_type,
            status: TaskStatus::Pending,
            priority: input.priority,
            groups,
            metrics: Metrics::default(),
            parameters: input.parameters,
            result: None,
            error: None,
            execution_time_ms: None,
            started_at: None,
            finished_at: None,
            cancel_requested: false,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_task(&self, id: Uuid) -> EngineResult<Task> {
        let row = sqlx::query(
            r#"
            SELECT id, task_type, status, priority, groups, metrics, parameters,
                   result, error, execution_time_ms, started_at, finished_at,
                   cancel_requested, created_by, created_at, updated_at
            FROM tasks WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("task {id}")))?;

        row_to_task(&row)
    }

    pub async fn list_tasks(&self, filter: ListTasksFilter) -> EngineResult<ListTasksResult> {
        let limit = filter.limit.clamp(1, 100);
        let offset = (filter.page.max(1) - 1) * limit;

        let mut qb = sqlx::QueryBuilder::new(
            "SELECT id, task_type, status, priority, groups, metrics, parameters, \
             result, error, execution_time_ms, started_at, finished_at, \
             cancel_requested, created_by, created_at, updated_at FROM tasks WHERE 1=1",
        );
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(task_type) = filter.task_type {
            qb.push(" AND task_type = ").push_bind(task_type.as_str());
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(row_to_task)
            .collect::<EngineResult<Vec<_>>>()?;

        let mut count_qb = sqlx::QueryBuilder::new("SELECT count(*) as total FROM tasks WHERE 1=1");
        if let Some(status) = filter.status {
            count_qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(task_type) = filter.task_type {
            count_qb
                .push(" AND task_type = ")
                .push_bind(task_type.as_str());
        }
        let total: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        Ok(ListTasksResult { items, total })
    }

    /// Enforces the transition table in spec.md §4.5; rejects reverse
    /// transitions by returning `EngineError::Conflict`. `execution_time_ms`
    /// is a required Task field (spec.md §3) and set once, alongside
    /// `finished_at`, when the Worker reaches a terminal state.
    pub async fn update_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        started_at: Option<chrono::DateTime<Utc>>,
        finished_at: Option<chrono::DateTime<Utc>>,
        execution_time_ms: Option<i64>,
        error: Option<String>,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT status FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("task {id}")))?;
        let current: String = row.try_get("status")?;
        let current = TaskStatus::parse(&current)
            .ok_or_else(|| EngineError::Internal(format!("unknown status {current}")))?;

        if !current.can_transition_to(status) {
            return Err(EngineError::Conflict(format!(
                "illegal transition {} -> {}",
                current.as_str(),
                status.as_str()
            )));
        }

        sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2,
                started_at = COALESCE(started_at, $3),
                finished_at = COALESCE($4, finished_at),
                execution_time_ms = COALESCE($5, execution_time_ms),
                error = COALESCE($6, error),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(started_at)
        .bind(finished_at)
        .bind(execution_time_ms)
        .bind(error)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Mark a non-terminal task for cooperative cancellation (spec.md §5,
    /// "a cancellation request marks the task `cancelling`, logically
    /// equivalent to `processing`"). The Worker observes the flag at the
    /// next sub-unit boundary; this call itself never touches `status`.
    pub async fn request_cancel(&self, id: Uuid) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT status FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("task {id}")))?;
        let current: String = row.try_get("status")?;
        let current = TaskStatus::parse(&current)
            .ok_or_else(|| EngineError::Internal(format!("unknown status {current}")))?;

        if current.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "task already {}",
                current.as_str()
            )));
        }

        sqlx::query("UPDATE tasks SET cancel_requested = true, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Cheap poll used by the Worker at sub-unit boundaries; does not load
    /// the rest of the row.
    pub async fn is_cancel_requested(&self, id: Uuid) -> EngineResult<bool> {
        let row = sqlx::query("SELECT cancel_requested FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("task {id}")))?;
        Ok(row.try_get("cancel_requested")?)
    }

    /// Atomic read-modify-write; deltas are additive and never produce
    /// negative fields (spec.md §4.1).
    pub async fn increment_metrics(&self, id: Uuid, delta: MetricsDelta) -> EngineResult<()> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET metrics = jsonb_build_object(
                    'groups_total', GREATEST(0, (metrics->>'groups_total')::bigint + $2),
                    'groups_processed', GREATEST(0, (metrics->>'groups_processed')::bigint + $3),
                    'posts_total', GREATEST(0, (metrics->>'posts_total')::bigint + $4),
                    'posts_processed', GREATEST(0, (metrics->>'posts_processed')::bigint + $5),
                    'comments_total', GREATEST(0, (metrics->>'comments_total')::bigint + $6),
                    'comments_processed', GREATEST(0, (metrics->>'comments_processed')::bigint + $7),
                    'errors', GREATEST(0, (metrics->>'errors')::bigint + $8)
                ),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(delta.groups_total)
        .bind(delta.groups_processed)
        .bind(delta.posts_total)
        .bind(delta.posts_processed)
        .bind(delta.comments_total)
        .bind(delta.comments_processed)
        .bind(delta.errors)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_task(row: &sqlx::postgres::PgRow) -> EngineResult<Task> {
    let task_type: String = row.try_get("task_type")?;
    let status: String = row.try_get("status")?;
    let groups_json: serde_json::Value = row.try_get("groups")?;
    let metrics_json: serde_json::Value = row.try_get("metrics")?;

    Ok(Task {
        id: row.try_get("id")?,
        task_type: TaskType::parse(&task_type)
            .ok_or_else(|| EngineError::Internal(format!("unknown task_type {task_type}")))?,
        status: TaskStatus::parse(&status)
            .ok_or_else(|| EngineError::Internal(format!("unknown status {status}")))?,
        priority: row.try_get("priority")?,
        groups: serde_json::from_value(groups_json)
            .map_err(|e| EngineError::Internal(format!("parsing groups: {e}")))?,
        metrics: serde_json::from_value(metrics_json)
            .map_err(|e| EngineError::Internal(format!("parsing metrics: {e}")))?,
        parameters: row.try_get("parameters")?,
        result: row.try_get("result")?,
        error: row.try_get("error")?,
        execution_time_ms: row.try_get("execution_time_ms")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        cancel_requested: row.try_get("cancel_requested")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
