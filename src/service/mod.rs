//! TaskService — the façade the HTTP layer and CLI both drive, spec.md
//! §4.5 ("Task Service & state machine") and §5 ("createVkCollect",
//! "startCollect", "getTaskStatus", "listTasks").

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{Task, TaskGroupInput, TaskType};
use crate::error::{EngineError, EngineResult};
use crate::queue::{EnqueueInput, EnqueueOutcome, Queue};
use crate::store::{CreateTaskInput, GetResultsFilter, GetResultsResult, ListTasksFilter, ListTasksResult, Store};
use crate::worker::{self, Progress};

#[derive(Clone)]
pub struct TaskService {
    store: Store,
    queue: Queue,
    config: EngineConfig,
}

pub struct TaskWithProgress {
    pub task: Task,
    pub progress: Progress,
}

impl TaskService {
    pub fn new(store: Store, queue: Queue, config: EngineConfig) -> Self {
        Self { store, queue, config }
    }

    /// Create a `fetch_comments` task for a set of VK group ids and enqueue
    /// it for collection in one step (spec.md §5 `createVkCollect`).
    ///
    /// If an equivalent task is already live (its job has not reached a
    /// terminal state), returns that task instead of creating a duplicate —
    /// the single-flight-per-task invariant belongs to the queue, but
    /// returning the existing id here keeps a caller that calls twice from
    /// believing it started two independent collections.
    pub async fn create_vk_collect(
        &self,
        groups: Vec<TaskGroupInput>,
        created_by: Option<String>,
    ) -> EngineResult<Task> {
        if groups.is_empty() {
            return Err(EngineError::Validation("groups must not be empty".to_string()));
        }

        let task = self
            .store
            .tasks
            .create_task(CreateTaskInput {
                task_type: TaskType::FetchComments,
                priority: 0,
                groups,
                parameters: serde_json::Value::Null,
                created_by,
            })
            .await?;

        self.start_collect(task.id).await?;
        Ok(task)
    }

    /// Enqueue collection for an existing task. A no-op when the task is
    /// already in a terminal state (spec.md §9, Open Question: starting a
    /// completed/failed task does not resurrect it).
    pub async fn start_collect(&self, task_id: Uuid) -> EngineResult<()> {
        let task = self.store.tasks.get_task(task_id).await?;
        if task.status.is_terminal() {
            return Ok(());
        }

        let outcome = self
            .queue
            .enqueue(EnqueueInput {
                task_id,
                payload: serde_json::json!({ "task_type": task.task_type.as_str() }),
                delay_ms: 0,
                priority: task.priority,
                max_attempts: self.config.queue_max_attempts,
            })
            .await?;

        match outcome {
            EnqueueOutcome::Created(_) | EnqueueOutcome::AlreadyLive(_) => Ok(()),
        }
    }

    /// Task plus its derived progress (spec.md §5 `getTaskStatus`, §4.6).
    pub async fn get_task_status(&self, task_id: Uuid) -> EngineResult<TaskWithProgress> {
        let task = self.store.tasks.get_task(task_id).await?;
        let progress = worker::calculate(
            &task.metrics,
            task.status,
            self.config.progress_estimated_comments_per_post,
        );
        Ok(TaskWithProgress { task, progress })
    }

    pub async fn list_tasks(&self, filter: ListTasksFilter) -> EngineResult<ListTasksResult> {
        self.store.tasks.list_tasks(filter).await
    }

    /// Request cooperative cancellation of a running task (spec.md §5,
    /// scenario S6). Rejects already-terminal tasks with `Conflict`; the
    /// Worker observes the flag at the next sub-unit boundary and fails
    /// the task with error kind `Cancelled`.
    pub async fn cancel_task(&self, task_id: Uuid) -> EngineResult<()> {
        self.store.tasks.request_cancel(task_id).await
    }

    /// Collected posts (and comment counts) for a task, spec.md §5
    /// `getResults`.
    pub async fn store_results(
        &self,
        task_id: Uuid,
        filter: GetResultsFilter,
    ) -> EngineResult<GetResultsResult> {
        self.store.tasks.get_task(task_id).await?;
        self.store.posts.get_results(task_id, filter).await
    }
}
