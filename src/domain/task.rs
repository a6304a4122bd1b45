//! Task — spec.md §3 ("Task") and the state machine in §4.5.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    FetchComments,
    ProcessGroups,
    AnalyzePosts,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::FetchComments => "fetch_comments",
            TaskType::ProcessGroups => "process_groups",
            TaskType::AnalyzePosts => "analyze_posts",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fetch_comments" => Some(TaskType::FetchComments),
            "process_groups" => Some(TaskType::ProcessGroups),
            "analyze_posts" => Some(TaskType::AnalyzePosts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition per the table in
    /// spec.md §4.5. Terminal states have no outgoing transitions.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (*self, next) {
            (Pending, Processing) => true,
            (Pending, Failed) => true,
            (Processing, Processing) => true,
            (Processing, Completed) => true,
            (Processing, Failed) => true,
            _ => false,
        }
    }
}

/// A group identifier as submitted by the caller, before resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGroupInput {
    pub vk_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: i32,
    pub groups: Vec<TaskGroupInput>,
    pub metrics: Metrics,
    /// Opaque user-supplied configuration; never interpreted by the engine.
    pub parameters: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set by `TaskStore::request_cancel`; the Worker observes it at the
    /// next sub-unit boundary (spec.md §5, "cancelling" is logically
    /// equivalent to `processing`, so this is a flag rather than a status).
    pub cancel_requested: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Normalize a caller-supplied group list: collapse duplicates to a
    /// set (spec.md §8, "Duplicate ids in groups collapsed to a set before
    /// enqueue"), preserving first-seen order.
    pub fn normalize_groups(inputs: Vec<TaskGroupInput>) -> Vec<TaskGroupInput> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for input in inputs {
            if seen.insert(input.vk_id.clone()) {
                out.push(input);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Processing));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn normalize_groups_dedupes_preserving_order() {
        let inputs = vec![
            TaskGroupInput {
                vk_id: "2249".to_string(),
                name: None,
            },
            TaskGroupInput {
                vk_id: "2249".to_string(),
                name: Some("X".to_string()),
            },
            TaskGroupInput {
                vk_id: "7".to_string(),
                name: None,
            },
        ];
        let normalized = Task::normalize_groups(inputs);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].vk_id, "2249");
        assert_eq!(normalized[1].vk_id, "7");
    }

    #[test]
    fn task_type_round_trips() {
        for t in [
            TaskType::FetchComments,
            TaskType::ProcessGroups,
            TaskType::AnalyzePosts,
        ] {
            assert_eq!(TaskType::parse(t.as_str()), Some(t));
        }
    }
}
