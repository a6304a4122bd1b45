//! Group — spec.md §3 ("Group"). Uniqueness: `(taskId, vkId)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Valid,
    Invalid,
    Duplicate,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Valid => "valid",
            GroupStatus::Invalid => "invalid",
            GroupStatus::Duplicate => "duplicate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "valid" => Some(GroupStatus::Valid),
            "invalid" => Some(GroupStatus::Invalid),
            "duplicate" => Some(GroupStatus::Duplicate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub vk_id: String,
    pub name: String,
    pub status: GroupStatus,
    pub task_id: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

/// Counts returned from an `upsertGroups` batch (spec.md §4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertGroupsResult {
    pub inserted: i64,
    pub duplicate: i64,
    pub invalid: i64,
}
