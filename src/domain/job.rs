//! Job — spec.md §3 ("Job") and §4.2 ("Queue").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    Delayed,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(JobState::Waiting),
            "active" => Some(JobState::Active),
            "delayed" => Some(JobState::Delayed),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }

    /// Whether a job in this state counts against the single-flight-per-task
    /// invariant (spec.md §4.2, §8 property 6).
    pub fn is_live(&self) -> bool {
        matches!(self, JobState::Waiting | JobState::Active | JobState::Delayed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub task_id: Uuid,
    /// Opaque application payload — the worker interprets this per the
    /// task's `task_type`.
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub max_attempts: i32,
    pub priority: i32,
    pub run_at: DateTime<Utc>,
    pub state: JobState,
    pub last_error: Option<String>,
    pub lease_until: Option<DateTime<Utc>>,
}

/// Exponential backoff with a cap, per spec.md §4.2: `delay = base *
/// 2^(attempts-1)`.
pub fn backoff_delay_ms(attempts: i32, base_ms: u64, max_ms: u64) -> u64 {
    if attempts <= 0 {
        return base_ms.min(max_ms);
    }
    let exp = attempts.min(32) as u32 - 1;
    base_ms
        .saturating_mul(1u64.checked_shl(exp).unwrap_or(u64::MAX))
        .min(max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        assert_eq!(backoff_delay_ms(1, 1_000, 60_000), 1_000);
        assert_eq!(backoff_delay_ms(2, 1_000, 60_000), 2_000);
        assert_eq!(backoff_delay_ms(3, 1_000, 60_000), 4_000);
        assert_eq!(backoff_delay_ms(10, 1_000, 60_000), 60_000);
    }

    #[test]
    fn live_states_match_single_flight_definition() {
        assert!(JobState::Waiting.is_live());
        assert!(JobState::Active.is_live());
        assert!(JobState::Delayed.is_live());
        assert!(!JobState::Completed.is_live());
        assert!(!JobState::Failed.is_live());
    }
}
