//! Process configuration, loaded once at startup from the environment.
//!
//! Mirrors the option set enumerated in spec.md §6. Every field has the
//! default named in the spec; `EngineConfig::from_env` never panics on a
//! missing var, only on one present-but-unparsable.

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub upstream_base_url: String,

    pub workers_count: usize,

    pub queue_base_delay_ms: u64,
    pub queue_max_delay_ms: u64,
    pub queue_max_attempts: i32,
    pub queue_lease_ms: u64,

    pub upstream_rps: u32,
    pub upstream_burst: u32,
    pub upstream_concurrency: usize,
    pub upstream_request_timeout_ms: u64,
    pub upstream_transient_retries: u32,

    pub progress_estimated_comments_per_post: u32,

    pub task_default_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost:5432/collector".to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            upstream_base_url: "https://api.vk.com/method".to_string(),
            workers_count: 3,
            queue_base_delay_ms: 1_000,
            queue_max_delay_ms: 60_000,
            queue_max_attempts: 5,
            queue_lease_ms: 30_000,
            upstream_rps: 5,
            upstream_burst: 5,
            upstream_concurrency: 4,
            upstream_request_timeout_ms: 10_000,
            upstream_transient_retries: 3,
            progress_estimated_comments_per_post: 15,
            task_default_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load from the environment, falling back to `.env` via `dotenvy` and
    /// then to the defaults above for anything unset.
    pub fn from_env() -> Result<Self, EngineError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            database_url: env_or("DATABASE_URL", defaults.database_url),
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            upstream_base_url: env_or("UPSTREAM_BASE_URL", defaults.upstream_base_url),
            workers_count: env_parsed("WORKERS_COUNT", defaults.workers_count)?,
            queue_base_delay_ms: env_parsed("QUEUE_BASE_DELAY_MS", defaults.queue_base_delay_ms)?,
            queue_max_delay_ms: env_parsed("QUEUE_MAX_DELAY_MS", defaults.queue_max_delay_ms)?,
            queue_max_attempts: env_parsed("QUEUE_MAX_ATTEMPTS", defaults.queue_max_attempts)?,
            queue_lease_ms: env_parsed("QUEUE_LEASE_MS", defaults.queue_lease_ms)?,
            upstream_rps: env_parsed("UPSTREAM_RPS", defaults.upstream_rps)?,
            upstream_burst: env_parsed("UPSTREAM_BURST", defaults.upstream_burst)?,
            upstream_concurrency: env_parsed(
                "UPSTREAM_CONCURRENCY",
                defaults.upstream_concurrency,
            )?,
            upstream_request_timeout_ms: env_parsed(
                "UPSTREAM_REQUEST_TIMEOUT_MS",
                defaults.upstream_request_timeout_ms,
            )?,
            upstream_transient_retries: env_parsed(
                "UPSTREAM_TRANSIENT_RETRIES",
                defaults.upstream_transient_retries,
            )?,
            progress_estimated_comments_per_post: env_parsed(
                "PROGRESS_ESTIMATED_COMMENTS_PER_POST",
                defaults.progress_estimated_comments_per_post,
            )?,
            task_default_timeout_ms: match std::env::var("TASK_DEFAULT_TIMEOUT_MS") {
                Ok(v) => Some(v.parse::<u64>().map_err(|e| {
                    EngineError::Validation(format!("TASK_DEFAULT_TIMEOUT_MS: {e}"))
                })?),
                Err(_) => defaults.task_default_timeout_ms,
            },
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, EngineError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| EngineError::Validation(format!("{key}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = EngineConfig::default();
        assert_eq!(c.workers_count, 3);
        assert_eq!(c.progress_estimated_comments_per_post, 15);
        assert!(c.task_default_timeout_ms.is_none());
    }
}
