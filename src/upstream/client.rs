//! Typed HTTP client wrapper for the upstream social-network API.
//!
//! Hides raw JSON responses behind domain-friendly Rust types, the way
//! `bpmn_integration::client::BpmnLiteConnection` hides protobuf. Cheaply
//! cloneable: `reqwest::Client` and the rate limiter are both internally
//! reference-counted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;

use super::classify::{classify_status, classify_transport_error, UpstreamErrorKind};
use super::pager::{CommentPager, PostPager};
use super::rate_limiter::RateLimiter;
use crate::domain::{Comment, Post};
use crate::error::{EngineError, EngineResult};

/// Sort order for comment listing. The upstream API rejects requests that
/// omit this (spec.md §4.3, "historical bug: defaulting to none") — the
/// client never emits the unset-sort form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSort {
    Asc,
    Desc,
    Smart,
}

impl Default for CommentSort {
    fn default() -> Self {
        CommentSort::Asc
    }
}

impl CommentSort {
    pub fn as_query_value(&self) -> &'static str {
        match self {
            CommentSort::Asc => "asc",
            CommentSort::Desc => "desc",
            CommentSort::Smart => "smart",
        }
    }
}

/// Result of resolving a single group id (spec.md §4.3). A rejected id
/// still carries a name — the synthetic `"Группа <id>"` — so the worker
/// can write a display name even for a group it marks `invalid`.
#[derive(Debug, Clone)]
pub enum ResolvedGroup {
    Resolved { vk_id: String, name: String },
    Rejected { vk_id: String, synthetic_name: String },
}

#[derive(Debug, Deserialize)]
struct ResolveGroupsResponseItem {
    vk_id: String,
    name: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PostPage {
    pub(super) items: Vec<PostDto>,
    pub(super) next_offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PostDto {
    pub(super) vk_post_id: i64,
    pub(super) owner_id: i64,
    pub(super) text: String,
    pub(super) date: DateTime<Utc>,
    pub(super) likes: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentPage {
    pub(super) items: Vec<CommentDto>,
    pub(super) next_offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentDto {
    pub(super) vk_comment_id: i64,
    pub(super) owner_id: i64,
    pub(super) author_id: i64,
    pub(super) author_name: String,
    pub(super) text: String,
    pub(super) date: DateTime<Utc>,
    pub(super) likes: i64,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
    request_timeout: Duration,
    transient_retries: u32,
}

impl UpstreamClient {
    pub fn new(
        base_url: impl Into<String>,
        rps: u32,
        burst: u32,
        concurrency: usize,
        request_timeout_ms: u64,
        transient_retries: u32,
    ) -> EngineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()
            .map_err(|e| EngineError::Internal(format!("building http client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            limiter: RateLimiter::new(rps, burst, concurrency),
            request_timeout: Duration::from_millis(request_timeout_ms),
            transient_retries,
        })
    }

    /// Batch-resolve group ids. On failure for any id, returns a synthetic
    /// name `"Группа <id>"` rather than propagating the error — per
    /// spec.md §4.3 and §7.
    pub async fn resolve_groups(&self, vk_ids: &[String]) -> EngineResult<Vec<ResolvedGroup>> {
        let url = format!("{}/groups.resolve", self.base_url);
        let body = serde_json::json!({ "vk_ids": vk_ids });

        let response: Vec<ResolveGroupsResponseItem> = self
            .execute_with_policy(|| {
                self.http
                    .post(&url)
                    .timeout(self.request_timeout)
                    .json(&body)
            })
            .await?;

        Ok(response
            .into_iter()
            .map(|item| match item.name {
                Some(name) => ResolvedGroup::Resolved {
                    vk_id: item.vk_id,
                    name,
                },
                None => ResolvedGroup::Rejected {
                    synthetic_name: format!("Группа {}", item.vk_id),
                    vk_id: item.vk_id,
                },
            })
            .collect())
    }

    /// Lazy, finite, newest-first paged sequence of posts for a group,
    /// resumable by cursor (spec.md §4.3).
    pub fn list_posts(&self, group_vk_id: String, page_size: u32, max_posts: Option<u32>) -> PostPager {
        PostPager::new(self.clone(), group_vk_id, page_size, max_posts)
    }

    /// Lazy, finite paged sequence of comments for a post, ordered by
    /// `sort` (default `asc`). `sort` is always one of the three
    /// enumerated values (spec.md §8, boundary case).
    pub fn list_comments(&self, post_vk_id: i64, sort: CommentSort, page_size: u32) -> CommentPager {
        CommentPager::new(self.clone(), post_vk_id, sort, page_size)
    }

    pub(super) async fn fetch_post_page(
        &self,
        group_vk_id: &str,
        offset: u32,
        page_size: u32,
    ) -> EngineResult<PostPage> {
        let url = format!("{}/groups/{}/posts", self.base_url, group_vk_id);
        self.execute_with_policy(|| {
            self.http
                .get(&url)
                .timeout(self.request_timeout)
                .query(&[("offset", offset.to_string()), ("count", page_size.to_string())])
        })
        .await
    }

    pub(super) async fn fetch_comment_page(
        &self,
        post_vk_id: i64,
        sort: CommentSort,
        offset: u32,
        page_size: u32,
    ) -> EngineResult<CommentPage> {
        let url = format!("{}/posts/{}/comments", self.base_url, post_vk_id);
        self.execute_with_policy(|| {
            self.http
                .get(&url)
                .timeout(self.request_timeout)
                .query(&[
                    ("sort", sort.as_query_value().to_string()),
                    ("offset", offset.to_string()),
                    ("count", page_size.to_string()),
                ])
        })
        .await
    }

    /// Run one logical request under the rate limiter, honoring
    /// rate-limit cool-off (doubling, capped) and retrying transient
    /// failures up to `transient_retries` times with jitter (spec.md
    /// §4.3, §4.7). Permanent/auth errors propagate immediately.
    async fn execute_with_policy<T, F>(&self, build: F) -> EngineResult<T>
    where
        T: for<'de> Deserialize<'de>,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut cooloff_ms: u64 = 1_000;
        let mut transient_attempts = 0u32;

        loop {
            let _permit = self.limiter.acquire().await;
            let response = build().send().await;
            drop(_permit);

            let response = match response {
                Ok(resp) => resp,
                Err(e) => {
                    let (kind, err) = classify_transport_error(&e);
                    if kind == UpstreamErrorKind::Transient && transient_attempts < self.transient_retries
                    {
                        transient_attempts += 1;
                        sleep_with_jitter(backoff_for_attempt(transient_attempts)).await;
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| EngineError::Internal(format!("decoding upstream response: {e}")));
            }

            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let (kind, err) = classify_status(status.as_u16(), retry_after);

            match kind {
                UpstreamErrorKind::RateLimited => {
                    let wait_ms = retry_after.map(|s| s * 1000).unwrap_or(cooloff_ms);
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    cooloff_ms = (cooloff_ms * 2).min(60_000);
                    continue;
                }
                UpstreamErrorKind::Transient if transient_attempts < self.transient_retries => {
                    transient_attempts += 1;
                    sleep_with_jitter(backoff_for_attempt(transient_attempts)).await;
                    continue;
                }
                _ => return Err(err),
            }
        }
    }
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1u64 << attempt.min(8)))
}

async fn sleep_with_jitter(base: Duration) {
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 4 + 1);
    tokio::time::sleep(base + Duration::from_millis(jitter_ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_sort_default_is_asc() {
        assert_eq!(CommentSort::default(), CommentSort::Asc);
    }

    #[test]
    fn comment_sort_never_emits_unset() {
        for sort in [CommentSort::Asc, CommentSort::Desc, CommentSort::Smart] {
            assert!(["asc", "desc", "smart"].contains(&sort.as_query_value()));
        }
    }
}
