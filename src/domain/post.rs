//! Post and Comment — spec.md §3. Natural keys only, no pointer graphs
//! (spec.md §9): a `Comment` references its post by `post_vk_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub vk_post_id: i64,
    pub owner_id: i64,
    pub group_id: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub likes: i64,
    pub task_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub vk_comment_id: i64,
    pub post_vk_id: i64,
    pub owner_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
