//! PostStore — spec.md §4.1 `upsertPosts`, `getResults`. Idempotent by
//! `vkPostId`; updates `text, likes, updatedAt` on conflict.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::Post;
use crate::error::EngineResult;

#[derive(Clone)]
pub struct PostStore {
    pool: PgPool,
}

pub struct GetResultsFilter {
    pub group_id: Option<String>,
    pub post_vk_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

pub struct GetResultsResult {
    pub posts: Vec<Post>,
    pub total_comments: i64,
}

impl PostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent by `vkPostId`; the whole page commits atomically.
    pub async fn upsert_posts(&self, posts: &[Post]) -> EngineResult<()> {
        if posts.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for post in posts {
            sqlx::query(
                r#"
                INSERT INTO posts
                    (vk_post_id, owner_id, group_id, text, date, likes,
                     task_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                ON CONFLICT (vk_post_id) DO UPDATE SET
                    text = EXCLUDED.text,
                    likes = EXCLUDED.likes,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(post.vk_post_id)
            .bind(post.owner_id)
            .bind(&post.group_id)
            .bind(&post.text)
            .bind(post.date)
            .bind(post.likes)
            .bind(post.task_id)
            .bind(post.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_results(&self, task_id: Uuid, filter: GetResultsFilter) -> EngineResult<GetResultsResult> {
        let limit = filter.limit.clamp(1, 1_000);
        let offset = filter.offset.max(0);

        let mut qb = sqlx::QueryBuilder::new(
            "SELECT vk_post_id, owner_id, group_id, text, date, likes, \
             task_id, created_at, updated_at FROM posts WHERE task_id = ",
        );
        qb.push_bind(task_id);
        if let Some(group_id) = &filter.group_id {
            qb.push(" AND group_id = ").push_bind(group_id.clone());
        }
        if let Some(post_vk_id) = filter.post_vk_id {
            qb.push(" AND vk_post_id = ").push_bind(post_vk_id);
        }
        qb.push(" ORDER BY date DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let posts = rows
            .iter()
            .map(|row| {
                Ok(Post {
                    vk_post_id: row.try_get("vk_post_id")?,
                    owner_id: row.try_get("owner_id")?,
                    group_id: row.try_get("group_id")?,
                    text: row.try_get("text")?,
                    date: row.try_get("date")?,
                    likes: row.try_get("likes")?,
                    task_id: row.try_get("task_id")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let post_ids: Vec<i64> = posts.iter().map(|p| p.vk_post_id).collect();
        let total_comments: i64 = if post_ids.is_empty() {
            0
        } else {
            sqlx::query("SELECT count(*) as total FROM comments WHERE post_vk_id = ANY($1)")
                .bind(&post_ids)
                .fetch_one(&self.pool)
                .await?
                .try_get("total")?
        };

        Ok(GetResultsResult {
            posts,
            total_comments,
        })
    }
}
