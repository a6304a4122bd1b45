//! CommentStore — spec.md §4.1 `upsertComments`. Idempotent by
//! `vkCommentId`.

use sqlx::PgPool;

use crate::domain::Comment;
use crate::error::EngineResult;

#[derive(Clone)]
pub struct CommentStore {
    pool: PgPool,
}

impl CommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent by `vkCommentId`; the whole page commits atomically.
    pub async fn upsert_comments(&self, comments: &[Comment]) -> EngineResult<()> {
        if comments.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for comment in comments {
            sqlx::query(
                r#"
                INSERT INTO comments
                    (vk_comment_id, post_vk_id, owner_id, author_id, author_name,
                     text, date, likes, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                ON CONFLICT (vk_comment_id) DO UPDATE SET
                    text = EXCLUDED.text,
                    likes = EXCLUDED.likes,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(comment.vk_comment_id)
            .bind(comment.post_vk_id)
            .bind(comment.owner_id)
            .bind(comment.author_id)
            .bind(&comment.author_name)
            .bind(&comment.text)
            .bind(comment.date)
            .bind(comment.likes)
            .bind(comment.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
