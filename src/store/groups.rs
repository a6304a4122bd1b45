//! GroupStore — spec.md §4.1 `upsertGroups`. Idempotent by `(taskId, vkId)`.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{GroupStatus, UpsertGroupsResult};
use crate::error::EngineResult;

#[derive(Clone)]
pub struct GroupStore {
    pool: PgPool,
}

pub struct GroupUpsert {
    pub vk_id: String,
    pub name: String,
    pub status: GroupStatus,
}

impl GroupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent by `(taskId, vkId)`; returns counts `{inserted, duplicate,
    /// invalid}`. The whole batch commits atomically or leaves the store
    /// unchanged (spec.md §4.1).
    pub async fn upsert_groups(
        &self,
        task_id: Uuid,
        items: Vec<GroupUpsert>,
    ) -> EngineResult<UpsertGroupsResult> {
        let mut result = UpsertGroupsResult::default();
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for item in items {
            let inserted = sqlx::query(
                r#"
                INSERT INTO groups (id, task_id, vk_id, name, status, uploaded_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (task_id, vk_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(task_id)
            .bind(&item.vk_id)
            .bind(&item.name)
            .bind(item.status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;

            if inserted {
                result.inserted += 1;
                if item.status == GroupStatus::Invalid {
                    result.invalid += 1;
                }
            } else {
                result.duplicate += 1;
            }
        }

        tx.commit().await?;
        Ok(result)
    }
}
