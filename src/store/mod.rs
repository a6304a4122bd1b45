//! Store — durable persistence for tasks, groups, posts, comments.
//!
//! One module per entity behind a single transactional facade, per
//! spec.md §9 ("collapse [duplicate repository methods] to a single Store
//! with four entity modules behind one transactional interface") and
//! grounded on the teacher's `bpmn_integration::pending_dispatches` shape:
//! a struct wrapping a `PgPool`, one method per operation, idempotent
//! upserts via `ON CONFLICT`.
//!
//! Unlike the teacher (which uses the compile-time-checked `sqlx::query!`
//! macro against a live `DATABASE_URL`), these modules use the runtime
//! `sqlx::query`/`query_as` family so the crate compiles without a
//! database reachable at build time; see DESIGN.md.

mod comments;
mod groups;
mod posts;
mod tasks;

pub use comments::CommentStore;
pub use groups::{GroupStore, GroupUpsert};
pub use posts::{GetResultsFilter, GetResultsResult, PostStore};
pub use tasks::{CreateTaskInput, ListTasksFilter, ListTasksResult, TaskStore};

use sqlx::PgPool;

/// Facade composing the four entity stores over one pool.
#[derive(Clone)]
pub struct Store {
    pub tasks: TaskStore,
    pub groups: GroupStore,
    pub posts: PostStore,
    pub comments: CommentStore,
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self {
            tasks: TaskStore::new(pool.clone()),
            groups: GroupStore::new(pool.clone()),
            posts: PostStore::new(pool.clone()),
            comments: CommentStore::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
