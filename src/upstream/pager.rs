//! Cursor-based pagers expressing "lazy paged sequence" (spec.md §4.3)
//! without pulling in `futures::Stream`/`async-stream`: `next_page`
//! advances an offset cursor and returns `None` once the upstream signals
//! no further pages, or once `max_posts` is reached.

use super::client::{CommentSort, UpstreamClient};
use crate::domain::{Comment, Post};
use crate::error::EngineResult;
use uuid::Uuid;

pub struct PostPager {
    client: UpstreamClient,
    group_vk_id: String,
    page_size: u32,
    max_posts: Option<u32>,
    offset: u32,
    fetched: u32,
    done: bool,
}

impl PostPager {
    pub(super) fn new(
        client: UpstreamClient,
        group_vk_id: String,
        page_size: u32,
        max_posts: Option<u32>,
    ) -> Self {
        Self {
            client,
            group_vk_id,
            page_size,
            max_posts,
            offset: 0,
            fetched: 0,
            done: false,
        }
    }

    /// Fetch the next page of posts for `task_id`, or `None` once the
    /// sequence is exhausted.
    pub async fn next_page(&mut self, task_id: Uuid) -> EngineResult<Option<Vec<Post>>> {
        if self.done {
            return Ok(None);
        }
        if let Some(max) = self.max_posts {
            if self.fetched >= max {
                self.done = true;
                return Ok(None);
            }
        }

        let page = self
            .client
            .fetch_post_page(&self.group_vk_id, self.offset, self.page_size)
            .await?;

        if page.items.is_empty() {
            self.done = true;
            return Ok(None);
        }

        self.fetched += page.items.len() as u32;
        self.offset = page.next_offset.unwrap_or(self.offset + page.items.len() as u32);
        if page.next_offset.is_none() {
            self.done = true;
        }

        let now = chrono::Utc::now();
        let posts = page
            .items
            .into_iter()
            .map(|dto| Post {
                vk_post_id: dto.vk_post_id,
                owner_id: dto.owner_id,
                group_id: self.group_vk_id.clone(),
                text: dto.text,
                date: dto.date,
                likes: dto.likes,
                task_id,
                created_at: now,
                updated_at: now,
            })
            .collect();

        Ok(Some(posts))
    }
}

pub struct CommentPager {
    client: UpstreamClient,
    post_vk_id: i64,
    sort: CommentSort,
    page_size: u32,
    offset: u32,
    done: bool,
}

impl CommentPager {
    pub(super) fn new(client: UpstreamClient, post_vk_id: i64, sort: CommentSort, page_size: u32) -> Self {
        Self {
            client,
            post_vk_id,
            sort,
            page_size,
            offset: 0,
            done: false,
        }
    }

    pub async fn next_page(&mut self) -> EngineResult<Option<Vec<Comment>>> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .client
            .fetch_comment_page(self.post_vk_id, self.sort, self.offset, self.page_size)
            .await?;

        if page.items.is_empty() {
            self.done = true;
            return Ok(None);
        }

        self.offset = page.next_offset.unwrap_or(self.offset + page.items.len() as u32);
        if page.next_offset.is_none() {
            self.done = true;
        }

        let now = chrono::Utc::now();
        let comments = page
            .items
            .into_iter()
            .map(|dto| Comment {
                vk_comment_id: dto.vk_comment_id,
                post_vk_id: self.post_vk_id,
                owner_id: dto.owner_id,
                author_id: dto.author_id,
                author_name: dto.author_name,
                text: dto.text,
                date: dto.date,
                likes: dto.likes,
                created_at: now,
                updated_at: now,
            })
            .collect();

        Ok(Some(comments))
    }
}
