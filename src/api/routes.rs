//! Controller Contract — spec.md §6's five HTTP endpoints plus a cancel
//! route for the cooperative cancellation spec.md §5 requires. Routing
//! shape grounded on `api::control_routes`: a `Router::new()` with
//! `with_state`, handlers taking `State`/`Path`/`Query` extractors and
//! returning `Result<Json<_>, EngineError>`.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{TaskGroupInput, TaskStatus, TaskType};
use crate::error::{EngineError, EngineResult};
use crate::service::TaskService;
use crate::store::{GetResultsFilter, ListTasksFilter};

use super::response::{Envelope, Pagination};

#[derive(Clone)]
pub struct AppState {
    pub service: TaskService,
}

pub fn build_router(service: TaskService) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/api/tasks/collect", post(create_vk_collect))
        .route("/api/collect/:task_id", post(start_collect))
        .route("/api/tasks/:task_id", get(get_task))
        .route("/api/tasks/:task_id/cancel", post(cancel_task))
        .route("/api/tasks", get(list_tasks))
        .route("/api/results/:task_id", get(get_results))
        .with_state(state)
}

/// Wire shape for one element of `groups` (spec.md §6:
/// `Array<number | "digits" | {id, name}>`), accepted as a bare VK id, a
/// digit string, or an object naming the group up front. `id` inside the
/// object form may itself be a number or a digit string (scenario S2).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupIdWire {
    Number(i64),
    Digits(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupInputWire {
    Bare(GroupIdWire),
    Named { id: GroupIdWire, name: Option<String> },
}

impl GroupIdWire {
    fn into_vk_id(self) -> Result<String, String> {
        match self {
            GroupIdWire::Number(n) => Ok(n.to_string()),
            GroupIdWire::Digits(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => Ok(s),
            GroupIdWire::Digits(s) => Err(format!("group id {s:?} is not a string of digits")),
        }
    }
}

impl GroupInputWire {
    fn into_domain(self) -> Result<TaskGroupInput, String> {
        match self {
            GroupInputWire::Bare(id) => Ok(TaskGroupInput {
                vk_id: id.into_vk_id()?,
                name: None,
            }),
            GroupInputWire::Named { id, name } => Ok(TaskGroupInput {
                vk_id: id.into_vk_id()?,
                name,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CollectRequest {
    groups: Vec<GroupInputWire>,
    created_by: Option<String>,
}

async fn create_vk_collect(
    State(state): State<AppState>,
    Json(body): Json<CollectRequest>,
) -> EngineResult<Json<Envelope<crate::domain::Task>>> {
    let groups = body
        .groups
        .into_iter()
        .map(GroupInputWire::into_domain)
        .collect::<Result<Vec<_>, _>>()
        .map_err(EngineError::Validation)?;

    let task = state
        .service
        .create_vk_collect(groups, body.created_by)
        .await?;
    Ok(Json(Envelope::ok(task)))
}

async fn cancel_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> EngineResult<Json<Envelope<()>>> {
    state.service.cancel_task(task_id).await?;
    Ok(Json(Envelope::ok(())))
}

async fn start_collect(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> EngineResult<Json<Envelope<()>>> {
    state.service.start_collect(task_id).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Debug, Serialize)]
struct TaskStatusResponse {
    #[serde(flatten)]
    task: crate::domain::Task,
    progress: crate::worker::Progress,
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> EngineResult<Json<Envelope<TaskStatusResponse>>> {
    let with_progress = state.service.get_task_status(task_id).await?;
    Ok(Json(Envelope::ok(TaskStatusResponse {
        task: with_progress.task,
        progress: with_progress.progress,
    })))
}

#[derive(Debug, Deserialize)]
struct ListTasksQuery {
    page: Option<i64>,
    limit: Option<i64>,
    status: Option<String>,
    task_type: Option<String>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> EngineResult<Json<Envelope<Vec<crate::domain::Task>>>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20);

    let result = state
        .service
        .list_tasks(ListTasksFilter {
            page,
            limit,
            status: query.status.as_deref().and_then(TaskStatus::parse),
            task_type: query.task_type.as_deref().and_then(TaskType::parse),
        })
        .await?;

    Ok(Json(Envelope::ok_paginated(
        result.items,
        Pagination::new(page, limit.clamp(1, 100), result.total),
    )))
}

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    group_id: Option<String>,
    post_vk_id: Option<i64>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ResultsResponse {
    posts: Vec<crate::domain::Post>,
    total_comments: i64,
}

async fn get_results(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Query(query): Query<ResultsQuery>,
) -> EngineResult<Json<Envelope<ResultsResponse>>> {
    let result = state
        .service
        .store_results(
            task_id,
            GetResultsFilter {
                group_id: query.group_id,
                post_vk_id: query.post_vk_id,
                limit: query.limit.unwrap_or(50),
                offset: query.offset.unwrap_or(0),
            },
        )
        .await?;

    Ok(Json(Envelope::ok(ResultsResponse {
        posts: result.posts,
        total_comments: result.total_comments,
    })))
}
