//! Response envelope — spec.md §6: every HTTP response shares one shape,
//! `{success, data?, error?, timestamp, requestId}`, with an optional
//! pagination block on list endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            pagination: None,
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
        }
    }

    pub fn ok_paginated(data: T, pagination: Pagination) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            pagination: Some(pagination),
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
        }
    }
}

/// Maps each `EngineError` variant to the HTTP status spec.md §7 assigns
/// it, wrapped in the standard envelope.
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngineError::Cancelled => StatusCode::BAD_REQUEST,
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EngineError::UpstreamAuth(_) => StatusCode::BAD_GATEWAY,
            EngineError::UpstreamTransient(_)
            | EngineError::UpstreamPermanent(_)
            | EngineError::StoreUnavailable(_)
            | EngineError::QueueUnavailable(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                kind: self.kind().to_string(),
                message: self.to_string(),
            }),
            pagination: None,
            timestamp: Utc::now(),
            request_id: Uuid::new_v4(),
        };

        (status, Json(body)).into_response()
    }
}
