use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::config::headers::X_TOTAL_COUNT;
use crate::handlers::SharedState;
use crate::models::{normalize_create_input, EventCreateInput, EventUpdateInput};
use crate::utils::error::AppError;
use crate::utils::response::{created, no_content, success};
use crate::validation::ValidationError;

const MAX_LIST_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub status: Option<String>,
}

pub async fn create_event(
    State(state): State<SharedState>,
    payload: Result<Json<EventCreateInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(input) = payload?;
    let event = normalize_create_input(input, &state.limits)?;
    let created_event = state.gateway.create(event).await?;

    Ok(created(created_event).into_response())
}

pub async fn list_events(
    State(state): State<SharedState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params?;
    if let Some(limit) = params.limit {
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(ValidationError::new(
                "limit",
                format!("Limit must be between 1 and {}", MAX_LIST_LIMIT),
            )
            .into());
        }
    }

    let mut events = state.gateway.list(params.limit.map(|l| l as usize)).await?;
    // An empty `?status=` means no filter.
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        events.retain(|event| event.status.as_str() == status);
    }

    let total = HeaderValue::from(events.len());
    Ok((
        [(HeaderName::from_static(X_TOTAL_COUNT), total)],
        success(events),
    )
        .into_response())
}

pub async fn get_event(
    State(state): State<SharedState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event = state
        .gateway
        .get(&event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event with ID '{}' not found", event_id)))?;

    Ok(success(event).into_response())
}

pub async fn update_event(
    State(state): State<SharedState>,
    Path(event_id): Path<String>,
    payload: Result<Json<EventUpdateInput>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(input) = payload?;
    if input.is_empty() {
        return Err(ValidationError::general("No fields provided for update").into());
    }

    let patch = input.validate(&state.limits)?;
    let updated = state.gateway.update(&event_id, &patch).await?;

    Ok(success(updated).into_response())
}

pub async fn delete_event(
    State(state): State<SharedState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    state.gateway.delete(&event_id).await?;
    Ok(no_content().into_response())
}
