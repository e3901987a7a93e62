//! Entity CRUD handlers: list, create, read, delete.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::response::{success_created, success_many, success_one};
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn resolve_entity<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown entity: {}", path_segment)))
}

fn parse_paging(name: &str, v: &str) -> Result<u32, AppError> {
    v.parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", name)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let mut limit: Option<u32> = None;
    let mut offset: Option<u32> = None;
    let mut filters: Vec<(String, Value)> = Vec::new();

    for (k, v) in params {
        match k.as_str() {
            "limit" => limit = Some(parse_paging("limit", &v)?),
            "offset" => offset = Some(parse_paging("offset", &v)?),
            _ => filters.push((k, Value::String(v))),
        }
    }

    let rows = CrudService::list(state.store.as_ref(), entity, &filters, limit, offset).await?;
    Ok(success_many(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let row = CrudService::create(state.store.as_ref(), entity, body).await?;
    Ok(success_created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let row = CrudService::read(state.store.as_ref(), entity, &id).await?;
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = resolve_entity(&state, &path_segment)?;
    CrudService::delete(state.store.as_ref(), entity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// No entity supports update; PATCH and PUT land here.
pub async fn update_not_supported() -> AppError {
    AppError::MethodNotAllowed("update is not supported".into())
}
