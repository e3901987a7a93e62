//! Generic CRUD over an entity: operation gate, create pipeline, output projection.

use crate::config::{Operation, ResolvedEntity};
use crate::error::AppError;
use crate::service::preprocess::run_chain;
use crate::store::{EntityStore, Row};
use serde_json::Value;
use std::collections::HashMap;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

pub struct CrudService;

impl CrudService {
    fn ensure_allowed(entity: &ResolvedEntity, op: Operation) -> Result<(), AppError> {
        if entity.allows(op) {
            Ok(())
        } else {
            Err(AppError::MethodNotAllowed(format!("{} on {}", op, entity.path_segment)))
        }
    }

    /// List rows with exact-match filters on exposed columns, limit (default 100, max 1000), offset (default 0).
    pub async fn list(
        store: &dyn EntityStore,
        entity: &ResolvedEntity,
        filters: &[(String, Value)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Value>, AppError> {
        Self::ensure_allowed(entity, Operation::Read)?;
        let filters: Vec<(String, Value)> = filters
            .iter()
            .filter(|(col, _)| entity.is_exposed(col))
            .cloned()
            .collect();
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let rows = store
            .list(&entity.table, &filters, limit, offset.unwrap_or(0))
            .await?;
        Ok(rows.into_iter().map(|r| entity.project(r)).collect())
    }

    /// Fetch one row by primary key, projected.
    pub async fn read(store: &dyn EntityStore, entity: &ResolvedEntity, id: &str) -> Result<Value, AppError> {
        Self::ensure_allowed(entity, Operation::Read)?;
        let (pk, id) = pk_value(entity, id)?;
        let row = store
            .fetch_where_in(&entity.table, pk, &[id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} not found", entity.path_segment)))?;
        Ok(entity.project(row))
    }

    /// Run the create chain, then persist the table's columns from what remains of the body.
    /// Generated keys are never taken from the client.
    pub async fn create(store: &dyn EntityStore, entity: &ResolvedEntity, body: Value) -> Result<Value, AppError> {
        Self::ensure_allowed(entity, Operation::Create)?;
        let mut body = body_to_map(body)?;
        run_chain(&entity.path_segment, entity.preprocessors_for(Operation::Create), &mut body).await?;

        let row: Row = entity
            .table
            .columns
            .iter()
            .filter(|c| !(c.is_pk && c.has_default))
            .filter_map(|c| body.remove(&c.name).map(|v| (c.name.clone(), v)))
            .collect();
        let stored = store.insert(&entity.table, &row).await?;
        tracing::info!(entity = %entity.path_segment, "created");
        Ok(entity.project(stored))
    }

    /// Delete one row by primary key. Dependent association rows go with it.
    pub async fn delete(store: &dyn EntityStore, entity: &ResolvedEntity, id: &str) -> Result<(), AppError> {
        Self::ensure_allowed(entity, Operation::Delete)?;
        let (pk, id) = pk_value(entity, id)?;
        let deleted = store
            .delete_where(&entity.table, &[(pk.to_string(), id)])
            .await?;
        if deleted.is_empty() {
            return Err(AppError::NotFound(format!("{} not found", entity.path_segment)));
        }
        tracing::info!(entity = %entity.path_segment, "deleted");
        Ok(())
    }
}

pub(crate) fn parse_id(id_str: &str) -> Result<i64, AppError> {
    id_str
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id: {}", id_str)))
}

fn pk_value<'e>(entity: &'e ResolvedEntity, id_str: &str) -> Result<(&'e str, Value), AppError> {
    let pk = entity
        .table
        .pk_columns
        .first()
        .ok_or_else(|| AppError::Internal(format!("{} has no primary key", entity.path_segment)))?;
    Ok((pk.as_str(), Value::Number(parse_id(id_str)?.into())))
}

pub(crate) fn body_to_map(value: Value) -> Result<HashMap<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}
