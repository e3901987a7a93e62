//! Project relation handlers: role membership and keyword/language tag sets.
//! Only `projects` has relations; any other entity answers 404.

use crate::error::AppError;
use crate::membership::Role;
use crate::response::{success_created, success_many};
use crate::service::{parse_id, AssociationService, TagSet};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

enum Relation {
    Members,
    Role(Role),
    Tags(TagSet),
}

fn relation(path_segment: &str, relation: &str) -> Result<Relation, AppError> {
    let not_found = || AppError::NotFound(format!("unknown relation: {}/{}", path_segment, relation));
    if path_segment != "projects" {
        return Err(not_found());
    }
    match relation {
        "users" => Ok(Relation::Members),
        "owners" => Ok(Relation::Role(Role::Owner)),
        "contributers" => Ok(Relation::Role(Role::Contributer)),
        "designers" => Ok(Relation::Role(Role::Designer)),
        other => TagSet::from_segment(other).map(Relation::Tags).ok_or_else(not_found),
    }
}

pub async fn list_related(
    State(state): State<AppState>,
    Path((path_segment, id, rel)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let relation = relation(&path_segment, &rel)?;
    let project_id = parse_id(&id)?;
    let store = state.store.as_ref();
    Ok(match relation {
        Relation::Members => {
            let members = AssociationService::members(store, &state.model, project_id).await?;
            match params.get("role") {
                Some(role) => success_many(members.users_with_role(role)).into_response(),
                None => success_many(members.members).into_response(),
            }
        }
        Relation::Role(role) => {
            let members = AssociationService::members(store, &state.model, project_id).await?;
            success_many(members.users_with_role(role.as_str())).into_response()
        }
        Relation::Tags(set) => {
            let tags = AssociationService::tags(store, &state.model, set, project_id).await?;
            success_many(tags).into_response()
        }
    })
}

pub async fn add_related(
    State(state): State<AppState>,
    Path((path_segment, id, rel)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let relation = relation(&path_segment, &rel)?;
    let project_id = parse_id(&id)?;
    let store = state.store.as_ref();
    Ok(match relation {
        Relation::Members => {
            let member = AssociationService::assign(store, &state.model, project_id, &body).await?;
            success_created(member).into_response()
        }
        Relation::Tags(set) => {
            let tag = AssociationService::attach(store, &state.model, set, project_id, &body).await?;
            success_created(tag).into_response()
        }
        Relation::Role(_) => {
            return Err(AppError::MethodNotAllowed(format!(
                "{} is read-only; POST to /projects/{}/users",
                rel, id
            )))
        }
    })
}

pub async fn remove_related(
    State(state): State<AppState>,
    Path((path_segment, id, rel, related_id)): Path<(String, String, String, String)>,
) -> Result<StatusCode, AppError> {
    let relation = relation(&path_segment, &rel)?;
    let project_id = parse_id(&id)?;
    let related_id = parse_id(&related_id)?;
    let store = state.store.as_ref();
    match relation {
        Relation::Members => AssociationService::revoke(store, &state.model, project_id, related_id).await?,
        Relation::Tags(set) => AssociationService::detach(store, &state.model, set, project_id, related_id).await?,
        Relation::Role(_) => {
            return Err(AppError::MethodNotAllowed(format!("{} is read-only", rel)));
        }
    }
    Ok(StatusCode::NO_CONTENT)
}
