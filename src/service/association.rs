//! Project association tables: role membership (`project_users`) and the keyword/language tag sets.

use crate::config::{ResolvedEntity, ResolvedModel, ResolvedTable, PROJECTS, PROJECT_KEYWORDS, PROJECT_LANGUAGES, PROJECT_USERS, USERS};
use crate::error::AppError;
use crate::membership::{Member, ProjectMembers, Role, User};
use crate::store::{EntityStore, Row};
use serde_json::{json, Value};

/// Many-to-many tag sets hanging off a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagSet {
    Keywords,
    Languages,
}

impl TagSet {
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "keywords" => Some(TagSet::Keywords),
            "languages" => Some(TagSet::Languages),
            _ => None,
        }
    }

    fn link_table(&self) -> &'static str {
        match self {
            TagSet::Keywords => PROJECT_KEYWORDS,
            TagSet::Languages => PROJECT_LANGUAGES,
        }
    }

    fn tag_path(&self) -> &'static str {
        match self {
            TagSet::Keywords => "keywords",
            TagSet::Languages => "languages",
        }
    }

    /// Column in the link table referencing the tag.
    pub fn column(&self) -> &'static str {
        match self {
            TagSet::Keywords => "keyword_id",
            TagSet::Languages => "language_id",
        }
    }
}

fn table<'m>(model: &'m ResolvedModel, id: &str) -> Result<&'m ResolvedTable, AppError> {
    model
        .table(id)
        .ok_or_else(|| AppError::Internal(format!("table {} not in model", id)))
}

fn entity<'m>(model: &'m ResolvedModel, path: &str) -> Result<&'m ResolvedEntity, AppError> {
    model
        .entity_by_path(path)
        .ok_or_else(|| AppError::Internal(format!("entity {} not in model", path)))
}

/// Integer field from a request body; numeric strings are accepted.
fn int_field(body: &Value, field: &str) -> Result<i64, AppError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(AppError::Validation(format!("{} is required", field))),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| AppError::Validation(format!("{} must be an integer", field))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("{} must be an integer", field))),
        Some(_) => Err(AppError::Validation(format!("{} must be an integer", field))),
    }
}

fn to_user(row: Row) -> Result<User, AppError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| AppError::Internal(format!("user row: {}", e)))
}

pub struct AssociationService;

impl AssociationService {
    async fn ensure_project(store: &dyn EntityStore, model: &ResolvedModel, project_id: i64) -> Result<(), AppError> {
        let found = store
            .fetch_where_in(table(model, PROJECTS)?, "id", &[json!(project_id)])
            .await?;
        if found.is_empty() {
            return Err(AppError::NotFound(format!("project {} not found", project_id)));
        }
        Ok(())
    }

    /// Resolve the project's members through `project_users`, in user id order.
    pub async fn members(store: &dyn EntityStore, model: &ResolvedModel, project_id: i64) -> Result<ProjectMembers, AppError> {
        Self::ensure_project(store, model, project_id).await?;
        let links = store
            .fetch_where_in(table(model, PROJECT_USERS)?, "project_id", &[json!(project_id)])
            .await?;
        let user_ids: Vec<Value> = links.iter().filter_map(|l| l.get("user_id").cloned()).collect();
        let users = store.fetch_where_in(table(model, USERS)?, "id", &user_ids).await?;

        let mut members = Vec::with_capacity(users.len());
        for row in users {
            let user = to_user(row)?;
            let role = links
                .iter()
                .find(|l| l.get("user_id").and_then(Value::as_i64) == Some(user.id))
                .and_then(|l| l.get("role").and_then(Value::as_str))
                .map(str::parse::<Role>);
            match role {
                Some(Ok(role)) => members.push(Member { user, role }),
                _ => tracing::warn!(project_id, user_id = user.id, "skipping membership with unrecognized role"),
            }
        }
        Ok(ProjectMembers { project_id, members })
    }

    /// Grant `{user_id, role}` on the project. One role per (user, project) pair.
    pub async fn assign(store: &dyn EntityStore, model: &ResolvedModel, project_id: i64, body: &Value) -> Result<Member, AppError> {
        let user_id = int_field(body, "user_id")?;
        let role: Role = body
            .get("role")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Validation("role is required".into()))?
            .parse()?;

        let mut row = Row::new();
        row.insert("user_id".into(), json!(user_id));
        row.insert("project_id".into(), json!(project_id));
        row.insert("role".into(), json!(role.as_str()));
        store.insert(table(model, PROJECT_USERS)?, &row).await?;
        tracing::info!(project_id, user_id, role = %role, "membership granted");

        let user = store
            .fetch_where_in(table(model, USERS)?, "id", &[json!(user_id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))?;
        Ok(Member { user: to_user(user)?, role })
    }

    pub async fn revoke(store: &dyn EntityStore, model: &ResolvedModel, project_id: i64, user_id: i64) -> Result<(), AppError> {
        let filters = [
            ("user_id".to_string(), json!(user_id)),
            ("project_id".to_string(), json!(project_id)),
        ];
        let deleted = store.delete_where(table(model, PROJECT_USERS)?, &filters).await?;
        if deleted.is_empty() {
            return Err(AppError::NotFound(format!("user {} is not a member of project {}", user_id, project_id)));
        }
        tracing::info!(project_id, user_id, "membership revoked");
        Ok(())
    }

    /// Tags attached to the project, projected through the tag entity's policy.
    pub async fn tags(store: &dyn EntityStore, model: &ResolvedModel, set: TagSet, project_id: i64) -> Result<Vec<Value>, AppError> {
        Self::ensure_project(store, model, project_id).await?;
        let links = store
            .fetch_where_in(table(model, set.link_table())?, "project_id", &[json!(project_id)])
            .await?;
        let ids: Vec<Value> = links.iter().filter_map(|l| l.get(set.column()).cloned()).collect();
        let tag_entity = entity(model, set.tag_path())?;
        let rows = store.fetch_where_in(&tag_entity.table, "id", &ids).await?;
        Ok(rows.into_iter().map(|r| tag_entity.project(r)).collect())
    }

    /// Attach `{keyword_id}` / `{language_id}` to the project; returns the attached tag.
    pub async fn attach(store: &dyn EntityStore, model: &ResolvedModel, set: TagSet, project_id: i64, body: &Value) -> Result<Value, AppError> {
        let tag_id = int_field(body, set.column())?;
        let mut row = Row::new();
        row.insert("project_id".into(), json!(project_id));
        row.insert(set.column().into(), json!(tag_id));
        store.insert(table(model, set.link_table())?, &row).await?;
        tracing::info!(project_id, tag_id, tags = set.tag_path(), "tag attached");

        let tag_entity = entity(model, set.tag_path())?;
        let tag = store
            .fetch_where_in(&tag_entity.table, "id", &[json!(tag_id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", set.tag_path(), tag_id)))?;
        Ok(tag_entity.project(tag))
    }

    pub async fn detach(store: &dyn EntityStore, model: &ResolvedModel, set: TagSet, project_id: i64, tag_id: i64) -> Result<(), AppError> {
        let filters = [
            ("project_id".to_string(), json!(project_id)),
            (set.column().to_string(), json!(tag_id)),
        ];
        let deleted = store.delete_where(table(model, set.link_table())?, &filters).await?;
        if deleted.is_empty() {
            return Err(AppError::NotFound(format!(
                "{} {} is not attached to project {}",
                set.tag_path(),
                tag_id,
                project_id
            )));
        }
        tracing::info!(project_id, tag_id, tags = set.tag_path(), "tag detached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{directory_config, resolve};
    use crate::service::CrudService;
    use crate::store::MemoryStore;

    async fn setup() -> (ResolvedModel, MemoryStore) {
        let model = resolve(&directory_config("directory")).unwrap();
        let store = MemoryStore::new(&model);
        let users = model.entity_by_path("users").unwrap();
        for name in ["ganemone", "alice", "bobby"] {
            CrudService::create(
                &store,
                users,
                json!({"username": name, "password": "secret1", "confirm": "secret1"}),
            )
            .await
            .unwrap();
        }
        let projects = model.entity_by_path("projects").unwrap();
        CrudService::create(&store, projects, json!({"name": "X", "type": "git"})).await.unwrap();
        (model, store)
    }

    #[tokio::test]
    async fn members_are_partitioned_by_role() {
        let (model, store) = setup().await;
        AssociationService::assign(&store, &model, 1, &json!({"user_id": 1, "role": "owner"})).await.unwrap();
        AssociationService::assign(&store, &model, 1, &json!({"user_id": 2, "role": "contributer"})).await.unwrap();
        AssociationService::assign(&store, &model, 1, &json!({"user_id": "3", "role": "designer"})).await.unwrap();

        let members = AssociationService::members(&store, &model, 1).await.unwrap();
        assert_eq!(members.members.len(), 3);
        assert_eq!(members.owners()[0].username, "ganemone");
        assert_eq!(members.contributers()[0].username, "alice");
        assert_eq!(members.designers()[0].username, "bobby");
        assert!(members.users_with_role("admin").is_empty());
    }

    #[tokio::test]
    async fn one_role_per_pair() {
        let (model, store) = setup().await;
        AssociationService::assign(&store, &model, 1, &json!({"user_id": 1, "role": "owner"})).await.unwrap();
        let err = AssociationService::assign(&store, &model, 1, &json!({"user_id": 1, "role": "designer"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Integrity(_)));
        let members = AssociationService::members(&store, &model, 1).await.unwrap();
        assert_eq!(members.role_of(1), Some(Role::Owner));
    }

    #[tokio::test]
    async fn assign_rejects_bad_input() {
        let (model, store) = setup().await;
        let unknown_role = AssociationService::assign(&store, &model, 1, &json!({"user_id": 1, "role": "admin"})).await;
        assert!(matches!(unknown_role, Err(AppError::Validation(_))));
        let no_user = AssociationService::assign(&store, &model, 1, &json!({"role": "owner"})).await;
        assert!(matches!(no_user, Err(AppError::Validation(_))));
        let missing_user = AssociationService::assign(&store, &model, 1, &json!({"user_id": 99, "role": "owner"})).await;
        assert!(matches!(missing_user, Err(AppError::Integrity(_))));
        let missing_project = AssociationService::assign(&store, &model, 9, &json!({"user_id": 1, "role": "owner"})).await;
        assert!(matches!(missing_project, Err(AppError::Integrity(_))));
    }

    #[tokio::test]
    async fn revoke_removes_only_that_pair() {
        let (model, store) = setup().await;
        AssociationService::assign(&store, &model, 1, &json!({"user_id": 1, "role": "owner"})).await.unwrap();
        AssociationService::assign(&store, &model, 1, &json!({"user_id": 2, "role": "owner"})).await.unwrap();
        AssociationService::revoke(&store, &model, 1, 1).await.unwrap();
        let members = AssociationService::members(&store, &model, 1).await.unwrap();
        assert_eq!(members.owners().len(), 1);
        assert!(matches!(
            AssociationService::revoke(&store, &model, 1, 1).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn members_of_missing_project_is_not_found() {
        let (model, store) = setup().await;
        assert!(matches!(
            AssociationService::members(&store, &model, 42).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn tags_attach_list_detach() {
        let (model, store) = setup().await;
        let keywords = model.entity_by_path("keywords").unwrap();
        CrudService::create(&store, keywords, json!({"label": "rust"})).await.unwrap();
        CrudService::create(&store, keywords, json!({"label": "web"})).await.unwrap();

        let attached = AssociationService::attach(&store, &model, TagSet::Keywords, 1, &json!({"keyword_id": 2}))
            .await
            .unwrap();
        assert_eq!(attached, json!({"id": 2, "label": "web"}));
        let dup = AssociationService::attach(&store, &model, TagSet::Keywords, 1, &json!({"keyword_id": 2})).await;
        assert!(matches!(dup, Err(AppError::Integrity(_))));

        let tags = AssociationService::tags(&store, &model, TagSet::Keywords, 1).await.unwrap();
        assert_eq!(tags, vec![json!({"id": 2, "label": "web"})]);
        assert!(AssociationService::tags(&store, &model, TagSet::Languages, 1).await.unwrap().is_empty());

        AssociationService::detach(&store, &model, TagSet::Keywords, 1, 2).await.unwrap();
        assert!(AssociationService::tags(&store, &model, TagSet::Keywords, 1).await.unwrap().is_empty());
        assert!(matches!(
            AssociationService::detach(&store, &model, TagSet::Keywords, 1, 2).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deleting_a_user_drops_their_memberships() {
        let (model, store) = setup().await;
        AssociationService::assign(&store, &model, 1, &json!({"user_id": 1, "role": "owner"})).await.unwrap();
        let users = model.entity_by_path("users").unwrap();
        CrudService::delete(&store, users, "1").await.unwrap();
        let members = AssociationService::members(&store, &model, 1).await.unwrap();
        assert!(members.members.is_empty());
    }
}
