//! In-process store. Rows live in one map behind a mutex. Every write is checked in full
//! against the current rows before anything is mutated, so a failed write leaves nothing behind.

use crate::config::{ResolvedModel, ResolvedTable};
use crate::error::AppError;
use crate::store::coerce::{coerce, coerce_filters, coerce_values};
use crate::store::{EntityStore, Row};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
struct TableData {
    rows: Vec<Row>,
    last_serial: i64,
}

type Tables = HashMap<String, TableData>;

/// Rows scheduled for deletion, by table id.
type DeletePlan = HashMap<String, Vec<Row>>;

pub struct MemoryStore {
    schema: HashMap<String, ResolvedTable>,
    data: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new(model: &ResolvedModel) -> Self {
        let data = model
            .tables
            .keys()
            .map(|id| (id.clone(), TableData::default()))
            .collect();
        MemoryStore {
            schema: model.tables.clone(),
            data: Mutex::new(data),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.data
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }

    /// Build the stored row and the table's next serial without touching `tables`.
    fn prepare_insert(&self, tables: &Tables, table: &ResolvedTable, row: &Row) -> Result<(Row, i64), AppError> {
        let empty = TableData::default();
        let data = tables.get(&table.table_id).unwrap_or(&empty);
        let mut next_serial = data.last_serial;
        let mut stored = Row::new();
        for c in &table.columns {
            let value = match row.get(&c.name) {
                Some(v) => coerce(c, v)?,
                None if c.has_default => {
                    next_serial += 1;
                    Value::Number(next_serial.into())
                }
                None => Value::Null,
            };
            if value.is_null() && !c.nullable {
                return Err(AppError::Validation(format!(
                    "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                    c.name, table.table_name
                )));
            }
            stored.insert(c.name.clone(), value);
        }

        let mut unique_sets: Vec<(String, Vec<String>)> =
            vec![(format!("{}_pkey", table.table_name), table.pk_columns.clone())];
        for c in table.columns.iter().filter(|c| c.unique) {
            unique_sets.push((format!("{}_{}_key", table.table_name, c.name), vec![c.name.clone()]));
        }
        for set in &table.unique {
            unique_sets.push((format!("{}_{}_key", table.table_name, set.join("_")), set.clone()));
        }
        for (constraint, cols) in &unique_sets {
            if cols.iter().any(|c| stored.get(c).map(Value::is_null).unwrap_or(true)) {
                continue;
            }
            if data.rows.iter().any(|r| cols.iter().all(|c| r.get(c) == stored.get(c))) {
                return Err(AppError::Integrity(format!(
                    "duplicate key value violates unique constraint \"{}\"",
                    constraint
                )));
            }
        }

        for fk in &table.foreign_keys {
            let Some(value) = stored.get(&fk.column).filter(|v| !v.is_null()) else { continue };
            let referenced = tables
                .get(&fk.ref_table_id)
                .map(|d| d.rows.iter().any(|r| r.get(&fk.ref_column) == Some(value)))
                .unwrap_or(false);
            if !referenced {
                return Err(AppError::Integrity(format!(
                    "insert on table \"{}\" violates foreign key constraint: {}={} is not present in table \"{}\"",
                    table.table_name, fk.column, value, fk.ref_table_id
                )));
            }
        }
        Ok((stored, next_serial))
    }

    /// Collect the matching rows and everything that cascades from them. Fails on a
    /// non-cascading reference that would be left dangling.
    fn plan_delete(
        &self,
        tables: &Tables,
        table: &ResolvedTable,
        filters: &[(String, Value)],
        plan: &mut DeletePlan,
    ) -> Result<Vec<Row>, AppError> {
        let doomed: Vec<Row> = tables
            .get(&table.table_id)
            .map(|d| {
                d.rows
                    .iter()
                    .filter(|r| matches(r, filters) && !planned(plan, &table.table_id, r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if doomed.is_empty() {
            return Ok(doomed);
        }
        plan.entry(table.table_id.clone()).or_default().extend(doomed.iter().cloned());

        for referencing in self.schema.values() {
            for fk in referencing.foreign_keys.iter().filter(|fk| fk.ref_table_id == table.table_id) {
                for row in &doomed {
                    let Some(value) = row.get(&fk.ref_column).cloned() else { continue };
                    let dependent = vec![(fk.column.clone(), value)];
                    if fk.cascade {
                        self.plan_delete(tables, referencing, &dependent, plan)?;
                    } else if tables
                        .get(&referencing.table_id)
                        .map(|d| {
                            d.rows
                                .iter()
                                .any(|r| matches(r, &dependent) && !planned(plan, &referencing.table_id, r))
                        })
                        .unwrap_or(false)
                    {
                        return Err(AppError::Integrity(format!(
                            "delete on table \"{}\" violates foreign key constraint on table \"{}\"",
                            table.table_name, referencing.table_name
                        )));
                    }
                }
            }
        }
        Ok(doomed)
    }
}

fn planned(plan: &DeletePlan, table_id: &str, row: &Row) -> bool {
    plan.get(table_id).map(|rows| rows.contains(row)).unwrap_or(false)
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list(
        &self,
        table: &ResolvedTable,
        filters: &[(String, Value)],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Row>, AppError> {
        let filters = coerce_filters(table, filters)?;
        let guard = self.lock()?;
        let mut rows: Vec<Row> = guard
            .get(&table.table_id)
            .map(|d| d.rows.iter().filter(|r| matches(r, &filters)).cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| compare_keys(a, b, &table.pk_columns));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit.min(1000) as usize)
            .collect())
    }

    async fn fetch_where_in(&self, table: &ResolvedTable, column: &str, values: &[Value]) -> Result<Vec<Row>, AppError> {
        let values = coerce_values(table, column, values)?;
        let guard = self.lock()?;
        let mut rows: Vec<Row> = guard
            .get(&table.table_id)
            .map(|d| {
                d.rows
                    .iter()
                    .filter(|r| r.get(column).map(|v| !v.is_null() && values.contains(v)).unwrap_or(false))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| compare_keys(a, b, &table.pk_columns));
        Ok(rows)
    }

    async fn insert(&self, table: &ResolvedTable, row: &Row) -> Result<Row, AppError> {
        let mut guard = self.lock()?;
        let (stored, next_serial) = self.prepare_insert(&guard, table, row)?;
        let entry = guard.entry(table.table_id.clone()).or_default();
        entry.last_serial = next_serial;
        entry.rows.push(stored.clone());
        Ok(stored)
    }

    async fn delete_where(&self, table: &ResolvedTable, filters: &[(String, Value)]) -> Result<Vec<Row>, AppError> {
        let filters = coerce_filters(table, filters)?;
        if filters.is_empty() {
            return Ok(Vec::new());
        }
        let mut guard = self.lock()?;
        let mut plan = DeletePlan::new();
        let deleted = self.plan_delete(&guard, table, &filters, &mut plan)?;
        for (table_id, doomed) in &plan {
            if let Some(data) = guard.get_mut(table_id) {
                data.rows.retain(|r| !doomed.contains(r));
            }
        }
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }
}

/// SQL equality: a NULL on either side never matches.
fn matches(row: &Row, filters: &[(String, Value)]) -> bool {
    filters
        .iter()
        .all(|(col, v)| !v.is_null() && row.get(col) == Some(v))
}

fn compare_keys(a: &Row, b: &Row, pk: &[String]) -> Ordering {
    for col in pk {
        let ord = compare_values(a.get(col), b.get(col));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_i64()
            .unwrap_or_default()
            .cmp(&y.as_i64().unwrap_or_default()),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{directory_config, resolve, KEYWORDS, PROJECTS, PROJECT_KEYWORDS, PROJECT_USERS, USERS};
    use serde_json::json;

    fn setup() -> (ResolvedModel, MemoryStore) {
        let model = resolve(&directory_config("directory")).unwrap();
        let store = MemoryStore::new(&model);
        (model, store)
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn assigns_serial_ids_and_orders_by_key() {
        let (model, store) = setup();
        let keywords = model.table(KEYWORDS).unwrap();
        let a = store.insert(keywords, &row(json!({"label": "rust"}))).await.unwrap();
        let b = store.insert(keywords, &row(json!({"label": "web"}))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        let listed = store.list(keywords, &[], 100, 0).await.unwrap();
        assert_eq!(listed, vec![a, b.clone()]);
        assert_eq!(store.list(keywords, &[], 100, 1).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn rejects_duplicate_username() {
        let (model, store) = setup();
        let users = model.table(USERS).unwrap();
        let user = row(json!({"username": "ganemone", "password": "h"}));
        store.insert(users, &user).await.unwrap();
        let err = store.insert(users, &user).await.unwrap_err();
        assert!(matches!(err, AppError::Integrity(_)));
        assert_eq!(store.list(users, &[], 100, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn composite_key_allows_one_role_per_pair() {
        let (model, store) = setup();
        let users = model.table(USERS).unwrap();
        let projects = model.table(PROJECTS).unwrap();
        let pu = model.table(PROJECT_USERS).unwrap();
        store.insert(users, &row(json!({"username": "ganemone", "password": "h"}))).await.unwrap();
        store.insert(projects, &row(json!({"name": "X"}))).await.unwrap();
        store
            .insert(pu, &row(json!({"user_id": 1, "project_id": 1, "role": "owner"})))
            .await
            .unwrap();
        let err = store
            .insert(pu, &row(json!({"user_id": 1, "project_id": 1, "role": "designer"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Integrity(msg) if msg.contains("project_users_pkey")));
    }

    #[tokio::test]
    async fn foreign_keys_must_resolve() {
        let (model, store) = setup();
        let pu = model.table(PROJECT_USERS).unwrap();
        let err = store
            .insert(pu, &row(json!({"user_id": 9, "project_id": 9, "role": "owner"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Integrity(_)));
    }

    #[tokio::test]
    async fn enum_and_length_checks_match_column_types() {
        let (model, store) = setup();
        let projects = model.table(PROJECTS).unwrap();
        let err = store.insert(projects, &row(json!({"type": "svn"}))).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let long = "x".repeat(257);
        let err = store.insert(projects, &row(json!({"source": long}))).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(store.list(projects, &[], 100, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_project_cascades_to_associations() {
        let (model, store) = setup();
        let projects = model.table(PROJECTS).unwrap();
        let keywords = model.table(KEYWORDS).unwrap();
        let pk = model.table(PROJECT_KEYWORDS).unwrap();
        store.insert(projects, &row(json!({"name": "X"}))).await.unwrap();
        store.insert(keywords, &row(json!({"label": "rust"}))).await.unwrap();
        store
            .insert(pk, &row(json!({"project_id": 1, "keyword_id": 1})))
            .await
            .unwrap();

        let deleted = store.delete_where(projects, &[("id".into(), json!("1"))]).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(store.list(pk, &[], 100, 0).await.unwrap().is_empty());
        assert_eq!(store.list(keywords, &[], 100, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn string_filters_are_coerced_for_integer_columns() {
        let (model, store) = setup();
        let keywords = model.table(KEYWORDS).unwrap();
        store.insert(keywords, &row(json!({"label": "rust"}))).await.unwrap();
        let found = store.list(keywords, &[("id".into(), json!("1"))], 100, 0).await.unwrap();
        assert_eq!(found.len(), 1);
        let err = store.list(keywords, &[("id".into(), json!("one"))], 100, 0).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn cascade_spans_tables_and_spares_other_projects() {
        let (model, store) = setup();
        let users = model.table(USERS).unwrap();
        let projects = model.table(PROJECTS).unwrap();
        let keywords = model.table(KEYWORDS).unwrap();
        let pk = model.table(PROJECT_KEYWORDS).unwrap();
        let pu = model.table(PROJECT_USERS).unwrap();
        store.insert(users, &row(json!({"username": "ganemone", "password": "h"}))).await.unwrap();
        store.insert(keywords, &row(json!({"label": "rust"}))).await.unwrap();
        for name in ["X", "Y"] {
            store.insert(projects, &row(json!({"name": name}))).await.unwrap();
        }
        for project_id in [1, 2] {
            store
                .insert(pk, &row(json!({"project_id": project_id, "keyword_id": 1})))
                .await
                .unwrap();
            store
                .insert(pu, &row(json!({"user_id": 1, "project_id": project_id, "role": "owner"})))
                .await
                .unwrap();
        }

        store.delete_where(projects, &[("id".into(), json!(1))]).await.unwrap();
        let remaining_links = store.list(pk, &[], 100, 0).await.unwrap();
        assert_eq!(remaining_links.len(), 1);
        assert_eq!(remaining_links[0]["project_id"], json!(2));
        let remaining_members = store.list(pu, &[], 100, 0).await.unwrap();
        assert_eq!(remaining_members.len(), 1);
        assert_eq!(remaining_members[0]["project_id"], json!(2));

        store.delete_where(users, &[("id".into(), json!(1))]).await.unwrap();
        assert!(store.list(pu, &[], 100, 0).await.unwrap().is_empty());
        assert_eq!(store.list(pk, &[], 100, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_insert_leaves_serial_and_rows_untouched() {
        let (model, store) = setup();
        let keywords = model.table(KEYWORDS).unwrap();
        let err = store.insert(keywords, &row(json!({"label": {"a": 1}}))).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let ok = store.insert(keywords, &row(json!({"label": "rust"}))).await.unwrap();
        assert_eq!(ok["id"], json!(1));
        assert_eq!(store.list(keywords, &[], 100, 0).await.unwrap().len(), 1);
    }
}
