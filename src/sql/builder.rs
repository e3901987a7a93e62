//! Builds parameterized INSERT, SELECT and DELETE from a resolved table.

use crate::config::ResolvedTable;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// Placeholder with the column's cast so text and integer binds land on the right type.
fn placeholder(table: &ResolvedTable, column: &str, param_num: u32) -> String {
    table
        .column(column)
        .map(|c| format!("${}::{}", param_num, c.pg_type))
        .unwrap_or_else(|| format!("${}", param_num))
}

/// SELECT list: each column as-is, except enum columns as col::text so sqlx returns String.
fn select_column_list(table: &ResolvedTable) -> String {
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if c.is_enum {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_by_pk(table: &ResolvedTable) -> String {
    table
        .pk_columns
        .iter()
        .map(|c| quoted(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(q: &mut QueryBuf, table: &ResolvedTable, filters: &[(String, Value)]) -> String {
    let mut parts = Vec::new();
    for (col, val) in filters {
        if table.column(col).is_none() {
            continue;
        }
        let n = q.push_param(val.clone());
        parts.push(format!("{} = {}", quoted(col), placeholder(table, col, n)));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT with optional filters (exact match per column), ORDER BY pk, LIMIT/OFFSET.
/// Filters on columns the table does not have are ignored.
pub fn select_list(table: &ResolvedTable, filters: &[(String, Value)], limit: u32, offset: u32) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(&mut q, table, filters);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        select_column_list(table),
        qualified_table(&table.schema_name, &table.table_name),
        where_clause,
        order_by_pk(table),
        limit.min(1000),
        offset
    );
    q
}

/// SELECT ... WHERE column IN ($1, $2, ...) ORDER BY pk. Used for batch-loading association ends.
pub fn select_by_column_in(table: &ResolvedTable, column_name: &str, values: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = qualified_table(&table.schema_name, &table.table_name);
    let cols = select_column_list(table);
    if values.is_empty() {
        q.sql = format!("SELECT {} FROM {} WHERE 1 = 0", cols, target);
        return q;
    }
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| {
            let n = q.push_param(v.clone());
            placeholder(table, column_name, n)
        })
        .collect();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({}) ORDER BY {}",
        cols,
        target,
        quoted(column_name),
        placeholders.join(", "),
        order_by_pk(table)
    );
    q
}

/// INSERT: columns and placeholders from the table; values from body.
/// Omits columns with a DB default when body does not provide a value (so DB uses default).
pub fn insert(table: &ResolvedTable, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &table.columns {
        let val = body.get(&c.name).cloned();
        if val.is_none() && c.has_default {
            continue;
        }
        let n = q.push_param(val.unwrap_or(Value::Null));
        cols.push(quoted(&c.name));
        placeholders.push(placeholder(table, &c.name, n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified_table(&table.schema_name, &table.table_name),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(table)
    );
    q
}

/// DELETE rows matching every filter. An empty filter list never matches.
pub fn delete_where(table: &ResolvedTable, filters: &[(String, Value)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = qualified_table(&table.schema_name, &table.table_name);
    let mut where_clause = where_clause(&mut q, table, filters);
    if where_clause.is_empty() {
        where_clause = " WHERE 1 = 0".into();
    }
    q.sql = format!(
        "DELETE FROM {}{} RETURNING {}",
        target,
        where_clause,
        select_column_list(table)
    );
    q
}
