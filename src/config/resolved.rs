//! Resolved model: config validated and flattened for runtime use.

use crate::config::{Operation, Preprocessor};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// How values for a column are coerced and bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    /// PostgreSQL type used for parameter casts (e.g. `int4`, `"directory"."project_type"`).
    pub pg_type: String,
    /// Enum-typed column; selected as `::text`.
    pub is_enum: bool,
    pub is_pk: bool,
    pub nullable: bool,
    /// Whether the column has a DB default (serial).
    pub has_default: bool,
    pub unique: bool,
    pub max_length: Option<u32>,
    /// Enum labels, when the column is enum-typed.
    pub allowed: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table_id: String,
    pub ref_column: String,
    pub cascade: bool,
}

#[derive(Clone, Debug)]
pub struct ResolvedTable {
    pub table_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub pk_columns: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub unique: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl ResolvedTable {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub table: ResolvedTable,
    pub path_segment: String,
    pub operations: Vec<Operation>,
    pub preprocessors: HashMap<Operation, Vec<Preprocessor>>,
    /// Output allow-list; `None` means every column not listed as sensitive.
    pub include_columns: Option<Vec<String>>,
    /// Column names to strip from all API responses.
    pub sensitive_columns: HashSet<String>,
}

impl ResolvedEntity {
    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    pub fn preprocessors_for(&self, op: Operation) -> &[Preprocessor] {
        self.preprocessors.get(&op).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_exposed(&self, column: &str) -> bool {
        if self.sensitive_columns.contains(column) {
            return false;
        }
        match &self.include_columns {
            Some(include) => include.iter().any(|c| c == column),
            None => self.table.column(column).is_some(),
        }
    }

    /// Apply the output allow-list to a stored row.
    pub fn project(&self, row: Map<String, Value>) -> Value {
        Value::Object(row.into_iter().filter(|(k, _)| self.is_exposed(k)).collect())
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub tables: HashMap<String, ResolvedTable>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }

    pub fn table(&self, table_id: &str) -> Option<&ResolvedTable> {
        self.tables.get(table_id)
    }
}
