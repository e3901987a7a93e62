//! Declarative schema and exposure records. The directory's concrete values live in `directory.rs`.

use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug)]
pub struct EnumConfig {
    pub id: String,
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Clone, Debug)]
pub enum PrimaryKeyConfig {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKeyConfig {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKeyConfig::Single(s) => vec![s.as_str()],
            PrimaryKeyConfig::Composite(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TableConfig {
    pub id: String,
    pub name: String,
    pub primary_key: PrimaryKeyConfig,
    /// Multi-column unique constraints.
    pub unique: Vec<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnTypeConfig {
    /// Auto-incrementing integer; always has a default.
    Serial,
    Integer,
    Text,
    Varchar(u32),
    /// Reference to an `EnumConfig` by id.
    Enum(String),
}

#[derive(Clone, Debug)]
pub struct ColumnConfig {
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub type_: ColumnTypeConfig,
    pub nullable: bool,
    pub unique: bool,
}

/// Foreign key from one column to another. Association tables are built from two of these.
#[derive(Clone, Debug)]
pub struct RelationshipConfig {
    pub id: String,
    pub from_table_id: String,
    pub from_column_id: String,
    pub to_table_id: String,
    pub to_column_id: String,
    /// `CASCADE` or `NO ACTION` (default).
    pub on_delete: Option<String>,
}

/// Operations an entity may expose. No update operation exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationRule {
    pub required: bool,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    /// Name of another payload field this one must equal.
    pub equal_to: Option<String>,
}

/// Named set of field rules checked against a request payload. Fields are checked in order.
#[derive(Clone, Debug, PartialEq)]
pub struct FormSchema {
    pub name: String,
    pub fields: Vec<(String, ValidationRule)>,
}

/// One step of a create pipeline. Steps run in declared order; the first failure aborts the request.
#[derive(Clone, Debug, PartialEq)]
pub enum Preprocessor {
    /// Reject the payload unless it satisfies the form.
    Validate(FormSchema),
    /// Drop payload keys that must never reach storage.
    RemoveFields(Vec<String>),
    /// Replace the plaintext in `field` with an Argon2 PHC string.
    HashPassword { field: String },
}

impl Preprocessor {
    pub fn name(&self) -> String {
        match self {
            Preprocessor::Validate(form) => format!("validate({})", form.name),
            Preprocessor::RemoveFields(fields) => format!("remove({})", fields.join(",")),
            Preprocessor::HashPassword { field } => format!("hash({})", field),
        }
    }
}

/// Per-entity exposure record: one row of the routing table.
#[derive(Clone, Debug)]
pub struct ApiEntityConfig {
    pub entity_id: String,
    pub path_segment: String,
    pub operations: Vec<Operation>,
    pub preprocessors: HashMap<Operation, Vec<Preprocessor>>,
    /// Output allow-list. `None` exposes every non-sensitive column.
    pub include_columns: Option<Vec<String>>,
    /// Column names that must never be exposed in API responses.
    pub sensitive_columns: Vec<String>,
}

/// Everything needed to migrate the database and build the runtime model.
#[derive(Clone, Debug, Default)]
pub struct FullConfig {
    /// PostgreSQL schema holding every table and enum type.
    pub schema_name: String,
    pub enums: Vec<EnumConfig>,
    pub tables: Vec<TableConfig>,
    pub columns: Vec<ColumnConfig>,
    pub relationships: Vec<RelationshipConfig>,
    pub api_entities: Vec<ApiEntityConfig>,
}

impl FullConfig {
    pub fn columns_of<'a>(&'a self, table_id: &'a str) -> impl Iterator<Item = &'a ColumnConfig> + 'a {
        self.columns.iter().filter(move |c| c.table_id == table_id)
    }
}
