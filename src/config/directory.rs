//! The project directory: tables, association tables, and the per-entity exposure routing table.

use crate::config::types::*;
use std::collections::HashMap;

pub const USERS: &str = "users";
pub const KEYWORDS: &str = "keywords";
pub const LANGUAGES: &str = "languages";
pub const PROJECTS: &str = "projects";
pub const PROJECT_KEYWORDS: &str = "project_keywords";
pub const PROJECT_LANGUAGES: &str = "project_languages";
pub const PROJECT_USERS: &str = "project_users";

pub const PROJECT_TYPE_ENUM: &str = "project_type";
pub const PROJECT_ROLE_ENUM: &str = "project_role";

/// Full declarative config for the directory, with every table placed in `schema_name`.
pub fn directory_config(schema_name: &str) -> FullConfig {
    let enums = vec![
        EnumConfig {
            id: PROJECT_TYPE_ENUM.into(),
            name: PROJECT_TYPE_ENUM.into(),
            values: vec!["bitbucket".into(), "git".into()],
        },
        EnumConfig {
            id: PROJECT_ROLE_ENUM.into(),
            name: PROJECT_ROLE_ENUM.into(),
            values: vec!["owner".into(), "contributer".into(), "designer".into()],
        },
    ];

    let tables = vec![
        table(USERS, PrimaryKeyConfig::Single("id".into()), vec![]),
        table(KEYWORDS, PrimaryKeyConfig::Single("id".into()), vec![]),
        table(LANGUAGES, PrimaryKeyConfig::Single("id".into()), vec![]),
        table(PROJECTS, PrimaryKeyConfig::Single("id".into()), vec![]),
        table(
            PROJECT_KEYWORDS,
            PrimaryKeyConfig::Single("id".into()),
            vec![vec!["project_id".into(), "keyword_id".into()]],
        ),
        table(
            PROJECT_LANGUAGES,
            PrimaryKeyConfig::Single("id".into()),
            vec![vec!["project_id".into(), "language_id".into()]],
        ),
        table(
            PROJECT_USERS,
            PrimaryKeyConfig::Composite(vec!["user_id".into(), "project_id".into()]),
            vec![],
        ),
    ];

    let columns = vec![
        column(USERS, "id", ColumnTypeConfig::Serial, false),
        ColumnConfig {
            unique: true,
            ..column(USERS, "username", ColumnTypeConfig::Varchar(25), false)
        },
        column(USERS, "password", ColumnTypeConfig::Text, false),
        column(USERS, "email", ColumnTypeConfig::Varchar(35), true),
        column(KEYWORDS, "id", ColumnTypeConfig::Serial, false),
        column(KEYWORDS, "label", ColumnTypeConfig::Text, true),
        column(LANGUAGES, "id", ColumnTypeConfig::Serial, false),
        column(LANGUAGES, "label", ColumnTypeConfig::Text, true),
        column(PROJECTS, "id", ColumnTypeConfig::Serial, false),
        column(PROJECTS, "name", ColumnTypeConfig::Text, true),
        column(PROJECTS, "description", ColumnTypeConfig::Text, true),
        column(PROJECTS, "source", ColumnTypeConfig::Varchar(256), true),
        column(PROJECTS, "type", ColumnTypeConfig::Enum(PROJECT_TYPE_ENUM.into()), true),
        column(PROJECT_KEYWORDS, "id", ColumnTypeConfig::Serial, false),
        column(PROJECT_KEYWORDS, "keyword_id", ColumnTypeConfig::Integer, false),
        column(PROJECT_KEYWORDS, "project_id", ColumnTypeConfig::Integer, false),
        column(PROJECT_LANGUAGES, "id", ColumnTypeConfig::Serial, false),
        column(PROJECT_LANGUAGES, "language_id", ColumnTypeConfig::Integer, false),
        column(PROJECT_LANGUAGES, "project_id", ColumnTypeConfig::Integer, false),
        column(PROJECT_USERS, "user_id", ColumnTypeConfig::Integer, false),
        column(PROJECT_USERS, "project_id", ColumnTypeConfig::Integer, false),
        column(PROJECT_USERS, "role", ColumnTypeConfig::Enum(PROJECT_ROLE_ENUM.into()), false),
    ];

    let relationships = vec![
        foreign_key(PROJECT_KEYWORDS, "keyword_id", KEYWORDS),
        foreign_key(PROJECT_KEYWORDS, "project_id", PROJECTS),
        foreign_key(PROJECT_LANGUAGES, "language_id", LANGUAGES),
        foreign_key(PROJECT_LANGUAGES, "project_id", PROJECTS),
        foreign_key(PROJECT_USERS, "user_id", USERS),
        foreign_key(PROJECT_USERS, "project_id", PROJECTS),
    ];

    FullConfig {
        schema_name: schema_name.to_string(),
        enums,
        tables,
        columns,
        relationships,
        api_entities: exposure_policy(),
    }
}

/// Registration form: username 4..=25, password 6..=35 matching `confirm`, email 6..=35 when given.
pub fn registration_form() -> FormSchema {
    FormSchema {
        name: "registration".into(),
        fields: vec![
            (
                "username".into(),
                ValidationRule {
                    required: true,
                    min_length: Some(4),
                    max_length: Some(25),
                    equal_to: None,
                },
            ),
            (
                "password".into(),
                ValidationRule {
                    required: true,
                    min_length: Some(6),
                    max_length: Some(35),
                    equal_to: Some("confirm".into()),
                },
            ),
            (
                "email".into(),
                ValidationRule {
                    required: false,
                    min_length: Some(6),
                    max_length: Some(35),
                    equal_to: None,
                },
            ),
        ],
    }
}

/// The routing table: allowed operations, create pipeline, and output columns per entity.
pub fn exposure_policy() -> Vec<ApiEntityConfig> {
    let read_create_delete = vec![Operation::Read, Operation::Create, Operation::Delete];

    let mut user_preprocessors = HashMap::new();
    user_preprocessors.insert(
        Operation::Create,
        vec![
            Preprocessor::Validate(registration_form()),
            Preprocessor::RemoveFields(vec!["confirm".into()]),
            Preprocessor::HashPassword { field: "password".into() },
        ],
    );

    vec![
        ApiEntityConfig {
            entity_id: USERS.into(),
            path_segment: "users".into(),
            operations: read_create_delete.clone(),
            preprocessors: user_preprocessors,
            include_columns: None,
            sensitive_columns: vec!["password".into()],
        },
        ApiEntityConfig {
            entity_id: KEYWORDS.into(),
            path_segment: "keywords".into(),
            operations: read_create_delete.clone(),
            preprocessors: HashMap::new(),
            include_columns: None,
            sensitive_columns: vec![],
        },
        ApiEntityConfig {
            entity_id: LANGUAGES.into(),
            path_segment: "languages".into(),
            operations: read_create_delete.clone(),
            preprocessors: HashMap::new(),
            include_columns: None,
            sensitive_columns: vec![],
        },
        ApiEntityConfig {
            entity_id: PROJECTS.into(),
            path_segment: "projects".into(),
            operations: read_create_delete,
            preprocessors: HashMap::new(),
            include_columns: Some(vec![
                "id".into(),
                "description".into(),
                "source".into(),
                "type".into(),
            ]),
            sensitive_columns: vec![],
        },
    ]
}

fn table(id: &str, primary_key: PrimaryKeyConfig, unique: Vec<Vec<String>>) -> TableConfig {
    TableConfig {
        id: id.into(),
        name: id.into(),
        primary_key,
        unique,
    }
}

fn column(table_id: &str, name: &str, type_: ColumnTypeConfig, nullable: bool) -> ColumnConfig {
    ColumnConfig {
        id: format!("{}.{}", table_id, name),
        table_id: table_id.into(),
        name: name.into(),
        type_,
        nullable,
        unique: false,
    }
}

/// FK from `from_table.from_column` to `to_table.id`, cascading deletes into the association row.
fn foreign_key(from_table: &str, from_column: &str, to_table: &str) -> RelationshipConfig {
    RelationshipConfig {
        id: format!("{}_{}_fkey", from_table, from_column),
        from_table_id: from_table.into(),
        from_column_id: format!("{}.{}", from_table, from_column),
        to_table_id: to_table.into(),
        to_column_id: format!("{}.id", to_table),
        on_delete: Some("CASCADE".into()),
    }
}
