//! Config validation: referential integrity and API consistency.

use crate::config::{ColumnTypeConfig, FullConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.schema_name.is_empty() {
        return Err(ConfigError::Validation("schema name must not be empty".into()));
    }
    let enum_ids: HashSet<&str> = config.enums.iter().map(|e| e.id.as_str()).collect();
    let table_ids: HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();
    let column_ids: HashSet<&str> = config.columns.iter().map(|c| c.id.as_str()).collect();

    for t in &config.tables {
        let table_columns: HashSet<&str> = config.columns_of(&t.id).map(|c| c.name.as_str()).collect();
        for pk in t.primary_key.columns() {
            if !table_columns.contains(pk) {
                return Err(ConfigError::InvalidPrimaryKey {
                    table_id: t.id.clone(),
                    column: pk.to_string(),
                });
            }
        }
        for col in t.unique.iter().flatten() {
            if !table_columns.contains(col.as_str()) {
                return Err(ConfigError::UnknownColumn {
                    table_id: t.id.clone(),
                    column: col.clone(),
                });
            }
        }
    }

    for c in &config.columns {
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
        if let ColumnTypeConfig::Enum(enum_id) = &c.type_ {
            if !enum_ids.contains(enum_id.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "enum",
                    id: enum_id.clone(),
                });
            }
        }
    }

    for r in &config.relationships {
        if !table_ids.contains(r.from_table_id.as_str())
            || !table_ids.contains(r.to_table_id.as_str())
            || !column_ids.contains(r.from_column_id.as_str())
            || !column_ids.contains(r.to_column_id.as_str())
        {
            return Err(ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            });
        }
    }

    let mut path_segments = HashSet::new();
    for api in &config.api_entities {
        if !table_ids.contains(api.entity_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            });
        }
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        let table_columns: HashSet<&str> = config
            .columns_of(&api.entity_id)
            .map(|c| c.name.as_str())
            .collect();
        let exposed = api.include_columns.iter().flatten();
        for col in exposed.chain(api.sensitive_columns.iter()) {
            if !table_columns.contains(col.as_str()) {
                return Err(ConfigError::UnknownColumn {
                    table_id: api.entity_id.clone(),
                    column: col.clone(),
                });
            }
        }
        for op in api.preprocessors.keys() {
            if !api.operations.contains(op) {
                return Err(ConfigError::Validation(format!(
                    "{}: preprocessors declared for {} which is not an allowed operation",
                    api.path_segment, op
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{directory_config, Operation, Preprocessor};

    #[test]
    fn rejects_duplicate_path_segment() {
        let mut config = directory_config("directory");
        let dup = config.api_entities[0].clone();
        config.api_entities.push(dup);
        assert!(matches!(validate(&config), Err(ConfigError::DuplicatePathSegment(p)) if p == "users"));
    }

    #[test]
    fn rejects_unknown_output_column() {
        let mut config = directory_config("directory");
        let projects = config.api_entities.iter_mut().find(|a| a.path_segment == "projects").unwrap();
        projects.include_columns = Some(vec!["id".into(), "owner".into()]);
        assert!(matches!(validate(&config), Err(ConfigError::UnknownColumn { column, .. }) if column == "owner"));
    }

    #[test]
    fn rejects_preprocessor_on_unexposed_operation() {
        let mut config = directory_config("directory");
        let keywords = config.api_entities.iter_mut().find(|a| a.path_segment == "keywords").unwrap();
        keywords.operations = vec![Operation::Read];
        keywords
            .preprocessors
            .insert(Operation::Create, vec![Preprocessor::RemoveFields(vec!["label".into()])]);
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_dangling_relationship() {
        let mut config = directory_config("directory");
        config.relationships[0].to_column_id = "keywords.missing".into();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "relationship", .. })
        ));
    }
}
