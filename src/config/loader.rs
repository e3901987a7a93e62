//! Build the resolved runtime model from the declarative config.

use crate::config::resolved::{ColumnInfo, ColumnKind, ForeignKey, ResolvedEntity, ResolvedModel, ResolvedTable};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Build resolved model from full config. Validates first.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let enums_by_id: HashMap<_, _> = config.enums.iter().map(|e| (e.id.as_str(), e)).collect();
    let column_by_id: HashMap<_, _> = config.columns.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut tables = HashMap::new();
    for t in &config.tables {
        let pk_names: Vec<String> = t.primary_key.columns().into_iter().map(String::from).collect();
        let columns = config
            .columns_of(&t.id)
            .map(|c| column_info(c, &pk_names, &config.schema_name, &enums_by_id))
            .collect::<Result<Vec<_>, _>>()?;

        let foreign_keys = config
            .relationships
            .iter()
            .filter(|r| r.from_table_id == t.id)
            .map(|r| {
                let from = column_by_id.get(r.from_column_id.as_str());
                let to = column_by_id.get(r.to_column_id.as_str());
                match (from, to) {
                    (Some(from), Some(to)) => Ok(ForeignKey {
                        column: from.name.clone(),
                        ref_table_id: r.to_table_id.clone(),
                        ref_column: to.name.clone(),
                        cascade: r
                            .on_delete
                            .as_deref()
                            .map(|a| a.eq_ignore_ascii_case("cascade"))
                            .unwrap_or(false),
                    }),
                    _ => Err(ConfigError::MissingReference {
                        kind: "relationship",
                        id: r.id.clone(),
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        tables.insert(
            t.id.clone(),
            ResolvedTable {
                table_id: t.id.clone(),
                schema_name: config.schema_name.clone(),
                table_name: t.name.clone(),
                pk_columns: pk_names,
                columns,
                unique: t.unique.clone(),
                foreign_keys,
            },
        );
    }

    let mut entity_by_path = HashMap::new();
    for api in &config.api_entities {
        let table = tables.get(api.entity_id.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "table",
            id: api.entity_id.clone(),
        })?;
        if table.pk_columns.len() != 1 {
            return Err(ConfigError::Validation(format!(
                "{}: exposed entities need a single-column primary key",
                api.path_segment
            )));
        }
        let sensitive_columns: HashSet<String> = api.sensitive_columns.iter().cloned().collect();
        let entity = ResolvedEntity {
            table: table.clone(),
            path_segment: api.path_segment.clone(),
            operations: api.operations.clone(),
            preprocessors: api.preprocessors.clone(),
            include_columns: api.include_columns.clone(),
            sensitive_columns,
        };
        entity_by_path.insert(api.path_segment.clone(), entity);
    }

    Ok(ResolvedModel {
        tables,
        entity_by_path,
    })
}

fn column_info(
    c: &ColumnConfig,
    pk_names: &[String],
    schema_name: &str,
    enums_by_id: &HashMap<&str, &EnumConfig>,
) -> Result<ColumnInfo, ConfigError> {
    let (kind, pg_type, max_length, allowed) = match &c.type_ {
        ColumnTypeConfig::Serial | ColumnTypeConfig::Integer => (ColumnKind::Integer, "int4".to_string(), None, None),
        ColumnTypeConfig::Text => (ColumnKind::Text, "text".to_string(), None, None),
        ColumnTypeConfig::Varchar(n) => (ColumnKind::Text, "varchar".to_string(), Some(*n), None),
        ColumnTypeConfig::Enum(enum_id) => {
            let e = enums_by_id.get(enum_id.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "enum",
                id: enum_id.clone(),
            })?;
            (
                ColumnKind::Text,
                qualified_type(schema_name, &e.name),
                None,
                Some(e.values.clone()),
            )
        }
    };
    Ok(ColumnInfo {
        name: c.name.clone(),
        kind,
        pg_type,
        is_enum: allowed.is_some(),
        is_pk: pk_names.contains(&c.name),
        nullable: c.nullable,
        has_default: matches!(c.type_, ColumnTypeConfig::Serial),
        unique: c.unique,
        max_length,
        allowed,
    })
}

pub(crate) fn qualified_type(schema: &str, name: &str) -> String {
    format!("\"{}\".\"{}\"", schema.replace('"', "\"\""), name.replace('"', "\"\""))
}
