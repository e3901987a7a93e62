//! Apply config to the database: DDL for the schema, enum types, tables, and foreign keys.
//! Order follows PostgreSQL dependencies. Every step is idempotent so startup can always run it.

use crate::config::loader::qualified_type;
use crate::config::types::*;
use crate::config::validate;
use crate::error::{AppError, ConfigError};
use sqlx::PgPool;
use std::collections::HashMap;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn type_str(ty: &ColumnTypeConfig, schema: &str, enums_by_id: &HashMap<&str, &EnumConfig>) -> Result<String, ConfigError> {
    Ok(match ty {
        ColumnTypeConfig::Serial => "SERIAL".into(),
        ColumnTypeConfig::Integer => "INTEGER".into(),
        ColumnTypeConfig::Text => "TEXT".into(),
        ColumnTypeConfig::Varchar(n) => format!("VARCHAR({})", n),
        ColumnTypeConfig::Enum(id) => {
            let e = enums_by_id.get(id.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "enum",
                id: id.clone(),
            })?;
            qualified_type(schema, &e.name)
        }
    })
}

pub fn create_enum_sql(schema: &str, e: &EnumConfig) -> String {
    let values: Vec<String> = e.values.iter().map(|v| literal(v)).collect();
    format!("CREATE TYPE {} AS ENUM ({})", qualified_type(schema, &e.name), values.join(", "))
}

pub fn create_table_sql(config: &FullConfig, t: &TableConfig) -> Result<String, ConfigError> {
    let enums_by_id: HashMap<_, _> = config.enums.iter().map(|e| (e.id.as_str(), e)).collect();
    let mut col_defs: Vec<String> = Vec::new();
    for c in config.columns_of(&t.id) {
        let mut def = format!("{} {}", quote(&c.name), type_str(&c.type_, &config.schema_name, &enums_by_id)?);
        if !c.nullable {
            def.push_str(" NOT NULL");
        }
        if c.unique {
            def.push_str(" UNIQUE");
        }
        col_defs.push(def);
    }
    let pk_cols: Vec<String> = t.primary_key.columns().into_iter().map(quote).collect();
    col_defs.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
    for u in &t.unique {
        let cols: Vec<String> = u.iter().map(|s| quote(s)).collect();
        col_defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\n  {}\n)",
        quote(&config.schema_name),
        quote(&t.name),
        col_defs.join(",\n  ")
    ))
}

pub fn foreign_key_sql(config: &FullConfig, rel: &RelationshipConfig) -> Result<String, ConfigError> {
    let missing = |kind: &'static str, id: &str| ConfigError::MissingReference { kind, id: id.to_string() };
    let table_name = |id: &str| {
        config
            .tables
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.clone())
            .ok_or_else(|| missing("table", id))
    };
    let column_name = |id: &str| {
        config
            .columns
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .ok_or_else(|| missing("column", id))
    };
    let schema = quote(&config.schema_name);
    Ok(format!(
        "ALTER TABLE {}.{} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}.{} ({}) ON DELETE {}",
        schema,
        quote(&table_name(&rel.from_table_id)?),
        quote(&rel.id),
        quote(&column_name(&rel.from_column_id)?),
        schema,
        quote(&table_name(&rel.to_table_id)?),
        quote(&column_name(&rel.to_column_id)?),
        rel.on_delete.as_deref().unwrap_or("NO ACTION")
    ))
}

/// Apply full config to the database: CREATE SCHEMA, CREATE TYPE, CREATE TABLE, ADD FK.
/// Validates config first. Types and constraints are created only when missing.
pub async fn apply_migrations(pool: &PgPool, config: &FullConfig) -> Result<(), AppError> {
    validate(config)?;
    let schema = &config.schema_name;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema)))
        .execute(pool)
        .await?;

    for e in &config.enums {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM pg_type t JOIN pg_namespace n ON n.oid = t.typnamespace \
             WHERE n.nspname = $1 AND t.typname = $2)",
        )
        .bind(schema)
        .bind(&e.name)
        .fetch_one(pool)
        .await?;
        if !exists.0 {
            tracing::info!(schema = %schema, name = %e.name, "creating enum type");
            sqlx::query(&create_enum_sql(schema, e)).execute(pool).await?;
        }
    }

    for t in &config.tables {
        let sql = create_table_sql(config, t)?;
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await?;
    }

    for rel in &config.relationships {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM pg_constraint c JOIN pg_namespace n ON n.oid = c.connamespace \
             WHERE n.nspname = $1 AND c.conname = $2)",
        )
        .bind(schema)
        .bind(&rel.id)
        .fetch_one(pool)
        .await?;
        if !exists.0 {
            let sql = foreign_key_sql(config, rel)?;
            tracing::debug!(sql = %sql, "migration");
            sqlx::query(&sql).execute(pool).await?;
        }
    }

    tracing::info!(schema = %schema, tables = config.tables.len(), "migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{directory_config, PROJECT_USERS, USERS};

    #[test]
    fn association_table_has_composite_primary_key() {
        let config = directory_config("directory");
        let t = config.tables.iter().find(|t| t.id == PROJECT_USERS).unwrap();
        let sql = create_table_sql(&config, t).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"directory\".\"project_users\" (\n  \
             \"user_id\" INTEGER NOT NULL,\n  \
             \"project_id\" INTEGER NOT NULL,\n  \
             \"role\" \"directory\".\"project_role\" NOT NULL,\n  \
             PRIMARY KEY (\"user_id\", \"project_id\")\n)"
        );
    }

    #[test]
    fn username_is_unique_and_bounded() {
        let config = directory_config("directory");
        let t = config.tables.iter().find(|t| t.id == USERS).unwrap();
        let sql = create_table_sql(&config, t).unwrap();
        assert!(sql.contains("\"username\" VARCHAR(25) NOT NULL UNIQUE"));
        assert!(sql.contains("\"email\" VARCHAR(35),"));
    }

    #[test]
    fn foreign_keys_cascade() {
        let config = directory_config("directory");
        let sql = foreign_key_sql(&config, &config.relationships[0]).unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"directory\".\"project_keywords\" ADD CONSTRAINT \"project_keywords_keyword_id_fkey\" \
             FOREIGN KEY (\"keyword_id\") REFERENCES \"directory\".\"keywords\" (\"id\") ON DELETE CASCADE"
        );
    }

    #[test]
    fn enum_literals_are_escaped() {
        let e = EnumConfig {
            id: "t".into(),
            name: "t".into(),
            values: vec!["it's".into()],
        };
        assert_eq!(create_enum_sql("s", &e), "CREATE TYPE \"s\".\"t\" AS ENUM ('it''s')");
    }
}
