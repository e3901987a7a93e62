//! Environment configuration. Read once at startup after `.env` is loaded.

use crate::error::ConfigError;
use regex::Regex;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SCHEMA: &str = "directory";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Unset means the in-process store.
    pub database_url: Option<String>,
    pub schema: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub static_dir: PathBuf,
    pub body_limit_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let schema = get("DIRECTORY_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").map_err(|e| ConfigError::Env {
            var: "DIRECTORY_SCHEMA",
            message: e.to_string(),
        })?;
        if !ident.is_match(&schema) {
            return Err(ConfigError::Env {
                var: "DIRECTORY_SCHEMA",
                message: format!("'{}' is not a valid identifier", schema),
            });
        }

        Ok(Settings {
            database_url: get("DATABASE_URL"),
            schema,
            bind_addr: parse_var("BIND_ADDR", get("BIND_ADDR"), DEFAULT_BIND_ADDR)?,
            max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                &DEFAULT_MAX_CONNECTIONS.to_string(),
            )?,
            static_dir: PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| ".".to_string())),
            body_limit_bytes: parse_var(
                "BODY_LIMIT_BYTES",
                get("BODY_LIMIT_BYTES"),
                &DEFAULT_BODY_LIMIT_BYTES.to_string(),
            )?,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            schema: DEFAULT_SCHEMA.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            static_dir: PathBuf::from("."),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

fn parse_var<T>(var: &'static str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value.unwrap_or_else(|| default.to_string());
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        message: format!("'{}': {}", raw, e),
    })
}
