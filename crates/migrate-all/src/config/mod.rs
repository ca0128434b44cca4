//! Configuration loading and validation.
//!
//! Connection parameters and run defaults live in a key-value env file
//! (`KEY=value` per line, `#` comments). It is read once at start-up and
//! never written back.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

impl Config {
    /// Load configuration from an env file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path).map_err(|e| match e {
            dotenvy::Error::Io(io) => MigrateError::Io(io),
            other => MigrateError::Config(format!("{}: {}", path.display(), other)),
        })?;

        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                MigrateError::Config(format!("{}: {}", path.display(), e))
            })?;
            vars.insert(key, value);
        }
        debug!("Read {} keys from {}", vars.len(), path.display());

        Self::from_vars(&vars)
    }

    /// Build configuration from already-parsed key/value pairs.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Config {
            source: SourceConfig {
                host: get("MSSQL_HOST").unwrap_or_default(),
                port: parse_or(&get("MSSQL_PORT"), "MSSQL_PORT", 1433)?,
                database: get("MSSQL_DATABASE").unwrap_or_default(),
                user: get("MSSQL_USER").unwrap_or_default(),
                password: vars.get("MSSQL_PASS").cloned().unwrap_or_default(),
                encrypt: get("MSSQL_ENCRYPT").unwrap_or_else(|| "true".to_string()),
                trust_server_cert: parse_flag(&get("MSSQL_TRUST_SERVER_CERT"), "MSSQL_TRUST_SERVER_CERT")?,
            },
            target: TargetConfig {
                host: get("PG_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(&get("PG_PORT"), "PG_PORT", 5432)?,
                database: get("PG_DATABASE").unwrap_or_default(),
                user: get("PG_USER").unwrap_or_default(),
                password: vars.get("PG_PASS").cloned().unwrap_or_default(),
                schema: get("PG_SCHEMA"),
            },
            migration: MigrationConfig {
                mode: if parse_flag(&get("USE_PGLOADER"), "USE_PGLOADER")? {
                    MigrationMode::Pgloader
                } else {
                    MigrationMode::Manual
                },
                export_dir: get("EXPORT_DIR").map(PathBuf::from),
                batch_size: parse_or(&get("BATCH_SIZE"), "BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
                max_connections: parse_or(
                    &get("MAX_CONNECTIONS"),
                    "MAX_CONNECTIONS",
                    DEFAULT_MAX_CONNECTIONS,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the parts of the configuration every run needs.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Validate the target connection settings (skipped for dry runs).
    pub fn validate_target(&self) -> Result<()> {
        validation::validate_target(&self.target)
    }

    /// Resolve the target schema: CLI value, then `PG_SCHEMA`, then "public".
    pub fn target_schema(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.target.schema.clone())
            .unwrap_or_else(|| DEFAULT_TARGET_SCHEMA.to_string())
    }

    /// Resolve the export directory: CLI value, then `EXPORT_DIR`, then "exports".
    pub fn export_dir(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.migration.export_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR))
    }
}

fn parse_or<T: std::str::FromStr>(value: &Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| MigrateError::Config(format!("{} must be a number, got '{}'", key, v))),
        None => Ok(default),
    }
}

fn parse_flag(value: &Option<String>, key: &str) -> Result<bool> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(false),
        Some("true" | "yes" | "1") => Ok(true),
        Some("false" | "no" | "0") => Ok(false),
        Some(other) => Err(MigrateError::Config(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}
