//! Configuration type definitions.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure, read once from the env file.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Source database configuration (MSSQL).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    pub migration: MigrationConfig,
}

/// Source database (MSSQL) configuration.
#[derive(Clone, Serialize)]
pub struct SourceConfig {
    /// Database host (`MSSQL_HOST`).
    pub host: String,

    /// Database port (`MSSQL_PORT`, default: 1433).
    pub port: u16,

    /// Database name (`MSSQL_DATABASE`).
    pub database: String,

    /// Username (`MSSQL_USER`).
    pub user: String,

    /// Password (`MSSQL_PASS`).
    #[serde(skip_serializing)]
    pub password: String,

    /// Encrypt connection (`MSSQL_ENCRYPT`, default: "true").
    pub encrypt: String,

    /// Trust server certificate (`MSSQL_TRUST_SERVER_CERT`, default: false).
    pub trust_server_cert: bool,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize)]
pub struct TargetConfig {
    /// Database host (`PG_HOST`, default: localhost).
    pub host: String,

    /// Database port (`PG_PORT`, default: 5432).
    pub port: u16,

    /// Database name (`PG_DATABASE`).
    pub database: String,

    /// Username (`PG_USER`).
    pub user: String,

    /// Password (`PG_PASS`).
    #[serde(skip_serializing)]
    pub password: String,

    /// Target schema fallback when `--target-schema` is absent (`PG_SCHEMA`).
    pub schema: Option<String>,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationConfig {
    /// How the migration is carried out (`USE_PGLOADER`).
    pub mode: MigrationMode,

    /// Export directory fallback when `--export-dir` is absent (`EXPORT_DIR`).
    pub export_dir: Option<PathBuf>,

    /// Rows per copy batch (`BATCH_SIZE`).
    pub batch_size: usize,

    /// Pool size for each side (`MAX_CONNECTIONS`).
    pub max_connections: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            mode: MigrationMode::default(),
            export_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Operating mode selected by the env file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Run the built-in driver: translate schema and copy rows directly.
    #[default]
    Manual,

    /// Render pgloader load files and leave the transfer to pgloader.
    Pgloader,
}

/// Default rows per copy batch.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default pool size for each side.
pub const DEFAULT_MAX_CONNECTIONS: usize = 4;

/// Default target schema.
pub const DEFAULT_TARGET_SCHEMA: &str = "public";

/// Default export directory.
pub const DEFAULT_EXPORT_DIR: &str = "exports";
