//! Error types for the migration library.

use thiserror::Error;

/// Process exit code: success.
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit code: invalid configuration or selection input.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Process exit code: at least one table failed.
pub const EXIT_TABLE_FAILURES: u8 = 2;
/// Process exit code: source/target connection or database error.
pub const EXIT_CONNECTION_ERROR: u8 = 3;
/// Process exit code: I/O error (env file missing, export dir not writable).
pub const EXIT_IO_ERROR: u8 = 7;
/// Process exit code: run interrupted.
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (bad env file, bad selection input, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Column metadata could not be read for a table.
    #[error("Schema read failed for table {table}: {message}")]
    SchemaRead { table: String, message: String },

    /// A column's source type has no target mapping.
    #[error("Unsupported type '{source_type}' for column {column} in table {table}")]
    UnsupportedType {
        table: String,
        column: String,
        source_type: String,
    },

    /// The target rejected the table DDL.
    #[error("Schema apply failed for table {table}: {message}")]
    SchemaApply { table: String, message: String },

    /// Row transfer failed part way through a table.
    #[error("Data copy failed for table {table} after {rows_copied} rows: {message}")]
    DataCopy {
        table: String,
        rows_copied: i64,
        message: String,
    },

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a SchemaRead error
    pub fn schema_read(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::SchemaRead {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a DataCopy error
    pub fn data_copy(table: impl Into<String>, rows_copied: i64, message: impl Into<String>) -> Self {
        MigrateError::DataCopy {
            table: table.into(),
            rows_copied,
            message: message.into(),
        }
    }

    /// Exit code the CLI reports for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) => EXIT_CONFIG_ERROR,
            MigrateError::Source(_) | MigrateError::Target(_) | MigrateError::Pool { .. } => {
                EXIT_CONNECTION_ERROR
            }
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
            MigrateError::Json(_) => EXIT_CONFIG_ERROR,
            _ => EXIT_TABLE_FAILURES,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(MigrateError::pool("x", "y").exit_code(), EXIT_CONNECTION_ERROR);
        assert_eq!(MigrateError::Cancelled.exit_code(), EXIT_CANCELLED);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(MigrateError::Io(io).exit_code(), EXIT_IO_ERROR);
    }

    #[test]
    fn test_data_copy_message_includes_partial_rows() {
        let err = MigrateError::data_copy("dbo.Orders", 1500, "connection reset");
        assert_eq!(
            err.to_string(),
            "Data copy failed for table dbo.Orders after 1500 rows: connection reset"
        );
    }
}
