//! Identifier validation and quoting for generated SQL.
//!
//! Schema, table and column names end up inside DDL, `SELECT` and `COPY`
//! statements where they cannot be bound as parameters. Every name goes
//! through [`validate_identifier`] and is then quoted for the dialect it is
//! emitted into, with the dialect's closing quote character doubled.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted from either side.
/// - PostgreSQL: 63 bytes (longer names are truncated by the server)
/// - SQL Server: 128 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier.
///
/// Rejects blank identifiers, identifiers containing null bytes and
/// identifiers longer than [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier: `users` -> `"users"`, `a"b` -> `"a""b"`.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a SQL Server identifier: `users` -> `[users]`, `a]b` -> `[a]]b]`.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Qualify a PostgreSQL table name with schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// Qualify a SQL Server table name with schema.
pub fn qualify_mssql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_mssql(schema)?, quote_mssql(table)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("MasUser").is_ok());
        assert!(validate_identifier("order items").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_blank() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        assert!(validate_identifier("users\0; DROP TABLE x").is_err());
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_quote_pg_escapes_double_quote() {
        assert_eq!(quote_pg("users").unwrap(), "\"users\"");
        assert_eq!(quote_pg("table\"name").unwrap(), "\"table\"\"name\"");
    }

    #[test]
    fn test_quote_mssql_escapes_bracket() {
        assert_eq!(quote_mssql("users").unwrap(), "[users]");
        assert_eq!(quote_mssql("table]name").unwrap(), "[table]]name]");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify_pg("public", "MasUser").unwrap(), "\"public\".\"MasUser\"");
        assert_eq!(qualify_mssql("dbo", "MasUser").unwrap(), "[dbo].[MasUser]");
        assert!(qualify_pg("", "MasUser").is_err());
    }
}
