//! Type mapping between MSSQL and PostgreSQL.
//!
//! The mapping is a fixed lookup table. A source type missing from it is
//! unsupported and fails the whole table rather than silently degrading to
//! `text`.

use crate::error::{MigrateError, Result};
use crate::source::{Column, TableRef};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A column translated into the target dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name (unchanged from the source).
    pub name: String,

    /// PostgreSQL type, e.g. `integer` or `numeric(18,2)`.
    pub target_type: String,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Translated default expression, if the source default was recognised.
    pub default: Option<String>,
}

/// Map an MSSQL data type to PostgreSQL, or `None` if it is unsupported.
pub fn mssql_to_postgres(
    mssql_type: &str,
    _max_length: i32,
    precision: i32,
    scale: i32,
) -> Option<String> {
    let mapped = match mssql_type.trim().to_lowercase().as_str() {
        // Boolean
        "bit" => "boolean".to_string(),

        // Integer types
        "tinyint" => "smallint".to_string(),
        "smallint" => "smallint".to_string(),
        "int" => "integer".to_string(),
        "bigint" => "bigint".to_string(),

        // Decimal/numeric
        "decimal" | "numeric" => {
            if precision > 0 {
                format!("numeric({},{})", precision, scale.max(0))
            } else {
                "numeric".to_string()
            }
        }
        "money" => "numeric(19,4)".to_string(),
        "smallmoney" => "numeric(10,4)".to_string(),

        // Floating point
        "float" => "double precision".to_string(),
        "real" => "real".to_string(),

        // String types
        "char" | "nchar" | "varchar" | "nvarchar" | "text" | "ntext" => "text".to_string(),

        // Binary types
        "binary" | "varbinary" | "image" => "bytea".to_string(),

        // Date/time types
        "date" => "date".to_string(),
        "time" => "time".to_string(),
        "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" => "timestamp".to_string(),

        // GUID
        "uniqueidentifier" => "uuid".to_string(),

        _ => return None,
    };
    Some(mapped)
}

/// Translate one column, failing with `UnsupportedType` if its type has no mapping.
pub fn translate_column(table: &TableRef, col: &Column) -> Result<ColumnDef> {
    let target_type = mssql_to_postgres(&col.data_type, col.max_length, col.precision, col.scale)
        .ok_or_else(|| MigrateError::UnsupportedType {
            table: table.full_name(),
            column: col.name.clone(),
            source_type: col.data_type.clone(),
        })?;

    let default = col.default.as_deref().and_then(|expr| {
        let translated = translate_default(expr, &target_type);
        if translated.is_none() {
            warn!(
                "{}: dropping default {} on column {} (no PostgreSQL equivalent)",
                table, expr, col.name
            );
        }
        translated
    });

    Ok(ColumnDef {
        name: col.name.clone(),
        target_type,
        nullable: col.is_nullable,
        default,
    })
}

/// Translate every column of a table. All-or-nothing: the first unsupported
/// column fails the table.
pub fn translate_columns(table: &TableRef, cols: &[Column]) -> Result<Vec<ColumnDef>> {
    cols.iter().map(|c| translate_column(table, c)).collect()
}

/// Translate an MSSQL default expression into PostgreSQL.
///
/// Handles literals and the common date/GUID functions; returns `None` for
/// anything else.
pub fn translate_default(expr: &str, target_type: &str) -> Option<String> {
    let inner = strip_outer_parens(expr.trim());

    if is_numeric_literal(inner) {
        if target_type == "boolean" {
            return match inner {
                "0" => Some("false".to_string()),
                "1" => Some("true".to_string()),
                _ => None,
            };
        }
        return Some(inner.to_string());
    }

    // 'text' or N'text'; embedded quotes are already doubled in both dialects
    let literal = inner
        .strip_prefix('N')
        .or_else(|| inner.strip_prefix('n'))
        .unwrap_or(inner);
    if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
        return Some(literal.to_string());
    }

    match inner.to_lowercase().as_str() {
        "getdate()" | "sysdatetime()" | "current_timestamp" => {
            Some("CURRENT_TIMESTAMP".to_string())
        }
        "getutcdate()" | "sysutcdatetime()" => {
            Some("(CURRENT_TIMESTAMP AT TIME ZONE 'UTC')".to_string())
        }
        "newid()" | "newsequentialid()" => Some("gen_random_uuid()".to_string()),
        _ => None,
    }
}

/// Remove parentheses that wrap the whole expression: `((0))` -> `0`.
fn strip_outer_parens(mut expr: &str) -> &str {
    while expr.starts_with('(') && expr.ends_with(')') && wraps_whole(expr) {
        expr = expr[1..expr.len() - 1].trim();
    }
    expr
}

/// True when the opening paren at index 0 closes at the last character.
fn wraps_whole(expr: &str) -> bool {
    let mut depth = 0i32;
    let last = expr.len() - 1;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != last {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn is_numeric_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        assert_eq!(mssql_to_postgres("int", 0, 0, 0).as_deref(), Some("integer"));
        assert_eq!(mssql_to_postgres("bigint", 0, 0, 0).as_deref(), Some("bigint"));
        assert_eq!(mssql_to_postgres("smallint", 0, 0, 0).as_deref(), Some("smallint"));
        assert_eq!(mssql_to_postgres("tinyint", 0, 0, 0).as_deref(), Some("smallint"));
    }

    #[test]
    fn test_string_types() {
        assert_eq!(mssql_to_postgres("varchar", 100, 0, 0).as_deref(), Some("text"));
        assert_eq!(mssql_to_postgres("NVARCHAR", -1, 0, 0).as_deref(), Some("text"));
        assert_eq!(mssql_to_postgres("ntext", 0, 0, 0).as_deref(), Some("text"));
    }

    #[test]
    fn test_decimal_types() {
        assert_eq!(mssql_to_postgres("decimal", 0, 18, 2).as_deref(), Some("numeric(18,2)"));
        assert_eq!(mssql_to_postgres("numeric", 0, 0, 0).as_deref(), Some("numeric"));
        assert_eq!(mssql_to_postgres("money", 0, 19, 4).as_deref(), Some("numeric(19,4)"));
        assert_eq!(mssql_to_postgres("smallmoney", 0, 10, 4).as_deref(), Some("numeric(10,4)"));
    }

    #[test]
    fn test_datetime_types() {
        assert_eq!(mssql_to_postgres("datetime", 0, 0, 0).as_deref(), Some("timestamp"));
        assert_eq!(mssql_to_postgres("datetime2", 0, 0, 0).as_deref(), Some("timestamp"));
        assert_eq!(mssql_to_postgres("datetimeoffset", 0, 0, 0).as_deref(), Some("timestamp"));
        assert_eq!(mssql_to_postgres("date", 0, 0, 0).as_deref(), Some("date"));
        assert_eq!(mssql_to_postgres("time", 0, 0, 0).as_deref(), Some("time"));
    }

    #[test]
    fn test_special_types() {
        assert_eq!(mssql_to_postgres("uniqueidentifier", 0, 0, 0).as_deref(), Some("uuid"));
        assert_eq!(mssql_to_postgres("bit", 0, 0, 0).as_deref(), Some("boolean"));
        assert_eq!(mssql_to_postgres("varbinary", 0, 0, 0).as_deref(), Some("bytea"));
    }

    #[test]
    fn test_unsupported_types() {
        assert_eq!(mssql_to_postgres("xml", 0, 0, 0), None);
        assert_eq!(mssql_to_postgres("geography", 0, 0, 0), None);
        assert_eq!(mssql_to_postgres("sql_variant", 0, 0, 0), None);
    }

    #[test]
    fn test_translate_column_unsupported_names_column() {
        let table = TableRef::new("dbo", "Docs");
        let col = Column::new("Body", "xml");
        match translate_column(&table, &col) {
            Err(MigrateError::UnsupportedType { table, column, source_type }) => {
                assert_eq!(table, "dbo.Docs");
                assert_eq!(column, "Body");
                assert_eq!(source_type, "xml");
            }
            other => panic!("expected UnsupportedType, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_columns_all_or_nothing() {
        let table = TableRef::new("dbo", "Docs");
        let cols = vec![Column::new("Id", "int"), Column::new("Body", "xml")];
        assert!(translate_columns(&table, &cols).is_err());
    }

    #[test]
    fn test_translate_defaults() {
        assert_eq!(translate_default("((0))", "integer").as_deref(), Some("0"));
        assert_eq!(translate_default("((1))", "boolean").as_deref(), Some("true"));
        assert_eq!(translate_default("((0))", "boolean").as_deref(), Some("false"));
        assert_eq!(translate_default("(N'active')", "text").as_deref(), Some("'active'"));
        assert_eq!(translate_default("(getdate())", "timestamp").as_deref(), Some("CURRENT_TIMESTAMP"));
        assert_eq!(translate_default("(newid())", "uuid").as_deref(), Some("gen_random_uuid()"));
        assert_eq!(translate_default("((-1.5))", "numeric").as_deref(), Some("-1.5"));
        assert_eq!(translate_default("([dbo].[fn_next]())", "integer"), None);
        assert_eq!(translate_default("(1)+(2)", "integer"), None);
    }

    #[test]
    fn test_translate_column_keeps_nullability() {
        let table = TableRef::new("dbo", "MasUser");
        let mut col = Column::new("IsActive", "bit");
        col.is_nullable = false;
        col.default = Some("((1))".to_string());

        let def = translate_column(&table, &col).unwrap();
        assert_eq!(def.target_type, "boolean");
        assert!(!def.nullable);
        assert_eq!(def.default.as_deref(), Some("true"));
    }
}
