//! PostgreSQL DDL generation.

use crate::error::Result;
use crate::identifier::{qualify_pg, quote_pg};
use crate::typemap::ColumnDef;

/// `CREATE SCHEMA IF NOT EXISTS "schema"`.
pub fn create_schema_sql(schema: &str) -> Result<String> {
    Ok(format!("CREATE SCHEMA IF NOT EXISTS {}", quote_pg(schema)?))
}

/// `CREATE TABLE IF NOT EXISTS` for translated columns. Never drops or
/// alters an existing table.
pub fn create_table_sql(schema: &str, table: &str, columns: &[ColumnDef]) -> Result<String> {
    let mut lines = Vec::with_capacity(columns.len());
    for col in columns {
        let mut line = format!("    {} {}", quote_pg(&col.name)?, col.target_type);
        if let Some(default) = &col.default {
            line.push_str(&format!(" DEFAULT {}", default));
        }
        if !col.nullable {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        qualify_pg(schema, table)?,
        lines.join(",\n")
    ))
}

/// Full statement sequence applied for one table, as logged in dry runs.
pub fn table_plan_sql(schema: &str, table: &str, columns: &[ColumnDef]) -> Result<String> {
    Ok(format!(
        "{};\n{};",
        create_schema_sql(schema)?,
        create_table_sql(schema, table, columns)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ty: &str, nullable: bool, default: Option<&str>) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            target_type: ty.to_string(),
            nullable,
            default: default.map(str::to_string),
        }
    }

    #[test]
    fn test_create_table_sql() {
        let cols = vec![
            col("Id", "integer", false, None),
            col("Name", "text", true, None),
            col("IsActive", "boolean", false, Some("true")),
        ];
        let ddl = create_table_sql("public", "MasUser", &cols).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS \"public\".\"MasUser\" (\n    \
             \"Id\" integer NOT NULL,\n    \
             \"Name\" text,\n    \
             \"IsActive\" boolean DEFAULT true NOT NULL\n)"
        );
    }

    #[test]
    fn test_table_plan_includes_schema() {
        let cols = vec![col("Id", "integer", true, None)];
        let plan = table_plan_sql("legacy", "Orders", &cols).unwrap();
        assert!(plan.starts_with("CREATE SCHEMA IF NOT EXISTS \"legacy\";\n"));
        assert!(plan.ends_with(");"));
    }

    #[test]
    fn test_create_table_without_columns() {
        let ddl = create_table_sql("public", "Empty", &[]).unwrap();
        assert_eq!(ddl, "CREATE TABLE IF NOT EXISTS \"public\".\"Empty\" (\n\n)");
    }

    #[test]
    fn test_column_names_are_quoted() {
        let cols = vec![col("we\"ird", "text", true, None)];
        let ddl = create_table_sql("public", "t", &cols).unwrap();
        assert!(ddl.contains("\"we\"\"ird\" text"));
    }
}
