//! Table selection: which tables a run touches and in which mode.

mod pattern;

pub use pattern::{split_list, TablePattern};

use crate::error::{MigrateError, Result};
use crate::identifier::validate_identifier;
use crate::source::{SourceCatalog, TableRef};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// How a selected table is migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMode {
    /// Create the table; copy no rows.
    CreateOnly,

    /// Create the table and copy its rows.
    CreateAndCopy,
}

impl fmt::Display for TableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableMode::CreateOnly => write!(f, "create-only"),
            TableMode::CreateAndCopy => write!(f, "create+copy"),
        }
    }
}

/// One resolved table and its mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedTable {
    pub table: TableRef,
    pub mode: TableMode,
}

/// Non-fatal problems found while resolving the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "entry", rename_all = "snake_case")]
pub enum SelectionWarning {
    /// A create-only entry matched no selected table.
    UnmatchedCreateOnly(String),

    /// An unqualified `--tables` entry matched no source table.
    UnmatchedTable(String),
}

impl fmt::Display for SelectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionWarning::UnmatchedCreateOnly(entry) => {
                write!(f, "create-only entry '{}' matched no selected table", entry)
            }
            SelectionWarning::UnmatchedTable(entry) => {
                write!(f, "table '{}' was not found in any source schema", entry)
            }
        }
    }
}

/// The resolved, immutable set of tables for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionSpec {
    /// Tables in processing order.
    pub tables: Vec<SelectedTable>,

    /// Target schema shared by every table.
    pub target_schema: String,

    /// Warnings raised while resolving.
    pub warnings: Vec<SelectionWarning>,
}

impl SelectionSpec {
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables selected in the given mode, in processing order.
    pub fn tables_in_mode(&self, mode: TableMode) -> impl Iterator<Item = &TableRef> {
        self.tables
            .iter()
            .filter(move |t| t.mode == mode)
            .map(|t| &t.table)
    }
}

/// Parsed and validated selection inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    /// Explicit table list. Authoritative when non-empty.
    pub tables: Vec<TablePattern>,

    /// Source schemas to enumerate when no explicit list is given.
    pub schema_filter: Vec<String>,

    /// Tables to create without copying rows.
    pub create_only: Vec<TablePattern>,

    /// Target schema for every table.
    pub target_schema: String,
}

impl SelectionRequest {
    /// Build a request from raw comma-separated CLI values.
    ///
    /// `legacy_schema` and `source_schema` are unioned, legacy entries first,
    /// with case-insensitive duplicates removed.
    pub fn from_args(
        tables: Option<&str>,
        legacy_schema: Option<&str>,
        source_schema: Option<&str>,
        create_only: Option<&str>,
        target_schema: &str,
    ) -> Result<Self> {
        let target_schema = target_schema.trim();
        if target_schema.is_empty() {
            return Err(MigrateError::Config(
                "target schema must not be empty".to_string(),
            ));
        }
        validate_identifier(target_schema)?;

        let tables = parse_patterns(tables)?;
        let create_only = parse_patterns(create_only)?;

        let mut schema_filter: Vec<String> = Vec::new();
        for schema in legacy_schema
            .into_iter()
            .chain(source_schema)
            .flat_map(split_list)
        {
            validate_identifier(&schema)?;
            if !schema_filter.iter().any(|s| s.eq_ignore_ascii_case(&schema)) {
                schema_filter.push(schema);
            }
        }

        Ok(Self {
            tables,
            schema_filter,
            create_only,
            target_schema: target_schema.to_string(),
        })
    }
}

fn parse_patterns(list: Option<&str>) -> Result<Vec<TablePattern>> {
    list.map(split_list)
        .unwrap_or_default()
        .iter()
        .map(|item| TablePattern::parse(item))
        .collect()
}

/// Resolve a request against the source catalog.
pub async fn resolve(request: &SelectionRequest, catalog: &dyn SourceCatalog) -> Result<SelectionSpec> {
    let mut warnings = Vec::new();

    let tables = if !request.tables.is_empty() {
        if !request.schema_filter.is_empty() {
            info!(
                "Explicit table list given; ignoring schema filter [{}]",
                request.schema_filter.join(", ")
            );
        }
        expand_explicit(&request.tables, catalog, &mut warnings).await?
    } else {
        if request.schema_filter.is_empty() {
            info!("No table list or schema filter; selecting every source table");
        } else {
            info!("Selecting tables from schemas [{}]", request.schema_filter.join(", "));
        }
        catalog.list_tables(&request.schema_filter).await?
    };

    let (tables, mode_warnings) = apply_modes(&tables, &request.create_only);
    warnings.extend(mode_warnings);

    for warning in &warnings {
        warn!("{}", warning);
    }

    let selection = SelectionSpec {
        tables,
        target_schema: request.target_schema.clone(),
        warnings,
    };

    info!(
        "Selected {} tables ({} create-only) -> schema {}",
        selection.len(),
        selection.tables_in_mode(TableMode::CreateOnly).count(),
        selection.target_schema
    );
    Ok(selection)
}

/// Expand the explicit list in order. Unqualified names match every schema.
async fn expand_explicit(
    patterns: &[TablePattern],
    catalog: &dyn SourceCatalog,
    warnings: &mut Vec<SelectionWarning>,
) -> Result<Vec<TableRef>> {
    let all_tables = if patterns.iter().any(|p| !p.is_qualified()) {
        catalog.list_tables(&[]).await?
    } else {
        Vec::new()
    };

    let mut seen = HashSet::new();
    let mut tables = Vec::new();

    for pattern in patterns {
        match pattern.to_table_ref() {
            Some(table) => {
                if seen.insert(table.clone()) {
                    tables.push(table);
                }
            }
            None => {
                let matches: Vec<&TableRef> =
                    all_tables.iter().filter(|t| pattern.matches(t)).collect();
                if matches.is_empty() {
                    warnings.push(SelectionWarning::UnmatchedTable(pattern.to_string()));
                    continue;
                }
                debug!("{} expanded to {} tables", pattern, matches.len());
                for table in matches {
                    if seen.insert(table.clone()) {
                        tables.push(table.clone());
                    }
                }
            }
        }
    }

    Ok(tables)
}

/// Assign a mode to each table. Duplicate tables are dropped; the first wins.
pub fn apply_modes(
    tables: &[TableRef],
    create_only: &[TablePattern],
) -> (Vec<SelectedTable>, Vec<SelectionWarning>) {
    let mut seen = HashSet::new();
    let selected: Vec<SelectedTable> = tables
        .iter()
        .filter(|t| seen.insert((*t).clone()))
        .map(|t| SelectedTable {
            table: t.clone(),
            mode: if create_only.iter().any(|p| p.matches(t)) {
                TableMode::CreateOnly
            } else {
                TableMode::CreateAndCopy
            },
        })
        .collect();

    let warnings = create_only
        .iter()
        .filter(|p| !selected.iter().any(|s| p.matches(&s.table)))
        .map(|p| SelectionWarning::UnmatchedCreateOnly(p.to_string()))
        .collect();

    (selected, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Column, RowReader};
    use async_trait::async_trait;

    struct FakeCatalog {
        tables: Vec<TableRef>,
    }

    impl FakeCatalog {
        fn new(tables: &[(&str, &str)]) -> Self {
            Self {
                tables: tables.iter().map(|(s, n)| TableRef::new(*s, *n)).collect(),
            }
        }
    }

    #[async_trait]
    impl SourceCatalog for FakeCatalog {
        async fn list_tables(&self, schemas: &[String]) -> Result<Vec<TableRef>> {
            Ok(self
                .tables
                .iter()
                .filter(|t| schemas.is_empty() || schemas.iter().any(|s| t.in_schema(s)))
                .cloned()
                .collect())
        }

        async fn columns(&self, _table: &TableRef) -> Result<Vec<Column>> {
            Ok(Vec::new())
        }

        fn rows(&self, _table: &TableRef, _columns: &[Column], _batch_size: usize) -> RowReader {
            RowReader::spawn(|_tx| async { Ok::<(), MigrateError>(()) })
        }

        async fn close(&self) {}
    }

    fn catalog() -> FakeCatalog {
        FakeCatalog::new(&[
            ("a", "Bar"),
            ("a", "Foo"),
            ("b", "Foo"),
            ("dbo", "MasDepartment"),
            ("dbo", "MasUser"),
            ("dbo", "Orders"),
            ("sales", "Orders"),
        ])
    }

    fn request(
        tables: Option<&str>,
        schema: Option<&str>,
        source_schema: Option<&str>,
        create_only: Option<&str>,
    ) -> SelectionRequest {
        SelectionRequest::from_args(tables, schema, source_schema, create_only, "public").unwrap()
    }

    fn names(selection: &SelectionSpec) -> Vec<(String, TableMode)> {
        selection.tables
            .iter()
            .map(|t| (t.table.full_name(), t.mode))
            .collect()
    }

    #[test]
    fn test_schema_filters_are_unioned() {
        let req = request(None, Some("dbo, Sales"), Some("sales,hr"), None);
        assert_eq!(req.schema_filter, vec!["dbo", "Sales", "hr"]);
    }

    #[test]
    fn test_blank_target_schema_rejected() {
        let err = SelectionRequest::from_args(None, None, None, None, "  ").unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_malformed_table_rejected() {
        assert!(SelectionRequest::from_args(Some("a.b.c"), None, None, None, "public").is_err());
        assert!(SelectionRequest::from_args(None, None, None, Some("[x"), "public").is_err());
    }

    #[tokio::test]
    async fn test_explicit_list_is_authoritative() {
        let req = request(Some("sales.Orders,dbo.MasUser"), Some("a"), None, None);
        let selection = resolve(&req, &catalog()).await.unwrap();
        assert_eq!(
            names(&selection),
            vec![
                ("sales.Orders".to_string(), TableMode::CreateAndCopy),
                ("dbo.MasUser".to_string(), TableMode::CreateAndCopy),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_only_unqualified_in_schema_mode() {
        let req = request(None, None, Some("dbo"), Some("MasUser"));
        let selection = resolve(&req, &catalog()).await.unwrap();
        assert_eq!(
            names(&selection),
            vec![
                ("dbo.MasDepartment".to_string(), TableMode::CreateAndCopy),
                ("dbo.MasUser".to_string(), TableMode::CreateOnly),
                ("dbo.Orders".to_string(), TableMode::CreateAndCopy),
            ]
        );
        assert!(selection.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_create_only_mixed_entries() {
        let req = request(None, None, Some("dbo"), Some("dbo.MasUser,MasDepartment"));
        let selection = resolve(&req, &catalog()).await.unwrap();
        assert_eq!(selection.tables_in_mode(TableMode::CreateOnly).count(), 2);
        assert_eq!(selection.tables_in_mode(TableMode::CreateAndCopy).count(), 1);
    }

    #[tokio::test]
    async fn test_qualified_create_only_hits_exact_table() {
        let req = request(None, None, None, Some("dbo.Orders"));
        let selection = resolve(&req, &catalog()).await.unwrap();
        let create_only: Vec<String> = selection
            .tables_in_mode(TableMode::CreateOnly)
            .map(|t| t.full_name())
            .collect();
        assert_eq!(create_only, vec!["dbo.Orders"]);
    }

    #[tokio::test]
    async fn test_unqualified_create_only_hits_every_schema() {
        let req = request(Some("a.Foo,b.Foo"), None, None, Some("foo"));
        let selection = resolve(&req, &catalog()).await.unwrap();
        assert!(selection.tables.iter().all(|t| t.mode == TableMode::CreateOnly));
        assert_eq!(selection.len(), 2);
    }

    #[tokio::test]
    async fn test_bracketed_table_with_unqualified_create_only() {
        let req = request(Some("[dbo].[MasUser]"), None, None, Some("MasUser"));
        let selection = resolve(&req, &catalog()).await.unwrap();
        assert_eq!(names(&selection), vec![("dbo.MasUser".to_string(), TableMode::CreateOnly)]);
        assert!(selection.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_bracketed_tables_with_mixed_create_only() {
        let req = request(
            Some("[dbo].[MasUser],[dbo].[MasDepartment]"),
            None,
            None,
            Some("dbo.MasUser,MasDepartment"),
        );
        let selection = resolve(&req, &catalog()).await.unwrap();
        assert_eq!(
            names(&selection),
            vec![
                ("dbo.MasUser".to_string(), TableMode::CreateOnly),
                ("dbo.MasDepartment".to_string(), TableMode::CreateOnly),
            ]
        );
    }

    #[tokio::test]
    async fn test_bracketed_tables_unqualified_create_only_across_schemas() {
        let req = request(Some("[a].[Foo],[b].[Foo],[a].[Bar]"), None, None, Some("Foo"));
        let selection = resolve(&req, &catalog()).await.unwrap();
        assert_eq!(
            names(&selection),
            vec![
                ("a.Foo".to_string(), TableMode::CreateOnly),
                ("b.Foo".to_string(), TableMode::CreateOnly),
                ("a.Bar".to_string(), TableMode::CreateAndCopy),
            ]
        );
    }

    #[tokio::test]
    async fn test_unqualified_table_expands_across_schemas() {
        let req = request(Some("Foo,dbo.Orders"), None, None, None);
        let selection = resolve(&req, &catalog()).await.unwrap();
        let tables: Vec<String> = selection.tables.iter().map(|t| t.table.full_name()).collect();
        assert_eq!(tables, vec!["a.Foo", "b.Foo", "dbo.Orders"]);
    }

    #[tokio::test]
    async fn test_unmatched_entries_warn() {
        let req = request(Some("dbo.Orders,Missing"), None, None, Some("dbo.MasUser"));
        let selection = resolve(&req, &catalog()).await.unwrap();
        assert_eq!(selection.len(), 1);
        assert_eq!(
            selection.warnings,
            vec![
                SelectionWarning::UnmatchedTable("Missing".to_string()),
                SelectionWarning::UnmatchedCreateOnly("dbo.MasUser".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicate_tables_dropped() {
        let req = request(Some("dbo.Orders,DBO.orders,Orders"), None, None, None);
        let selection = resolve(&req, &catalog()).await.unwrap();
        let tables: Vec<String> = selection.tables.iter().map(|t| t.table.full_name()).collect();
        assert_eq!(tables, vec!["dbo.Orders", "sales.Orders"]);
    }

    #[test]
    fn test_apply_modes_without_catalog() {
        let tables = vec![TableRef::new("dbo", "MasUser"), TableRef::new("dbo", "Orders")];
        let (selected, warnings) = apply_modes(&tables, &[TablePattern::unqualified("masuser")]);
        assert_eq!(selected[0].mode, TableMode::CreateOnly);
        assert_eq!(selected[1].mode, TableMode::CreateAndCopy);
        assert!(warnings.is_empty());
    }
}
