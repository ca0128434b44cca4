//! pgloader load-file generation.
//!
//! In pgloader mode the selection is handed to pgloader instead of the
//! migration driver: one load file for tables that are created and copied,
//! and one for create-only tables.

use crate::config::{SourceConfig, TargetConfig};
use crate::error::Result;
use crate::selection::{SelectionSpec, TableMode};
use crate::source::TableRef;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for the create-and-copy load file.
pub const COPY_LOAD_FILE: &str = "migrate_all.load";

/// File name for the create-only load file.
pub const SCHEMA_ONLY_LOAD_FILE: &str = "migrate_all_schema_only.load";

const REDACTED: &str = "****";

/// A rendered pgloader command file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFile {
    pub file_name: &'static str,
    pub mode: TableMode,
    pub contents: String,
}

/// Render the load files for a selection. Modes with no tables get no file.
pub fn render_load_files(
    source: &SourceConfig,
    target: &TargetConfig,
    selection: &SelectionSpec,
    redact_passwords: bool,
) -> Vec<LoadFile> {
    [
        (TableMode::CreateAndCopy, COPY_LOAD_FILE),
        (TableMode::CreateOnly, SCHEMA_ONLY_LOAD_FILE),
    ]
    .into_iter()
    .filter_map(|(mode, file_name)| {
        let tables: Vec<&TableRef> = selection.tables_in_mode(mode).collect();
        if tables.is_empty() {
            return None;
        }
        Some(LoadFile {
            file_name,
            mode,
            contents: render_load_file(
                source,
                target,
                &selection.target_schema,
                &tables,
                mode,
                redact_passwords,
            ),
        })
    })
    .collect()
}

/// Render one load file for `tables`.
pub fn render_load_file(
    source: &SourceConfig,
    target: &TargetConfig,
    target_schema: &str,
    tables: &[&TableRef],
    mode: TableMode,
    redact_passwords: bool,
) -> String {
    let (source_pass, target_pass) = if redact_passwords {
        (REDACTED, REDACTED)
    } else {
        (source.password.as_str(), target.password.as_str())
    };

    let mut out = String::new();
    let _ = writeln!(out, "LOAD DATABASE");
    let _ = writeln!(
        out,
        "     FROM {}",
        connection_url("mssql", &source.user, source_pass, &source.host, source.port, &source.database)
    );
    let _ = writeln!(
        out,
        "     INTO {}",
        connection_url("postgresql", &target.user, target_pass, &target.host, target.port, &target.database)
    );
    let _ = writeln!(out);

    let options = match mode {
        TableMode::CreateAndCopy => "include no drop, create tables, create no indexes, reset sequences",
        TableMode::CreateOnly => "include no drop, create tables, create no indexes, schema only",
    };
    let _ = writeln!(out, "WITH {}", options);
    let _ = writeln!(out);

    let groups = group_by_schema(tables);

    let includes: Vec<String> = groups
        .iter()
        .map(|(schema, names)| {
            let likes: Vec<String> = names.iter().map(|n| quote_literal(n)).collect();
            format!(
                "TABLE NAMES LIKE {} IN SCHEMA {}",
                likes.join(", "),
                quote_literal(schema)
            )
        })
        .collect();
    let _ = writeln!(out, "INCLUDING ONLY {}", includes.join(",\n               "));
    let _ = writeln!(out);

    let renames: Vec<String> = groups
        .iter()
        .filter(|(schema, _)| !schema.eq_ignore_ascii_case(target_schema))
        .map(|(schema, _)| {
            format!(
                "ALTER SCHEMA {} RENAME TO {}",
                quote_literal(schema),
                quote_literal(target_schema)
            )
        })
        .collect();
    for rename in &renames {
        let _ = writeln!(out, "{}", rename);
    }

    out.push_str(";\n");
    out
}

/// Write the load files into `dir`. In dry-run mode they are only logged.
///
/// Returns the paths written.
pub async fn write_load_files(files: &[LoadFile], dir: &Path, dry_run: bool) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for file in files {
        let path = dir.join(file.file_name);
        if dry_run {
            info!("[dry-run] {} ({}):\n{}", path.display(), file.mode, file.contents);
            continue;
        }
        tokio::fs::write(&path, &file.contents).await?;
        info!("Wrote pgloader load file {}; run: pgloader {}", path.display(), path.display());
        paths.push(path);
    }
    Ok(paths)
}

fn connection_url(scheme: &str, user: &str, password: &str, host: &str, port: u16, database: &str) -> String {
    let credentials = if password.is_empty() {
        urlencoding::encode(user).into_owned()
    } else {
        format!("{}:{}", urlencoding::encode(user), urlencoding::encode(password))
    };
    format!(
        "{}://{}@{}:{}/{}",
        scheme,
        credentials,
        host,
        port,
        urlencoding::encode(database)
    )
}

/// Group table names by schema, keeping first-seen order.
fn group_by_schema<'a>(tables: &[&'a TableRef]) -> Vec<(String, Vec<&'a str>)> {
    let mut groups: Vec<(String, Vec<&'a str>)> = Vec::new();
    for table in tables {
        match groups.iter_mut().find(|(schema, _)| table.in_schema(schema)) {
            Some((_, names)) => names.push(table.name.as_str()),
            None => groups.push((table.schema.clone(), vec![table.name.as_str()])),
        }
    }
    groups
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
