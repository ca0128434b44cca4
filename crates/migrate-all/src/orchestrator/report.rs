//! Per-table outcomes and the run report.

use crate::error::{MigrateError, Result, EXIT_CANCELLED, EXIT_SUCCESS, EXIT_TABLE_FAILURES};
use crate::selection::{SelectionWarning, TableMode};
use crate::source::TableRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Per-table lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TablePhase {
    Pending,
    SchemaTranslating,
    SchemaApplied,
    DataCopying,
    DataCopied,
    Done,
    Failed,
}

impl TablePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TablePhase::Done | TablePhase::Failed)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: TablePhase) -> bool {
        use TablePhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, SchemaTranslating)
            | (SchemaTranslating, SchemaApplied)
            | (SchemaApplied, DataCopying)
            | (SchemaApplied, Done)
            | (DataCopying, DataCopied)
            | (DataCopied, Done) => true,
            _ => false,
        }
    }
}

/// What happened to the target table's DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStatus {
    /// DDL was not applied (failure before the apply step).
    NotApplied,

    /// The table was created by this run.
    Created,

    /// The table already existed and was left untouched.
    AlreadyExists,

    /// DDL was only logged.
    DryRun,
}

/// Category of a per-table failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableErrorKind {
    SchemaRead,
    UnsupportedType,
    SchemaApply,
    DataCopy,
}

/// A per-table failure recorded on the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableError {
    pub kind: TableErrorKind,
    pub message: String,
}

impl TableError {
    /// Classify `err`. Errors that are not table-scoped take `fallback`.
    pub fn from_error(err: &MigrateError, fallback: TableErrorKind) -> Self {
        let kind = match err {
            MigrateError::SchemaRead { .. } => TableErrorKind::SchemaRead,
            MigrateError::UnsupportedType { .. } => TableErrorKind::UnsupportedType,
            MigrateError::SchemaApply { .. } => TableErrorKind::SchemaApply,
            MigrateError::DataCopy { .. } => TableErrorKind::DataCopy,
            _ => fallback,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Result of processing one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    /// Source table.
    pub table: TableRef,

    /// Target table as `schema.name`.
    pub target: String,

    pub mode: TableMode,

    /// Final phase: `Done` or `Failed`.
    pub phase: TablePhase,

    /// True when the target table exists after this run (created or already present).
    pub schema_created: bool,

    pub schema_status: SchemaStatus,

    /// Rows copied. `None` for create-only tables, dry runs, and failures
    /// before copying started.
    pub rows_copied: Option<i64>,

    pub dry_run: bool,

    pub error: Option<TableError>,

    /// Translated DDL, when translation succeeded.
    pub ddl: Option<String>,

    /// Staging file written for this table.
    pub export_path: Option<PathBuf>,
}

impl TableOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Counts over a run's outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Tables in the selection.
    pub total: usize,

    /// Create-and-copy tables that reached `Done`.
    pub succeeded: usize,

    /// Create-only tables that reached `Done`.
    pub schema_only: usize,

    /// Tables with an error.
    pub failed: usize,

    /// Tables skipped because the run was cancelled.
    pub not_attempted: usize,

    /// Rows copied across all tables.
    pub rows_copied: i64,
}

impl RunSummary {
    pub fn from_outcomes(total: usize, outcomes: &[TableOutcome]) -> Self {
        let mut summary = RunSummary {
            total,
            not_attempted: total.saturating_sub(outcomes.len()),
            ..Default::default()
        };
        for outcome in outcomes {
            match (&outcome.error, outcome.mode) {
                (Some(_), _) => summary.failed += 1,
                (None, TableMode::CreateOnly) => summary.schema_only += 1,
                (None, TableMode::CreateAndCopy) => summary.succeeded += 1,
            }
            summary.rows_copied += outcome.rows_copied.unwrap_or(0);
        }
        summary
    }
}

/// Report for one migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    pub duration_seconds: f64,

    pub dry_run: bool,

    /// True when the run stopped early on a cancellation request.
    pub cancelled: bool,

    pub target_schema: String,

    /// Outcomes in selection order.
    pub outcomes: Vec<TableOutcome>,

    pub warnings: Vec<SelectionWarning>,

    pub summary: RunSummary,
}

impl MigrationReport {
    /// True when every selected table reached `Done` without error.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.summary.failed == 0 && self.summary.not_attempted == 0
    }

    /// Failed outcomes, in selection order.
    pub fn failures(&self) -> impl Iterator<Item = &TableOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> u8 {
        if self.cancelled {
            EXIT_CANCELLED
        } else if self.is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_TABLE_FAILURES
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable summary: one line per table plus totals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let heading = if self.dry_run {
            "Migration summary (dry run):"
        } else {
            "Migration summary:"
        };
        let _ = writeln!(out, "{}", heading);

        for outcome in &self.outcomes {
            let detail = match (&outcome.error, outcome.mode) {
                (Some(err), _) => format!("FAILED ({:?}): {}", err.kind, err.message),
                (None, TableMode::CreateOnly) => "(create-only)".to_string(),
                (None, TableMode::CreateAndCopy) if outcome.dry_run => "(dry run)".to_string(),
                (None, TableMode::CreateAndCopy) => {
                    format!("{} rows", outcome.rows_copied.unwrap_or(0))
                }
            };
            let _ = writeln!(out, "- {} -> {}: {}", outcome.table, outcome.target, detail);
        }

        for warning in &self.warnings {
            let _ = writeln!(out, "warning: {}", warning);
        }

        let s = &self.summary;
        let _ = writeln!(
            out,
            "{} tables: {} copied, {} schema-only, {} failed, {} not attempted ({} rows, {:.1}s)",
            s.total, s.succeeded, s.schema_only, s.failed, s.not_attempted, s.rows_copied,
            self.duration_seconds
        );
        if self.cancelled {
            let _ = writeln!(out, "Run cancelled before all tables were processed");
        }
        out
    }
}
