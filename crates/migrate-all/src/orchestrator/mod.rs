//! Migration driver - per-table workflow coordinator.

mod report;

pub use report::{
    MigrationReport, RunSummary, SchemaStatus, TableError, TableErrorKind, TableOutcome,
    TablePhase,
};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::MigrateError;
use crate::selection::{SelectedTable, SelectionSpec, TableMode};
use crate::source::SourceCatalog;
use crate::target::{ddl, DdlOutcome, TargetWriter};
use crate::transfer::{export_path, TransferEngine, TransferJob};
use crate::typemap::translate_columns;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Options controlling a driver run.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Log DDL instead of applying it, and copy no rows.
    pub dry_run: bool,

    /// Rows per copy batch.
    pub batch_size: usize,

    /// Directory for staging files. `None` disables staging.
    pub export_dir: Option<PathBuf>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_size: DEFAULT_BATCH_SIZE,
            export_dir: None,
        }
    }
}

/// Migration driver.
///
/// Tables are processed strictly one at a time, in selection order. A
/// failure is recorded on that table's outcome and the run moves on.
pub struct MigrationDriver {
    source: Arc<dyn SourceCatalog>,
    target: Arc<dyn TargetWriter>,
    options: DriverOptions,
}

impl MigrationDriver {
    /// Create a new driver.
    pub fn new(
        source: Arc<dyn SourceCatalog>,
        target: Arc<dyn TargetWriter>,
        options: DriverOptions,
    ) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    /// Run the migration for every selected table.
    ///
    /// Cancellation is checked before each table; tables not yet started are
    /// reported as not attempted.
    pub async fn run(&self, selection: &SelectionSpec, cancel: CancellationToken) -> MigrationReport {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let dry_run = self.options.dry_run;

        info!(
            "Starting migration run: {} ({} tables -> schema {}{})",
            run_id,
            selection.len(),
            selection.target_schema,
            if dry_run { ", dry run" } else { "" }
        );

        let engine = TransferEngine::new(self.source.clone(), self.target.clone());
        let mut outcomes = Vec::with_capacity(selection.len());
        let mut cancelled = false;

        for (i, selected) in selection.tables.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "Cancellation requested, stopping before {} ({} tables not attempted)",
                    selected.table,
                    selection.len() - i
                );
                cancelled = true;
                break;
            }

            info!(
                "[{}/{}] Migrating {} -> {}.{} ({})",
                i + 1,
                selection.len(),
                selected.table,
                selection.target_schema,
                selected.table.name,
                selected.mode
            );

            let outcome = self
                .migrate_table(&engine, selected, &selection.target_schema)
                .await;

            match &outcome.error {
                Some(err) => error!("{}: failed - {}", selected.table, err.message),
                None => debug!("{}: done", selected.table),
            }
            outcomes.push(outcome);
        }

        let completed_at = Utc::now();
        let duration = completed_at - started_at;
        let summary = RunSummary::from_outcomes(selection.len(), &outcomes);

        info!(
            "Migration run {} finished: {} copied, {} schema-only, {} failed, {} not attempted",
            run_id, summary.succeeded, summary.schema_only, summary.failed, summary.not_attempted
        );

        MigrationReport {
            run_id,
            started_at,
            completed_at,
            duration_seconds: duration.num_milliseconds() as f64 / 1000.0,
            dry_run,
            cancelled,
            target_schema: selection.target_schema.clone(),
            outcomes,
            warnings: selection.warnings.clone(),
            summary,
        }
    }

    /// Close both collaborators.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }

    async fn migrate_table(
        &self,
        engine: &TransferEngine,
        selected: &SelectedTable,
        target_schema: &str,
    ) -> TableOutcome {
        let table = &selected.table;
        let dry_run = self.options.dry_run;
        let mut run = TableRun::new(selected, target_schema, dry_run);

        // Schema read
        run.advance(TablePhase::SchemaTranslating);
        let columns = match self.source.columns(table).await {
            Ok(columns) if columns.is_empty() => {
                let err = MigrateError::schema_read(table.full_name(), "table not found in source catalog");
                return run.fail(&err, TableErrorKind::SchemaRead);
            }
            Ok(columns) => columns,
            Err(e) => return run.fail(&e, TableErrorKind::SchemaRead),
        };

        // Translation
        let defs = match translate_columns(table, &columns) {
            Ok(defs) => defs,
            Err(e) => return run.fail(&e, TableErrorKind::UnsupportedType),
        };
        let plan = match ddl::table_plan_sql(target_schema, &table.name, &defs) {
            Ok(plan) => plan,
            Err(e) => return run.fail(&e, TableErrorKind::SchemaApply),
        };
        debug!("{}: DDL\n{}", table, plan);
        run.outcome.ddl = Some(plan);

        // Apply
        if dry_run {
            if let Some(plan) = &run.outcome.ddl {
                info!("[dry-run] {}:\n{}", table, plan);
            }
            run.outcome.schema_status = SchemaStatus::DryRun;
        } else {
            match self.target.apply_ddl(target_schema, &table.name, &defs).await {
                Ok(DdlOutcome::Created) => {
                    info!("{}: created {}.{}", table, target_schema, table.name);
                    run.outcome.schema_status = SchemaStatus::Created;
                }
                Ok(DdlOutcome::AlreadyExists) => {
                    info!(
                        "{}: {}.{} already exists, leaving it untouched",
                        table, target_schema, table.name
                    );
                    run.outcome.schema_status = SchemaStatus::AlreadyExists;
                }
                Err(e) => return run.fail(&e, TableErrorKind::SchemaApply),
            }
            run.outcome.schema_created = true;
        }
        run.advance(TablePhase::SchemaApplied);

        if selected.mode == TableMode::CreateOnly {
            info!("{}: create-only, skipping data copy", table);
            return run.finish();
        }
        if dry_run {
            info!("[dry-run] {}: would copy rows into {}.{}", table, target_schema, table.name);
            return run.finish();
        }

        // Copy
        run.advance(TablePhase::DataCopying);
        let staging = self
            .options
            .export_dir
            .as_deref()
            .map(|dir| export_path(dir, table));
        let job = TransferJob {
            table: table.clone(),
            columns,
            target_schema: target_schema.to_string(),
            batch_size: self.options.batch_size,
            export_path: staging.clone(),
        };

        match engine.execute(&job).await {
            Ok(stats) => {
                run.outcome.rows_copied = Some(stats.rows);
                run.outcome.export_path = staging;
                run.advance(TablePhase::DataCopied);
                run.finish()
            }
            Err(e) => {
                if let MigrateError::DataCopy { rows_copied, .. } = &e {
                    run.outcome.rows_copied = Some(*rows_copied);
                }
                run.fail(&e, TableErrorKind::DataCopy)
            }
        }
    }
}

/// Tracks one table through its phases.
struct TableRun {
    outcome: TableOutcome,
}

impl TableRun {
    fn new(selected: &SelectedTable, target_schema: &str, dry_run: bool) -> Self {
        Self {
            outcome: TableOutcome {
                table: selected.table.clone(),
                target: format!("{}.{}", target_schema, selected.table.name),
                mode: selected.mode,
                phase: TablePhase::Pending,
                schema_created: false,
                schema_status: SchemaStatus::NotApplied,
                rows_copied: None,
                dry_run,
                error: None,
                ddl: None,
                export_path: None,
            },
        }
    }

    fn advance(&mut self, next: TablePhase) {
        let current = self.outcome.phase;
        debug_assert!(
            current.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            current,
            next
        );
        debug!("{}: {:?} -> {:?}", self.outcome.table, current, next);
        self.outcome.phase = next;
    }

    fn fail(mut self, err: &MigrateError, fallback: TableErrorKind) -> TableOutcome {
        self.outcome.error = Some(TableError::from_error(err, fallback));
        self.advance(TablePhase::Failed);
        self.outcome
    }

    fn finish(mut self) -> TableOutcome {
        self.advance(TablePhase::Done);
        self.outcome
    }
}
