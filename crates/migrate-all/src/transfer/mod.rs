//! Per-table row transfer from source to target.
//!
//! Rows are read by a producer task owned by the source catalog and arrive
//! over a bounded channel, so reading the next batch overlaps with writing
//! the current one. Batches are written in order on the calling task, and
//! the producer is joined once its channel closes.

mod export;

pub use export::{export_path, ExportFile};

use crate::error::{MigrateError, Result};
use crate::source::{Column, SourceCatalog, TableRef};
use crate::target::TargetWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Transfer job for a single table.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Source table.
    pub table: TableRef,

    /// Source columns, in the order rows are read and written.
    pub columns: Vec<Column>,

    /// Target schema name.
    pub target_schema: String,

    /// Rows per batch.
    pub batch_size: usize,

    /// Staging file, if rows should also be written to disk.
    pub export_path: Option<PathBuf>,
}

/// Statistics from a transfer job.
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    /// Total rows transferred.
    pub rows: i64,

    /// Batches written.
    pub batches: usize,

    /// Time spent waiting on the source.
    pub read_time: Duration,

    /// Time spent writing.
    pub write_time: Duration,

    /// Wall-clock time for the whole table.
    pub elapsed: Duration,
}

impl TransferStats {
    pub fn rows_per_second(&self) -> i64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.rows as f64 / secs) as i64
        } else {
            0
        }
    }
}

/// Copies rows for one table at a time.
pub struct TransferEngine {
    source: Arc<dyn SourceCatalog>,
    target: Arc<dyn TargetWriter>,
}

impl TransferEngine {
    pub fn new(source: Arc<dyn SourceCatalog>, target: Arc<dyn TargetWriter>) -> Self {
        Self { source, target }
    }

    /// Copy every row of the job's table.
    ///
    /// Any failure is returned as `DataCopy` carrying the rows already
    /// written. Nothing is retried.
    pub async fn execute(&self, job: &TransferJob) -> Result<TransferStats> {
        let start = Instant::now();
        let table_name = job.table.full_name();
        let col_names: Vec<String> = job.columns.iter().map(|c| c.name.clone()).collect();
        let mut stats = TransferStats::default();

        let mut export = match &job.export_path {
            Some(path) => Some(
                ExportFile::create(path)
                    .await
                    .map_err(|e| copy_failed(&table_name, 0, MigrateError::Io(e)))?,
            ),
            None => None,
        };

        let mut reader = self.source.rows(&job.table, &job.columns, job.batch_size);

        loop {
            let read_start = Instant::now();
            let Some(received) = reader.next().await else {
                break;
            };
            stats.read_time += read_start.elapsed();

            let batch = received.map_err(|e| copy_failed(&table_name, stats.rows, e))?;

            if let Some(file) = export.as_mut() {
                file.write_batch(&batch)
                    .await
                    .map_err(|e| copy_failed(&table_name, stats.rows, MigrateError::Io(e)))?;
            }

            let write_start = Instant::now();
            let written = self
                .target
                .copy_batch(&job.target_schema, &job.table.name, &col_names, batch)
                .await
                .map_err(|e| copy_failed(&table_name, stats.rows, e))?;
            stats.write_time += write_start.elapsed();

            stats.rows += written as i64;
            stats.batches += 1;
            debug!("{}: batch {} written, {} rows so far", table_name, stats.batches, stats.rows);
        }

        // A closed channel is also what a crashed reader leaves behind
        reader.finish().await.map_err(|e| {
            MigrateError::data_copy(&table_name, stats.rows, format!("Reader task failed: {}", e))
        })?;

        if let Some(file) = export {
            let (path, rows) = file
                .finish()
                .await
                .map_err(|e| copy_failed(&table_name, stats.rows, MigrateError::Io(e)))?;
            debug!("{}: staged {} rows to {}", table_name, rows, path.display());
        }

        stats.elapsed = start.elapsed();
        info!(
            "{}: copied {} rows in {:?} ({} rows/sec)",
            table_name,
            stats.rows,
            stats.elapsed,
            stats.rows_per_second()
        );
        Ok(stats)
    }
}

fn copy_failed(table: &str, rows_copied: i64, err: MigrateError) -> MigrateError {
    match err {
        MigrateError::DataCopy { .. } => err,
        other => MigrateError::data_copy(table, rows_copied, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_failed_keeps_partial_rows() {
        let err = copy_failed("dbo.Orders", 250, MigrateError::Config("boom".into()));
        match err {
            MigrateError::DataCopy { table, rows_copied, message } => {
                assert_eq!(table, "dbo.Orders");
                assert_eq!(rows_copied, 250);
                assert!(message.contains("boom"));
            }
            other => panic!("expected DataCopy, got {:?}", other),
        }
    }

    #[test]
    fn test_rows_per_second() {
        let stats = TransferStats {
            rows: 1000,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.rows_per_second(), 500);
        assert_eq!(TransferStats::default().rows_per_second(), 0);
    }
}
