//! PostgreSQL target database operations.

pub mod copy;
pub mod ddl;

use crate::config::TargetConfig;
use crate::error::{MigrateError, Result};
use crate::identifier::{qualify_pg, quote_pg};
use crate::typemap::ColumnDef;
use crate::value::Batch;
use async_trait::async_trait;
use bytes::BytesMut;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::SinkExt;
use serde::{Deserialize, Serialize};
use tokio_postgres::error::SqlState;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info};

/// Result of applying table DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdlOutcome {
    /// The table was created by this call.
    Created,

    /// The table was already present and left untouched.
    AlreadyExists,
}

/// Trait for target database operations.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Create `schema.table` with the given columns if it is absent.
    ///
    /// An existing table is reported as [`DdlOutcome::AlreadyExists`] and is
    /// never dropped or altered.
    async fn apply_ddl(&self, schema: &str, table: &str, columns: &[ColumnDef])
        -> Result<DdlOutcome>;

    /// Bulk-load one batch of rows. Returns the number of rows written.
    async fn copy_batch(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        batch: Batch,
    ) -> Result<u64>;

    /// Close all connections.
    async fn close(&self);
}

/// PostgreSQL target pool implementation.
pub struct PgWriter {
    pool: Pool,
}

impl PgWriter {
    /// Create a new PostgreSQL target pool and check that it can connect.
    pub async fn new(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(max_conns)
            .build()
            .map_err(|e| MigrateError::pool(e.to_string(), "building PostgreSQL pool"))?;

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), "connecting to PostgreSQL"))?;

        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (pool_size={})",
            config.host, config.port, config.database, max_conns
        );

        Ok(Self { pool })
    }

    async fn get_client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), context.to_string()))
    }
}

#[async_trait]
impl TargetWriter for PgWriter {
    async fn apply_ddl(
        &self,
        schema: &str,
        table: &str,
        columns: &[ColumnDef],
    ) -> Result<DdlOutcome> {
        let client = self.get_client("apply_ddl").await?;

        let row = client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = $1 AND table_name = $2
                )",
                &[&schema, &table],
            )
            .await?;
        let exists: bool = row.get(0);
        if exists {
            debug!("Table {}.{} already exists", schema, table);
            return Ok(DdlOutcome::AlreadyExists);
        }

        let sql = ddl::table_plan_sql(schema, table, columns)?;
        match client.batch_execute(&sql).await {
            Ok(()) => {
                debug!("Created table {}.{}", schema, table);
                Ok(DdlOutcome::Created)
            }
            // Lost a race with another session creating the same table
            Err(e) if e.code() == Some(&SqlState::DUPLICATE_TABLE) => {
                Ok(DdlOutcome::AlreadyExists)
            }
            Err(e) => Err(MigrateError::Target(e)),
        }
    }

    async fn copy_batch(
        &self,
        schema: &str,
        table: &str,
        cols: &[String],
        batch: Batch,
    ) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let client = self.get_client("copy_batch").await?;

        let col_list = cols
            .iter()
            .map(|c| quote_pg(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        // COPY statement with text format
        let copy_stmt = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT text)",
            qualify_pg(schema, table)?,
            col_list
        );

        let sink = client.copy_in(copy_stmt.as_str()).await?;
        futures::pin_mut!(sink);

        // Flush in chunks to bound buffer size
        const CHUNK_SIZE: usize = 10_000;
        let mut buf = BytesMut::with_capacity(1024 * 1024);
        let row_count = batch.rows.len();

        for (i, row) in batch.rows.iter().enumerate() {
            copy::encode_row(&mut buf, row);

            if (i + 1) % CHUNK_SIZE == 0 || i + 1 == row_count {
                sink.send(buf.split().freeze()).await?;
            }
        }

        let copied = sink.finish().await?;
        Ok(copied)
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// Writer used when no target connection is wanted (dry runs).
///
/// Every call fails; the driver never calls it in dry-run mode.
#[derive(Debug, Default)]
pub struct NoopWriter;

#[async_trait]
impl TargetWriter for NoopWriter {
    async fn apply_ddl(
        &self,
        schema: &str,
        table: &str,
        _columns: &[ColumnDef],
    ) -> Result<DdlOutcome> {
        Err(MigrateError::Config(format!(
            "no target connection: refusing DDL for {}.{}",
            schema, table
        )))
    }

    async fn copy_batch(
        &self,
        schema: &str,
        table: &str,
        _cols: &[String],
        _batch: Batch,
    ) -> Result<u64> {
        Err(MigrateError::Config(format!(
            "no target connection: refusing COPY into {}.{}",
            schema, table
        )))
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_writer_refuses_calls() {
        let writer = NoopWriter;
        assert!(writer.apply_ddl("public", "t", &[]).await.is_err());
        assert!(writer
            .copy_batch("public", "t", &[], Batch::default())
            .await
            .is_err());
    }
}
