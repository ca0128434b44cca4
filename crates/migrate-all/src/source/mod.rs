//! MSSQL source catalog operations.

mod reader;
mod types;

pub use reader::{RowReader, READ_AHEAD_BATCHES};
pub use types::*;

use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};
use crate::identifier::{qualify_mssql, quote_mssql};
use crate::value::{Batch, SqlNullType, SqlValue};
use async_trait::async_trait;
use bb8::Pool;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};
use uuid::Uuid;

/// Widest precision `rust_decimal` holds without overflow.
const MAX_DECIMAL_PRECISION: i32 = 28;

/// Trait for source catalog operations.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// List base tables, restricted to the given schemas when non-empty.
    ///
    /// Ordered by schema, then table name.
    async fn list_tables(&self, schemas: &[String]) -> Result<Vec<TableRef>>;

    /// Column definitions in ordinal order.
    ///
    /// Fails with `SchemaRead` when the table does not exist.
    async fn columns(&self, table: &TableRef) -> Result<Vec<Column>>;

    /// Stream the table's rows in batches of at most `batch_size`.
    ///
    /// Each call issues a fresh query; the reader yields `Err` and then
    /// closes if reading fails part way.
    fn rows(&self, table: &TableRef, columns: &[Column], batch_size: usize) -> RowReader;

    /// Close all connections.
    async fn close(&self);
}

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: SourceConfig,
}

impl TiberiusConnectionManager {
    fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(&self.config.user, &self.config.password));

        match self.config.encrypt.to_lowercase().as_str() {
            "false" | "no" | "0" | "disable" => {
                config.encryption(EncryptionLevel::NotSupported);
            }
            _ => {
                if self.config.trust_server_cert {
                    config.trust_cert();
                }
                config.encryption(EncryptionLevel::Required);
            }
        }

        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// MSSQL catalog reader backed by a bb8 connection pool.
pub struct MssqlCatalog {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlCatalog {
    /// Create a new MSSQL catalog reader and check that it can connect.
    pub async fn new(config: SourceConfig, max_size: u32) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), "building MSSQL pool"))?;

        // Test connection
        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| MigrateError::pool(e.to_string(), "connecting to MSSQL"))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!(
            "Connected to MSSQL: {}:{}/{} (pool_size={})",
            config.host, config.port, config.database, max_size
        );

        Ok(Self { pool })
    }
}

#[async_trait]
impl SourceCatalog for MssqlCatalog {
    async fn list_tables(&self, schemas: &[String]) -> Result<Vec<TableRef>> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), "listing tables"))?;

        let mut sql = String::from(
            "SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE'",
        );
        if !schemas.is_empty() {
            let placeholders: Vec<String> =
                (1..=schemas.len()).map(|i| format!("@P{}", i)).collect();
            sql.push_str(&format!(" AND TABLE_SCHEMA IN ({})", placeholders.join(", ")));
        }
        sql.push_str(" ORDER BY TABLE_SCHEMA, TABLE_NAME");

        let mut query = Query::new(sql);
        for schema in schemas {
            query.bind(schema.as_str());
        }

        let rows = query.query(&mut client).await?.into_first_result().await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let schema: &str = row.try_get(0)?.unwrap_or_default();
            let name: &str = row.try_get(1)?.unwrap_or_default();
            tables.push(TableRef::new(schema, name));
        }

        info!("Found {} tables in source catalog", tables.len());
        Ok(tables)
    }

    async fn columns(&self, table: &TableRef) -> Result<Vec<Column>> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e.to_string(), format!("reading columns of {}", table)))?;

        let sql = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                CAST(ISNULL(CHARACTER_MAXIMUM_LENGTH, 0) AS INT),
                CAST(ISNULL(NUMERIC_PRECISION, 0) AS INT),
                CAST(ISNULL(NUMERIC_SCALE, 0) AS INT),
                CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
                COLUMN_DEFAULT,
                ORDINAL_POSITION
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
            ORDER BY ORDINAL_POSITION
        "#;

        let mut query = Query::new(sql);
        query.bind(table.schema.as_str());
        query.bind(table.name.as_str());

        let rows = query
            .query(&mut client)
            .await
            .map_err(|e| MigrateError::schema_read(table.full_name(), e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| MigrateError::schema_read(table.full_name(), e.to_string()))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(Column {
                name: row.try_get::<&str, _>(0)?.unwrap_or_default().to_string(),
                data_type: row.try_get::<&str, _>(1)?.unwrap_or_default().to_string(),
                max_length: row.try_get::<i32, _>(2)?.unwrap_or(0),
                precision: row.try_get::<i32, _>(3)?.unwrap_or(0),
                scale: row.try_get::<i32, _>(4)?.unwrap_or(0),
                is_nullable: row.try_get::<i32, _>(5)?.unwrap_or(0) == 1,
                default: row.try_get::<&str, _>(6)?.map(str::to_string),
                ordinal_pos: row.try_get::<i32, _>(7)?.unwrap_or(0),
            });
        }

        if columns.is_empty() {
            return Err(MigrateError::schema_read(
                table.full_name(),
                "table not found in source catalog",
            ));
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    fn rows(&self, table: &TableRef, columns: &[Column], batch_size: usize) -> RowReader {
        let pool = self.pool.clone();
        let table = table.clone();
        let columns = columns.to_vec();

        RowReader::spawn(move |tx| async move {
            stream_rows(&pool, &table, &columns, batch_size, &tx).await
        })
    }

    async fn close(&self) {
        // bb8 closes pooled connections when the pool is dropped
        debug!("Releasing MSSQL pool ({} idle connections)", self.pool.state().idle_connections);
    }
}

/// Read every row of `table` and forward them in batches.
async fn stream_rows(
    pool: &Pool<TiberiusConnectionManager>,
    table: &TableRef,
    columns: &[Column],
    batch_size: usize,
    tx: &mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let mut client = pool
        .get()
        .await
        .map_err(|e| MigrateError::pool(e.to_string(), format!("reading rows of {}", table)))?;

    let col_list = columns
        .iter()
        .map(|c| quote_mssql(&c.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let sql = format!(
        "SELECT {} FROM {}",
        col_list,
        qualify_mssql(&table.schema, &table.name)?
    );
    debug!("{}: {}", table, sql);

    let batch_size = batch_size.max(1);
    let mut stream = client.simple_query(sql).await?.into_row_stream();
    let mut rows = Vec::with_capacity(batch_size);

    while let Some(row) = stream.try_next().await? {
        rows.push(convert_row(&row, columns)?);
        if rows.len() >= batch_size {
            let full = std::mem::replace(&mut rows, Vec::with_capacity(batch_size));
            if tx.send(Ok(Batch::new(full))).await.is_err() {
                // Receiver gone: the copy was abandoned
                return Ok(());
            }
        }
    }

    if !rows.is_empty() {
        let _ = tx.send(Ok(Batch::new(rows))).await;
    }
    Ok(())
}

/// Convert a tiberius row to values in column order.
fn convert_row(row: &Row, columns: &[Column]) -> Result<Vec<SqlValue>> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| convert_row_value(row, idx, col))
        .collect()
}

fn get_or_null<'a, R, F>(row: &'a Row, idx: usize, null: SqlNullType, f: F) -> Result<SqlValue>
where
    R: FromSql<'a>,
    F: FnOnce(R) -> SqlValue,
{
    Ok(row
        .try_get::<R, _>(idx)?
        .map(f)
        .unwrap_or(SqlValue::Null(null)))
}

/// Convert a row value to SqlValue based on the column type.
fn convert_row_value(row: &Row, idx: usize, col: &Column) -> Result<SqlValue> {
    match col.data_type.to_lowercase().as_str() {
        "bit" => get_or_null(row, idx, SqlNullType::Bool, SqlValue::Bool),
        "tinyint" => get_or_null(row, idx, SqlNullType::I16, |v: u8| SqlValue::I16(v as i16)),
        "smallint" => get_or_null(row, idx, SqlNullType::I16, SqlValue::I16),
        "int" => get_or_null(row, idx, SqlNullType::I32, SqlValue::I32),
        "bigint" => get_or_null(row, idx, SqlNullType::I64, SqlValue::I64),
        "real" => get_or_null(row, idx, SqlNullType::F32, SqlValue::F32),
        "float" => get_or_null(row, idx, SqlNullType::F64, SqlValue::F64),
        "uniqueidentifier" => get_or_null(row, idx, SqlNullType::Uuid, |v: Uuid| SqlValue::Uuid(v)),
        "datetime" | "datetime2" | "smalldatetime" => {
            get_or_null(row, idx, SqlNullType::DateTime, |v: NaiveDateTime| {
                SqlValue::DateTime(v)
            })
        }
        "datetimeoffset" => get_or_null(row, idx, SqlNullType::DateTimeOffset, |v: DateTime<FixedOffset>| {
            SqlValue::DateTimeOffset(v)
        }),
        "date" => get_or_null(row, idx, SqlNullType::Date, |v: NaiveDate| SqlValue::Date(v)),
        "time" => get_or_null(row, idx, SqlNullType::Time, |v: NaiveTime| SqlValue::Time(v)),
        "binary" | "varbinary" | "image" => {
            get_or_null(row, idx, SqlNullType::Bytes, |v: &[u8]| SqlValue::Bytes(v.to_vec()))
        }
        // Values past 28 digits overflow rust_decimal; keep them as exact text
        "decimal" | "numeric" if col.precision > MAX_DECIMAL_PRECISION => {
            get_or_null(row, idx, SqlNullType::Decimal, |v: Numeric| {
                SqlValue::NumericText(numeric_text(v.value(), v.scale()))
            })
        }
        "decimal" | "numeric" => get_or_null(row, idx, SqlNullType::Decimal, |v: Decimal| {
            SqlValue::Decimal(v)
        }),
        // tiberius decodes money as f64; money has four decimal places
        "money" | "smallmoney" => get_or_null(row, idx, SqlNullType::Decimal, |v: f64| {
            Decimal::try_from(v)
                .map(|d| SqlValue::Decimal(d.round_dp(4)))
                .unwrap_or(SqlValue::F64(v))
        }),
        // char, nchar, varchar, nvarchar, text, ntext
        _ => get_or_null(row, idx, SqlNullType::String, |v: &str| SqlValue::String(v.to_string())),
    }
}

/// Render an unscaled integer with `scale` fractional digits.
fn numeric_text(value: i128, scale: u8) -> String {
    let digits = value.unsigned_abs().to_string();
    let sign = if value < 0 { "-" } else { "" };
    let scale = scale as usize;
    if scale == 0 {
        return format!("{}{}", sign, digits);
    }
    let padded = format!("{:0>width$}", digits, width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    format!("{}{}.{}", sign, int_part, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_text() {
        assert_eq!(numeric_text(12345, 2), "123.45");
        assert_eq!(numeric_text(-5, 3), "-0.005");
        assert_eq!(numeric_text(42, 0), "42");
        assert_eq!(numeric_text(0, 30), "0.000000000000000000000000000000");
        assert_eq!(
            numeric_text(1_000_000_000_000_000_000_000_000_000_000_001, 30),
            "1000.000000000000000000000000000001"
        );
    }
}
