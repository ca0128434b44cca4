//! # migrate-all
//!
//! Schema-and-data migration from Microsoft SQL Server to PostgreSQL.
//!
//! This library provides:
//!
//! - **Table selection** from an explicit table list or source-schema filters,
//!   with a create-only subset that gets schema but no rows
//! - **Schema translation** through a fixed type-mapping table
//! - **Idempotent table creation** that never drops or alters existing tables
//! - **Bulk transfers** using PostgreSQL COPY protocol, optionally staged to disk
//! - **Dry runs** that log the planned DDL without touching the target
//! - **pgloader load files** as an alternative to the built-in driver
//!
//! ## Example
//!
//! ```rust,no_run
//! use migrate_all::{resolve, Config, DriverOptions, MigrationDriver, MssqlCatalog, PgWriter, SelectionRequest};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> migrate_all::Result<()> {
//!     let config = Config::load(".env")?;
//!     let request = SelectionRequest::from_args(Some("dbo.Orders"), None, None, None, "public")?;
//!
//!     let source = Arc::new(MssqlCatalog::new(config.source.clone(), 4).await?);
//!     let selection = resolve(&request, source.as_ref()).await?;
//!     let target = Arc::new(PgWriter::new(&config.target, 4).await?);
//!
//!     let driver = MigrationDriver::new(source, target, DriverOptions::default());
//!     let report = driver.run(&selection, CancellationToken::new()).await;
//!     println!("{}", report.render_text());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod identifier;
pub mod orchestrator;
pub mod pgloader;
pub mod selection;
pub mod source;
pub mod target;
pub mod transfer;
pub mod typemap;
pub mod value;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, MigrationMode, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{DriverOptions, MigrationDriver, MigrationReport, TableOutcome};
pub use selection::{resolve, SelectionRequest, SelectionSpec, TableMode, TablePattern};
pub use source::{Column, MssqlCatalog, RowReader, SourceCatalog, TableRef};
pub use target::{DdlOutcome, NoopWriter, PgWriter, TargetWriter};
pub use transfer::{TransferEngine, TransferJob, TransferStats};
pub use value::{Batch, SqlValue};
