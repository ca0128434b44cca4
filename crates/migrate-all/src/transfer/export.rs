//! On-disk staging of copied rows.

use crate::source::TableRef;
use crate::target::copy::encode_row;
use crate::value::Batch;
use bytes::BytesMut;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Staging file path for a table: `<dir>/<schema>_<table>.tsv`.
pub fn export_path(dir: &Path, table: &TableRef) -> PathBuf {
    let file_name = format!("{}_{}.tsv", table.schema, table.name)
        .replace(['/', '\\'], "_");
    dir.join(file_name)
}

/// A staging file receiving rows in COPY text format.
pub struct ExportFile {
    path: PathBuf,
    writer: BufWriter<File>,
    buf: BytesMut,
    rows: u64,
}

impl ExportFile {
    /// Create (or truncate) the staging file.
    pub async fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            buf: BytesMut::with_capacity(64 * 1024),
            rows: 0,
        })
    }

    pub async fn write_batch(&mut self, batch: &Batch) -> std::io::Result<()> {
        for row in &batch.rows {
            encode_row(&mut self.buf, row);
        }
        self.writer.write_all(&self.buf).await?;
        self.buf.clear();
        self.rows += batch.len() as u64;
        Ok(())
    }

    /// Flush and close the file. Returns its path and row count.
    pub async fn finish(mut self) -> std::io::Result<(PathBuf, u64)> {
        self.writer.flush().await?;
        self.writer.into_inner().sync_all().await?;
        Ok((self.path, self.rows))
    }
}
