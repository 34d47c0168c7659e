//! Streaming JSON array output

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::pager::RecordSink;
use super::types::ExportError;

/// Writes records to a file as one JSON array, one record at a time.
///
/// The opening bracket is written on create and the closing bracket on
/// [`finish`](Self::finish); nothing beyond the write buffer is held in memory.
pub struct JsonArrayWriter {
    path: PathBuf,
    out: BufWriter<File>,
    records: usize,
}

impl JsonArrayWriter {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        let mut out = BufWriter::new(file);
        out.write_all(b"[").await?;

        Ok(Self {
            path,
            out,
            records: 0,
        })
    }

    pub async fn write<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<(), ExportError> {
        let bytes = serde_json::to_vec(record)?;

        if self.records > 0 {
            self.out.write_all(b",").await?;
        }
        self.out.write_all(&bytes).await?;
        self.records += 1;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Close the array, flush and close the file. Returns the record count.
    pub async fn finish(mut self) -> Result<usize, ExportError> {
        self.out.write_all(b"]").await?;
        self.out.shutdown().await?;
        drop(self.out);

        Ok(self.records)
    }
}

#[async_trait]
impl RecordSink for JsonArrayWriter {
    async fn accept(&mut self, record: Value) -> Result<(), ExportError> {
        self.write(&record).await
    }
}
