//! Packaging the working directory into a zip archive

use async_trait::async_trait;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::types::ExportError;

const ZIP_COMPRESSION_LEVEL: i64 = 9;

/// Packages a directory into a single archive file.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Archive the contents of `source` into a sibling file and return its path.
    ///
    /// Must only resolve once the archive file has been fully written and
    /// closed, since the caller deletes `source` afterwards.
    async fn archive(&self, source: &Path) -> Result<PathBuf, ExportError>;
}

/// `<parent>/<name>` -> `<parent>/<name>.zip`
pub fn archive_path(source: &Path) -> Result<PathBuf, ExportError> {
    let mut name = source
        .file_name()
        .ok_or_else(|| ExportError::Config(format!("cannot archive {}", source.display())))?
        .to_os_string();
    name.push(".zip");

    Ok(source.with_file_name(name))
}

pub struct ZipArchiver {
    compression_level: i64,
}

impl ZipArchiver {
    pub fn new() -> Self {
        Self {
            compression_level: ZIP_COMPRESSION_LEVEL,
        }
    }
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Archiver for ZipArchiver {
    async fn archive(&self, source: &Path) -> Result<PathBuf, ExportError> {
        let target = archive_path(source)?;
        tracing::info!(
            "Adding {} to zip file {}",
            source.display(),
            target.display()
        );

        let source = source.to_path_buf();
        let zip_target = target.clone();
        let level = self.compression_level;
        let result = tokio::task::spawn_blocking(move || write_zip(&source, &zip_target, level)).await?;

        if let Err(e) = result {
            // Leave no half-written archive behind
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e);
        }

        Ok(target)
    }
}

/// Entries are stored relative to `source`, without its own name as a prefix.
fn write_zip(source: &Path, target: &Path, level: i64) -> Result<(), ExportError> {
    let mut zip = ZipWriter::new(File::create(target)?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
            continue;
        }

        zip.start_file(name, options)?;
        let mut input = File::open(entry.path())?;
        io::copy(&mut input, &mut zip)?;
    }

    let file = zip.finish()?;
    file.sync_all()?;
    tracing::debug!("Finalized zip {}", target.display());

    Ok(())
}
