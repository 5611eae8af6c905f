//! On-the-fly zip archives of shared folders.
//!
//! Archives are built in memory; nothing is written to disk.

use crate::catalog::relative_name;
use crate::error::ShareError;
use bytes::Bytes;
use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use zip::CompressionMethod;
use zip::ZipWriter;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

/// Zip every file below `dir`, keeping the relative directory structure.
///
/// Any entry that cannot be read fails the whole archive.
pub fn build_zip(dir: &Path) -> Result<Vec<u8>, ShareError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(false);

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let source_path = entry.path();
        if !source_path.is_file() {
            continue;
        }
        let Some(entry_name) = relative_name(dir, source_path) else {
            continue;
        };

        let mut source = File::open(source_path)?;
        let size = source.metadata()?.len();
        let options = if size >= u32::MAX as u64 {
            options.large_file(true)
        } else {
            options
        };
        writer.start_file(entry_name, options)?;
        io::copy(&mut source, &mut writer)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Build the archive for `dir` off the async runtime
pub async fn stream_zip(dir: PathBuf) -> Result<Bytes, ShareError> {
    let started = std::time::Instant::now();
    let name = dir.display().to_string();
    let data = tokio::task::spawn_blocking(move || build_zip(&dir))
        .await
        .map_err(|e| ShareError::Archive(e.to_string()))??;

    tracing::debug!(
        "Built archive for {} ({} bytes in {:?})",
        name,
        data.len(),
        started.elapsed()
    );
    Ok(Bytes::from(data))
}
