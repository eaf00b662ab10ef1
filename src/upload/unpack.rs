//! Archive extraction to the filesystem
//!
//! Extraction is not transactional: entries already written stay on disk
//! when a later entry fails.

use std::fs;
use std::path::Path;
use std::time::Instant;

use super::SaveError;
use crate::archive::ZipReader;
use crate::metrics;
use crate::storage::{self, FileLocks};

/// Counts from one extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes_written: u64,
}

/// Extract every entry of the archive at `archive` into `folder`.
///
/// Directory entries are created as-is, so empty directories survive.
/// File entries are renamed to a free name unless `overwrite` is set, and
/// are written while holding the lock for their destination path.
pub fn extract_to_folder(
    archive: &Path,
    folder: &Path,
    overwrite: bool,
    locks: &FileLocks,
) -> Result<ExtractSummary, SaveError> {
    let start_time = Instant::now();
    let mut reader = ZipReader::open(archive)?;
    let mut summary = ExtractSummary::default();

    reader.for_each_entry(|mut entry| -> Result<(), SaveError> {
        let mut path = folder.join(entry.relative_path());

        if entry.is_dir() {
            fs::create_dir_all(&path)?;
            summary.directories += 1;
            metrics::record_archive_entry(true);
            tracing::debug!(path = %path.display(), "Created directory from archive");
            return Ok(());
        }

        if !overwrite {
            path = storage::unique_filename(&path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let written = locks.with_lock(&path, || storage::write_file(&path, &mut entry))?;

        summary.files += 1;
        summary.bytes_written += written;
        metrics::record_archive_entry(false);
        metrics::record_file_saved("archive_entry", written);
        tracing::debug!(
            entry = %entry.name(),
            path = %path.display(),
            bytes = written,
            "Extracted archive entry"
        );
        Ok(())
    })?;

    tracing::info!(
        folder = %folder.display(),
        files = summary.files,
        directories = summary.directories,
        bytes_written = summary.bytes_written,
        duration_ms = start_time.elapsed().as_millis(),
        "Archive extracted"
    );

    Ok(summary)
}
