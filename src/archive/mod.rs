//! Zip archive reading
//!
//! Thin wrapper over the `zip` crate that walks entries in archive order and
//! hands each one to a visitor. Entry names are checked so that no entry can
//! resolve outside the folder it is extracted into.

use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::read::{ZipArchive, ZipFile};

/// Archive errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive entry escapes the destination folder: {0}")]
    UnsafeEntryPath(String),

    #[error("Archive entry {name} declares {declared} bytes but holds {actual}")]
    SizeMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },
}

/// Returns true when the file name carries a `.zip` extension
pub fn is_zip(file_name: &str) -> bool {
    crate::storage::extension(file_name).as_deref() == Some("zip")
}

/// One entry of an open archive.
///
/// Borrows the archive, so it only lives for one visitor call.
pub struct ZipEntry<'a> {
    name: String,
    relative_path: PathBuf,
    is_dir: bool,
    file: ZipFile<'a>,
}

impl ZipEntry<'_> {
    /// Raw entry name as stored in the archive
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry name as a relative path, safe to join onto a destination folder
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Uncompressed size in bytes, as declared by the archive
    pub fn size(&self) -> u64 {
        self.file.size()
    }

    /// Read the whole entry into memory.
    ///
    /// The declared size is not trusted for allocation. Reading stops one
    /// byte past it, and any difference is reported as `SizeMismatch`.
    pub fn read_all(&mut self) -> Result<Vec<u8>, ArchiveError> {
        let declared = self.size();
        let mut data = Vec::new();
        self.by_ref()
            .take(declared.saturating_add(1))
            .read_to_end(&mut data)?;

        let actual = data.len() as u64;
        if actual != declared {
            return Err(ArchiveError::SizeMismatch {
                name: self.name.clone(),
                declared,
                actual,
            });
        }
        Ok(data)
    }
}

impl Read for ZipEntry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Zip archive reader
pub struct ZipReader<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl ZipReader<File> {
    /// Open an archive stored on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        Self::new(file)
    }
}

impl<R: Read + Seek> ZipReader<R> {
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }

    /// Number of entries, directories included
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Visit every entry in archive order.
    ///
    /// Stops at the first error, whether it comes from the archive itself or
    /// from the visitor.
    pub fn for_each_entry<F, E>(&mut self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(ZipEntry<'_>) -> Result<(), E>,
        E: From<ArchiveError>,
    {
        for index in 0..self.archive.len() {
            let file = self
                .archive
                .by_index(index)
                .map_err(|e| E::from(ArchiveError::from(e)))?;

            let name = file.name().to_string();
            let relative_path = match file.enclosed_name() {
                Some(path) => path.to_path_buf(),
                None => return Err(E::from(ArchiveError::UnsafeEntryPath(name))),
            };
            let is_dir = file.is_dir();

            visit(ZipEntry {
                name,
                relative_path,
                is_dir,
                file,
            })?;
        }
        Ok(())
    }
}
