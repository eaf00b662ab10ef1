//! Temporary archive file
//!
//! Posted archives are spooled to disk before extraction so the zip reader
//! can seek. The file is removed when the handle is dropped.
//!
//! # Example
//!
//! ```no_run
//! use upload_pipeline::upload::temp_file::TempArchive;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let temp = TempArchive::from_bytes(None, b"PK\x05\x06")?;
//!
//! println!("File: {:?}", temp.path());
//! println!("Size: {} bytes", temp.size());
//! println!("SHA256: {}", temp.content_hash());
//! # Ok(())
//! # }
//! ```

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Spooled archive, cleaned up on drop (RAII pattern).
pub struct TempArchive {
    path: PathBuf,
    size: u64,
    content_hash: String,
}

impl TempArchive {
    /// Write `data` to a fresh temp file.
    ///
    /// Uses `dir` when given, otherwise tmpfs (/dev/shm) on Linux when
    /// available, falling back to the system temp dir.
    pub fn from_bytes(dir: Option<&Path>, data: &[u8]) -> io::Result<Self> {
        let temp_dir = match dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.to_path_buf()
            }
            None => Self::get_temp_dir(),
        };

        let file_name = format!("upload-{}.zip", uuid::Uuid::new_v4());
        let path = temp_dir.join(file_name);

        let mut file = File::create(&path)?;
        file.write_all(data)?;
        file.flush()?;

        Ok(Self {
            path,
            size: data.len() as u64,
            content_hash: Self::compute_sha256(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// SHA256 of the content (hex encoded), logged with the audit trail
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn get_temp_dir() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            let shm = PathBuf::from("/dev/shm");
            if shm.is_dir() {
                return shm;
            }
        }

        std::env::temp_dir()
    }

    fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up temp archive"
                );
            }
        }
    }
}
