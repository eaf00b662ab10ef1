//! Filesystem helpers for the save step
//!
//! Path mapping, upload file name handling, unique-name generation and
//! plain file writes. Everything here is synchronous and is expected to run
//! on a blocking thread (see `tokio::task::spawn_blocking`).

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

pub mod file_lock;

pub use file_lock::FileLocks;

/// Resolve an upload folder against the storage root.
///
/// Absolute folders are used as-is; relative ones land under `root`.
pub fn map_path(root: &Path, folder: &str) -> PathBuf {
    let folder = Path::new(folder);
    if folder.is_absolute() {
        folder.to_path_buf()
    } else {
        root.join(folder)
    }
}

/// Base name of an uploaded file name.
///
/// Browsers may post a full client path (`C:\photos\a.jpg`), so both
/// separators are stripped. Returns `None` when nothing usable is left.
pub fn base_name(file_name: &str) -> Option<&str> {
    let name = file_name.rsplit(['/', '\\']).next()?.trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Base name without its extension (`photos/a.b.jpg` -> `a.b`).
pub fn base_name_without_extension(file_name: &str) -> Option<&str> {
    let name = base_name(file_name)?;
    match name.rfind('.') {
        Some(0) | None => Some(name),
        Some(idx) => Some(&name[..idx]),
    }
}

/// Lowercased extension of an uploaded file name, without the dot.
pub fn extension(file_name: &str) -> Option<String> {
    let name = base_name(file_name)?;
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Some(name[idx + 1..].to_ascii_lowercase()),
        _ => None,
    }
}

/// Return `path` if nothing exists there, otherwise the first free
/// `stem_N.ext` sibling (N = 1, 2, ...).
pub fn unique_filename(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n: u32 = 1;
    loop {
        let candidate_name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Lexically normalize a path: drops `.` and resolves `..` without touching
/// the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Copy `reader` into `path`, replacing any existing file.
pub fn write_file<R: Read + ?Sized>(path: &Path, reader: &mut R) -> io::Result<u64> {
    let mut file = File::create(path)?;
    let written = io::copy(reader, &mut file)?;
    file.flush()?;
    Ok(written)
}

/// Save a posted file as `folder/<base name>`.
///
/// When `overwrite` is off the name is disambiguated first. The folder is
/// created on demand. Returns the final path.
pub fn save_file(folder: &Path, name: &str, data: &[u8], overwrite: bool) -> io::Result<PathBuf> {
    let mut path = folder.join(name);
    if !overwrite {
        path = unique_filename(&path);
    }
    fs::create_dir_all(folder)?;
    fs::write(&path, data)?;
    Ok(path)
}
