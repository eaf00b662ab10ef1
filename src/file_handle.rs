//! Opaque handles for saved files
//!
//! The save step does not expose raw filesystem paths to later pipeline
//! steps. It registers the path and passes a handle around instead.

use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// Handle -> path registry, shared across requests
#[derive(Debug, Default)]
pub struct FileHandles {
    handles: DashMap<String, PathBuf>,
}

impl FileHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` and return a fresh handle for it
    pub fn register(&self, path: &Path) -> String {
        let handle = uuid::Uuid::new_v4().simple().to_string();
        self.handles.insert(handle.clone(), path.to_path_buf());
        handle
    }

    /// Path behind a handle, if it was registered here
    pub fn resolve(&self, handle: &str) -> Option<PathBuf> {
        self.handles.get(handle).map(|entry| entry.value().clone())
    }

    /// Forget a handle, returning its path
    pub fn release(&self, handle: &str) -> Option<PathBuf> {
        self.handles.remove(handle).map(|(_, path)| path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let handles = FileHandles::new();
        let handle = handles.register(Path::new("/dest/a.txt"));
        assert_eq!(handles.resolve(&handle), Some(PathBuf::from("/dest/a.txt")));
        assert_eq!(handles.resolve("unknown"), None);
    }

    #[test]
    fn test_handles_are_unique() {
        let handles = FileHandles::new();
        let a = handles.register(Path::new("/dest/a.txt"));
        let b = handles.register(Path::new("/dest/a.txt"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_release() {
        let handles = FileHandles::new();
        let handle = handles.register(Path::new("/dest/a.txt"));
        assert_eq!(handles.release(&handle), Some(PathBuf::from("/dest/a.txt")));
        assert_eq!(handles.resolve(&handle), None);
    }
}
