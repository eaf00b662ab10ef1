//! Media library interface
//!
//! The save step hands non-file-only uploads to a [`MediaLibrary`], which
//! turns raw bytes into managed media items. [`local::LocalMediaLibrary`]
//! is a filesystem-backed implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::archive::ArchiveError;
use crate::upload::UploadedFile;

pub mod local;

pub use local::LocalMediaLibrary;

/// Field holding the alternate text of a media item
pub const ALT_FIELD: &str = "Alt";

/// Media library errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Media item not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid upload: {0}")]
    InvalidRequest(String),

    #[error("Blocking task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

/// A managed media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,
    /// Media path, e.g. `/media library/images/photo`
    pub path: String,
    pub name: String,
    pub extension: Option<String>,
    pub language: String,
    pub version: u32,
    pub size: u64,
    /// True when the blob lives as a plain file rather than in the library
    pub file_based: bool,
    /// Location of the blob on disk
    pub blob_path: PathBuf,
    pub fields: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn alt(&self) -> Option<&str> {
        self.field(ALT_FIELD)
    }
}

/// Everything the media library needs to create items for one posted file
#[derive(Debug, Clone)]
pub struct MediaUploadRequest {
    pub file: UploadedFile,
    pub unpack: bool,
    pub folder: String,
    pub versioned: bool,
    pub language: String,
    pub alternate_text: Option<String>,
    pub overwrite: bool,
    pub file_based: bool,
}

/// One created media item and the path it was created at
#[derive(Debug, Clone)]
pub struct MediaUploadResult {
    pub item: MediaItem,
    pub path: String,
}

/// Media-creation service
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Create media items for a posted file.
    ///
    /// Returns one result per created item, in creation order. An unpacked
    /// archive yields one item per file entry.
    async fn upload(&self, request: MediaUploadRequest)
        -> Result<Vec<MediaUploadResult>, MediaError>;

    /// Edit a single field of an existing item and persist it.
    async fn set_field(
        &self,
        item: &mut MediaItem,
        name: &str,
        value: &str,
    ) -> Result<(), MediaError>;
}
