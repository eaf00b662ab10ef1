//! Upload module
//!
//! Request types for the save step, plus the step itself. An [`UploadArgs`]
//! carries the posted files, the options they were posted with and the
//! accumulators the step fills in.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::media::{MediaError, MediaItem};

pub mod save;
pub mod temp_file;
pub mod unpack;

pub use save::{SaveSettings, SaveStep};

/// Property that receives the handle of the first saved file
pub const FILENAME_PROPERTY: &str = "filename";

/// Per-file parameter holding the alternate text for a media item
pub const ALT_PARAMETER: &str = "alt";

/// Save errors
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("Media library error: {0}")]
    MediaError(#[from] MediaError),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Blocking task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

impl SaveError {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SaveError::IoError(_) => "io",
            SaveError::ArchiveError(_) => "archive",
            SaveError::MediaError(_) => "media",
            SaveError::InvalidFileName(_) => "file_name",
            SaveError::TaskError(_) => "task",
        }
    }
}

/// Where media library uploads end up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadDestination {
    /// Blob stored inside the media library
    #[default]
    Database,
    /// Blob stored as a plain file, referenced by the media item
    File,
}

impl UploadDestination {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadDestination::Database => "database",
            UploadDestination::File => "file",
        }
    }
}

impl std::str::FromStr for UploadDestination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "database" | "db" => Ok(UploadDestination::Database),
            "file" | "filesystem" => Ok(UploadDestination::File),
            _ => Err(format!("Unknown upload destination: {}", s)),
        }
    }
}

/// A posted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name as posted by the client, possibly including a client-side path
    pub file_name: String,
    pub content: Bytes,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Something the save step produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadedArtifact {
    /// Media item created by the media library
    Media { item: MediaItem },
    /// File written directly to disk
    File { path: PathBuf },
}

/// One upload request: posted files, options and output accumulators
#[derive(Debug, Clone)]
pub struct UploadArgs {
    pub files: Vec<UploadedFile>,
    /// Destination folder. Relative folders resolve under the storage root
    /// for file-only uploads; for media uploads it is the media folder path.
    pub folder: String,
    pub versioned: bool,
    pub language: String,
    pub overwrite: bool,
    /// Caller asked for zip archives to be unpacked
    pub unpack: bool,
    /// Skip the media library and write straight to the filesystem
    pub file_only: bool,
    pub destination: UploadDestination,
    /// Per-file parameters, keyed by posted file name then parameter name
    pub file_parameters: HashMap<String, HashMap<String, String>>,

    /// Artifacts produced so far, in processing order
    pub uploaded_items: Vec<UploadedArtifact>,
    /// Side-channel values for later pipeline steps
    pub properties: HashMap<String, String>,
}

impl UploadArgs {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            files: Vec::new(),
            folder: folder.into(),
            versioned: false,
            language: "en".to_string(),
            overwrite: false,
            unpack: false,
            file_only: false,
            destination: UploadDestination::default(),
            file_parameters: HashMap::new(),
            uploaded_items: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn add_file(&mut self, file: UploadedFile) -> &mut Self {
        self.files.push(file);
        self
    }

    /// Set a per-file parameter such as `alt`
    pub fn set_file_parameter(
        &mut self,
        file_name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.file_parameters
            .entry(file_name.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Look up a per-file parameter. Empty values count as missing.
    pub fn file_parameter(&self, file_name: &str, key: &str) -> Option<&str> {
        self.file_parameters
            .get(file_name)
            .and_then(|params| params.get(key))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
