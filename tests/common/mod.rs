//! Shared test helpers: fixture archives and a recording media library.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use upload_pipeline::media::{
    MediaError, MediaItem, MediaLibrary, MediaUploadRequest, MediaUploadResult,
};
use upload_pipeline::security::SecurityContext;
use upload_pipeline::upload::{SaveSettings, SaveStep};
use zip::write::{FileOptions, ZipWriter};

/// Build an in-memory zip. `None` data means a directory entry.
pub fn zip_bytes(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default();
        for (name, data) in entries {
            match data {
                Some(data) => {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(data).unwrap();
                }
                None => zip.add_directory(*name, options).unwrap(),
            }
        }
        zip.finish().unwrap();
    }
    buffer
}

/// Stored single-entry zip whose central directory uses a zip64 extra
/// field to declare `declared` uncompressed bytes for `data`.
pub fn zip64_declared_size_bytes(name: &str, data: &[u8], declared: u64) -> Vec<u8> {
    let crc = crc32(data);
    let name = name.as_bytes();
    let mut out = Vec::new();

    // Local file header
    out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
    out.extend_from_slice(&45u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0x21u16.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(data);

    // Central directory, uncompressed size deferred to the zip64 field
    let cd_offset = out.len() as u32;
    out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
    out.extend_from_slice(&45u16.to_le_bytes());
    out.extend_from_slice(&45u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0x21u16.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&u32::MAX.to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&12u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&0x0001u16.to_le_bytes());
    out.extend_from_slice(&8u16.to_le_bytes());
    out.extend_from_slice(&declared.to_le_bytes());
    let cd_size = out.len() as u32 - cd_offset;

    // End of central directory
    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for byte in data {
        crc ^= u32::from(*byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// What the fake saw for one upload call
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub file_name: String,
    pub unpack: bool,
    pub folder: String,
    pub versioned: bool,
    pub language: String,
    pub alternate_text: Option<String>,
    pub overwrite: bool,
    pub file_based: bool,
    pub security_disabled: bool,
}

/// Media library fake that records calls and fabricates items.
///
/// Unpacked uploads yield one item per name in `archive_items`.
pub struct RecordingLibrary {
    security: Arc<SecurityContext>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub edits: Mutex<Vec<(String, String, String, bool)>>,
    pub archive_items: Vec<String>,
    pub fail_on: Option<String>,
}

impl RecordingLibrary {
    pub fn new(security: Arc<SecurityContext>) -> Self {
        Self {
            security,
            uploads: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            archive_items: Vec::new(),
            fail_on: None,
        }
    }

    fn item(folder: &str, name: &str) -> MediaItem {
        let now = Utc::now();
        MediaItem {
            id: uuid::Uuid::new_v4(),
            path: format!("{}/{}", folder.trim_end_matches('/'), name),
            name: name.to_string(),
            extension: None,
            language: "en".into(),
            version: 1,
            size: 0,
            file_based: false,
            blob_path: PathBuf::new(),
            fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl MediaLibrary for RecordingLibrary {
    async fn upload(
        &self,
        request: MediaUploadRequest,
    ) -> Result<Vec<MediaUploadResult>, MediaError> {
        self.uploads.lock().push(RecordedUpload {
            file_name: request.file.file_name.clone(),
            unpack: request.unpack,
            folder: request.folder.clone(),
            versioned: request.versioned,
            language: request.language.clone(),
            alternate_text: request.alternate_text.clone(),
            overwrite: request.overwrite,
            file_based: request.file_based,
            security_disabled: self.security.is_disabled(),
        });

        if self.fail_on.as_deref() == Some(request.file.file_name.as_str()) {
            return Err(MediaError::InvalidRequest(format!(
                "refusing {}",
                request.file.file_name
            )));
        }

        let names: Vec<String> = if request.unpack {
            self.archive_items.clone()
        } else {
            let stem = request
                .file
                .file_name
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| request.file.file_name.clone());
            vec![stem]
        };

        Ok(names
            .iter()
            .map(|name| {
                let item = Self::item(&request.folder, name);
                MediaUploadResult {
                    path: item.path.clone(),
                    item,
                }
            })
            .collect())
    }

    async fn set_field(
        &self,
        item: &mut MediaItem,
        name: &str,
        value: &str,
    ) -> Result<(), MediaError> {
        self.edits.lock().push((
            item.path.clone(),
            name.to_string(),
            value.to_string(),
            self.security.is_disabled(),
        ));
        item.fields.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

pub fn settings(root: &Path, auto_set_alt: bool) -> SaveSettings {
    SaveSettings {
        storage_root: root.to_path_buf(),
        temp_dir: Some(root.join("tmp")),
        auto_set_alt,
    }
}

/// Save step over a fresh recording library
pub fn recording_step(
    root: &Path,
    auto_set_alt: bool,
    configure: impl FnOnce(&mut RecordingLibrary),
) -> (SaveStep, Arc<RecordingLibrary>, Arc<SecurityContext>) {
    let security = Arc::new(SecurityContext::new());
    let mut library = RecordingLibrary::new(Arc::clone(&security));
    configure(&mut library);
    let library = Arc::new(library);
    let step = SaveStep::new(
        Arc::clone(&library) as Arc<dyn MediaLibrary>,
        Arc::clone(&security),
        settings(root, auto_set_alt),
    );
    (step, library, security)
}
