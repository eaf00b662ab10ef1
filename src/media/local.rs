//! Filesystem-backed media library
//!
//! Layout under the library root:
//!
//! ```text
//! items/<id>.json            item records
//! blobs/<id>/<version>.bin   blobs of database-stored items
//! files/<media path>.<ext>   blobs of file-based items
//! ```
//!
//! Writes require the shared [`SecurityContext`] to be disabled, the same
//! way a host media service refuses unprivileged item creation. Item
//! creation is serialized, so concurrent uploads to the same media path
//! get distinct items.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MediaError, MediaItem, MediaLibrary, MediaUploadRequest, MediaUploadResult};
use crate::archive::ZipReader;
use crate::security::SecurityContext;
use crate::storage;

const ITEMS_DIR: &str = "items";
const BLOBS_DIR: &str = "blobs";
const FILES_DIR: &str = "files";

/// Local media library
pub struct LocalMediaLibrary {
    root: PathBuf,
    security: Arc<SecurityContext>,
    /// Lowercased media path -> item id
    index: DashMap<String, Uuid>,
    /// Held from path lookup until the new item is indexed
    write_lock: Mutex<()>,
}

impl LocalMediaLibrary {
    /// Open (or create) a library rooted at `root` and index existing items
    pub async fn open(
        root: impl Into<PathBuf>,
        security: Arc<SecurityContext>,
    ) -> Result<Self, MediaError> {
        let root = root.into();
        for dir in [ITEMS_DIR, BLOBS_DIR, FILES_DIR] {
            fs::create_dir_all(root.join(dir)).await?;
        }

        let library = Self {
            root,
            security,
            index: DashMap::new(),
            write_lock: Mutex::new(()),
        };

        let mut entries = fs::read_dir(library.root.join(ITEMS_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let item: MediaItem = serde_json::from_slice(&fs::read(&path).await?)?;
            library.index.insert(item.path.to_lowercase(), item.id);
        }

        tracing::debug!(
            root = %library.root.display(),
            items = library.index.len(),
            "Opened media library"
        );

        Ok(library)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of items in the library
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Load an item record
    pub async fn get(&self, id: Uuid) -> Result<MediaItem, MediaError> {
        let record = self.record_path(id);
        if !fs::try_exists(&record).await? {
            return Err(MediaError::NotFound(id));
        }
        Ok(serde_json::from_slice(&fs::read(&record).await?)?)
    }

    /// Look an item up by media path (case-insensitive)
    pub async fn find_by_path(&self, path: &str) -> Result<Option<MediaItem>, MediaError> {
        let id = match self.index.get(&path.to_lowercase()) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        self.get(id).await.map(Some)
    }

    fn require_elevation(&self, action: &str) -> Result<(), MediaError> {
        if self.security.is_disabled() {
            Ok(())
        } else {
            Err(MediaError::AccessDenied(format!(
                "{} requires security to be disabled",
                action
            )))
        }
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.root.join(ITEMS_DIR).join(format!("{}.json", id))
    }

    fn blob_path(&self, item: &MediaItem) -> PathBuf {
        if item.file_based {
            let mut path = self.root.join(FILES_DIR).join(media_path_to_relative(&item.path));
            if let Some(ext) = &item.extension {
                let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
                name.push(".");
                name.push(ext);
                path.set_file_name(name);
            }
            path
        } else {
            self.root
                .join(BLOBS_DIR)
                .join(item.id.to_string())
                .join(format!("{}.bin", item.version))
        }
    }

    async fn save_record(&self, item: &MediaItem) -> Result<(), MediaError> {
        let data = serde_json::to_vec_pretty(item)?;
        fs::write(self.record_path(item.id), data).await?;
        Ok(())
    }

    fn unique_media_path(&self, folder: &str, name: &str) -> (String, String) {
        let mut n: u32 = 1;
        loop {
            let candidate = format!("{}_{}", name, n);
            let path = join_media_path(folder, &candidate);
            if !self.index.contains_key(&path.to_lowercase()) {
                return (path, candidate);
            }
            n += 1;
        }
    }

    async fn create_item(
        &self,
        request: &MediaUploadRequest,
        folder: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<MediaUploadResult, MediaError> {
        let name = storage::base_name_without_extension(file_name)
            .ok_or_else(|| MediaError::InvalidRequest(format!("bad file name {:?}", file_name)))?;
        let extension = storage::extension(file_name);
        let path = join_media_path(folder, name);
        let now = Utc::now();

        let _write = self.write_lock.lock().await;
        let existing = self.find_by_path(&path).await?;
        let mut item = match existing {
            Some(mut item) if request.overwrite => {
                if request.versioned {
                    item.version += 1;
                }
                item.extension = extension;
                item.language = request.language.clone();
                item.updated_at = now;
                item
            }
            existing => {
                let (path, name) = match existing {
                    Some(_) => self.unique_media_path(folder, name),
                    None => (path, name.to_string()),
                };
                MediaItem {
                    id: Uuid::new_v4(),
                    path,
                    name,
                    extension,
                    language: request.language.clone(),
                    version: 1,
                    size: 0,
                    file_based: request.file_based,
                    blob_path: PathBuf::new(),
                    fields: BTreeMap::new(),
                    created_at: now,
                    updated_at: now,
                }
            }
        };

        item.file_based = request.file_based;
        item.size = data.len() as u64;
        item.blob_path = self.blob_path(&item);

        if let Some(parent) = item.blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&item.blob_path, data).await?;
        self.save_record(&item).await?;
        self.index.insert(item.path.to_lowercase(), item.id);

        tracing::debug!(
            id = %item.id,
            path = %item.path,
            version = item.version,
            file_based = item.file_based,
            "Media item stored"
        );

        Ok(MediaUploadResult {
            path: item.path.clone(),
            item,
        })
    }
}

#[async_trait]
impl MediaLibrary for LocalMediaLibrary {
    #[tracing::instrument(
        name = "media.local.upload",
        skip(self, request),
        fields(
            file_name = %request.file.file_name,
            folder = %request.folder,
            unpack = request.unpack
        ),
        err
    )]
    async fn upload(
        &self,
        request: MediaUploadRequest,
    ) -> Result<Vec<MediaUploadResult>, MediaError> {
        self.require_elevation("media upload")?;

        if !request.unpack {
            let name = storage::base_name(&request.file.file_name).ok_or_else(|| {
                MediaError::InvalidRequest(format!("bad file name {:?}", request.file.file_name))
            })?;
            let result = self
                .create_item(&request, &request.folder, name, &request.file.content)
                .await?;
            return Ok(vec![result]);
        }

        let content = request.file.content.clone();
        let entries = tokio::task::spawn_blocking(move || read_file_entries(content)).await??;
        let mut results = Vec::with_capacity(entries.len());
        for (relative, data) in entries {
            let folder = match relative.parent().map(relative_to_media_path) {
                Some(sub) if !sub.is_empty() => join_media_path(&request.folder, &sub),
                _ => request.folder.clone(),
            };
            let file_name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            results.push(self.create_item(&request, &folder, &file_name, &data).await?);
        }
        Ok(results)
    }

    async fn set_field(
        &self,
        item: &mut MediaItem,
        name: &str,
        value: &str,
    ) -> Result<(), MediaError> {
        self.require_elevation("item edit")?;
        if !fs::try_exists(self.record_path(item.id)).await? {
            return Err(MediaError::NotFound(item.id));
        }

        item.fields.insert(name.to_string(), value.to_string());
        item.updated_at = Utc::now();
        self.save_record(item).await
    }
}

/// File entries of an archive, in archive order. Directory entries are
/// skipped; folders are implied by the entry paths.
fn read_file_entries(content: Bytes) -> Result<Vec<(PathBuf, Vec<u8>)>, MediaError> {
    let mut reader = ZipReader::new(Cursor::new(content))?;
    let mut entries = Vec::new();
    reader.for_each_entry(|mut entry| -> Result<(), MediaError> {
        if entry.is_dir() {
            return Ok(());
        }
        let data = entry.read_all()?;
        entries.push((entry.relative_path().to_path_buf(), data));
        Ok(())
    })?;
    Ok(entries)
}

/// `folder` + `/` + `name`, with exactly one separator and a leading `/`
fn join_media_path(folder: &str, name: &str) -> String {
    let folder = folder.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if folder.starts_with('/') {
        format!("{}/{}", folder, name)
    } else {
        format!("/{}/{}", folder, name).replace("//", "/")
    }
}

fn relative_to_media_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Media path segments as a relative filesystem path, dropping anything
/// that could climb out of the library root
fn media_path_to_relative(path: &str) -> PathBuf {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect()
}
