//! Save step
//!
//! Processes every posted file of an [`UploadArgs`] in order:
//!
//! - file-only + zip with unpack requested: extract into the folder
//! - file-only otherwise: write the file into the folder
//! - everything else: create media items through the [`MediaLibrary`]
//!
//! The first failure is logged with the file name and returned; files after
//! it are not processed and nothing is recorded for the failed file.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use upload_pipeline::media::LocalMediaLibrary;
//! use upload_pipeline::security::SecurityContext;
//! use upload_pipeline::upload::{SaveSettings, SaveStep, UploadArgs, UploadedFile};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let security = Arc::new(SecurityContext::new());
//! let library = LocalMediaLibrary::open("media", Arc::clone(&security)).await?;
//! let step = SaveStep::new(Arc::new(library), security, SaveSettings::default());
//!
//! let mut args = UploadArgs::new("/upload");
//! args.file_only = true;
//! args.add_file(UploadedFile::new("a.txt", &b"hello"[..]));
//!
//! step.process(&mut args).await?;
//! println!("{:?}", args.uploaded_items);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::temp_file::TempArchive;
use super::unpack::extract_to_folder;
use super::{
    SaveError, UploadArgs, UploadDestination, UploadedArtifact, UploadedFile, ALT_PARAMETER,
    FILENAME_PROPERTY,
};
use crate::archive;
use crate::file_handle::FileHandles;
use crate::logging::AUDIT_TARGET;
use crate::media::{MediaItem, MediaLibrary, MediaUploadRequest, ALT_FIELD};
use crate::metrics;
use crate::security::SecurityContext;
use crate::storage::{self, FileLocks};

/// Settings the save step reads from configuration
#[derive(Debug, Clone)]
pub struct SaveSettings {
    /// Root for relative upload folders
    pub storage_root: PathBuf,
    /// Spool directory for archives; `None` picks a platform default
    pub temp_dir: Option<PathBuf>,
    /// Fill `Alt` on created media items
    pub auto_set_alt: bool,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            temp_dir: None,
            auto_set_alt: false,
        }
    }
}

impl From<&crate::config::Config> for SaveSettings {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            storage_root: config.storage.root_path(),
            temp_dir: config.storage.temp_dir_path(),
            auto_set_alt: config.media.auto_set_alt,
        }
    }
}

/// The save step
pub struct SaveStep {
    media: Arc<dyn MediaLibrary>,
    security: Arc<SecurityContext>,
    locks: Arc<FileLocks>,
    handles: Arc<FileHandles>,
    settings: SaveSettings,
}

impl SaveStep {
    pub fn new(
        media: Arc<dyn MediaLibrary>,
        security: Arc<SecurityContext>,
        settings: SaveSettings,
    ) -> Self {
        Self {
            media,
            security,
            locks: Arc::new(FileLocks::new()),
            handles: Arc::new(FileHandles::new()),
            settings,
        }
    }

    /// Share a lock table with other steps writing to the same folders
    pub fn with_file_locks(mut self, locks: Arc<FileLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Share a handle registry with later pipeline steps
    pub fn with_file_handles(mut self, handles: Arc<FileHandles>) -> Self {
        self.handles = handles;
        self
    }

    pub fn file_handles(&self) -> &Arc<FileHandles> {
        &self.handles
    }

    pub fn file_locks(&self) -> &Arc<FileLocks> {
        &self.locks
    }

    /// True when the file is a zip archive and the caller asked for unpacking
    pub fn is_unpack(args: &UploadArgs, file: &UploadedFile) -> bool {
        args.unpack && archive::is_zip(&file.file_name)
    }

    /// Process every posted file, stopping at the first failure.
    ///
    /// Files saved one by one in file-only mode are recorded as
    /// [`UploadedArtifact::File`]; unpacked archives record nothing. Media
    /// uploads record one [`UploadedArtifact::Media`] per created item.
    #[tracing::instrument(
        name = "upload.save",
        skip(self, args),
        fields(
            files = args.files.len(),
            folder = %args.folder,
            file_only = args.file_only,
            destination = args.destination.as_str()
        ),
        err
    )]
    pub async fn process(&self, args: &mut UploadArgs) -> Result<(), SaveError> {
        for index in 0..args.files.len() {
            let file = args.files[index].clone();
            if file.file_name.is_empty() {
                continue;
            }

            let start_time = Instant::now();
            let result = self.process_file(args, index, &file).await;
            let mode = if args.file_only { "file" } else { "media" };
            metrics::record_save_duration(mode, start_time.elapsed().as_secs_f64());

            if let Err(e) = result {
                metrics::record_error(e.kind());
                tracing::error!(
                    file_name = %file.file_name,
                    error = %e,
                    "Could not save posted file: {}",
                    file.file_name
                );
                return Err(e);
            }
        }
        Ok(())
    }

    async fn process_file(
        &self,
        args: &mut UploadArgs,
        index: usize,
        file: &UploadedFile,
    ) -> Result<(), SaveError> {
        let unpack = Self::is_unpack(args, file);

        if args.file_only {
            if unpack {
                self.unpack_to_file(args, file).await?;
            } else {
                let path = self.upload_to_file(args, file).await?;
                if index == 0 {
                    let handle = self.handles.register(&path);
                    args.properties.insert(FILENAME_PROPERTY.to_string(), handle);
                }
                args.uploaded_items.push(UploadedArtifact::File { path });
            }
            return Ok(());
        }

        let alternate_text = args
            .file_parameter(&file.file_name, ALT_PARAMETER)
            .map(str::to_string);
        let request = MediaUploadRequest {
            file: file.clone(),
            unpack,
            folder: args.folder.clone(),
            versioned: args.versioned,
            language: args.language.clone(),
            alternate_text: alternate_text.clone(),
            overwrite: args.overwrite,
            file_based: args.destination == UploadDestination::File,
        };

        let results = {
            let _disabler = self.security.disable();
            self.media.upload(request).await?
        };
        tracing::info!(target: AUDIT_TARGET, file_name = %file.file_name, "Upload: {}", file.file_name);

        for mut result in results {
            if self.settings.auto_set_alt {
                let alt = match &alternate_text {
                    Some(alt) => alt.clone(),
                    None => storage::base_name_without_extension(&file.file_name)
                        .unwrap_or_default()
                        .to_string(),
                };
                let _disabler = self.security.disable();
                self.media
                    .set_field(&mut result.item, ALT_FIELD, &alt)
                    .await?;
            }

            Self::process_item(args, result.item, &result.path);
        }

        Ok(())
    }

    fn process_item(args: &mut UploadArgs, item: MediaItem, path: &str) {
        match args.destination {
            UploadDestination::Database => {
                tracing::info!(path = %path, "Media Item has been uploaded to database: {}", path)
            }
            UploadDestination::File => {
                tracing::info!(path = %path, "Media Item has been uploaded to file system: {}", path)
            }
        }
        metrics::record_media_item(args.destination.as_str());
        args.uploaded_items.push(UploadedArtifact::Media { item });
    }

    /// Spool the archive to a temp file and extract it into the folder.
    #[tracing::instrument(
        name = "upload.unpack_to_file",
        skip(self, args, file),
        fields(file_name = %file.file_name, bytes = file.len()),
        err
    )]
    async fn unpack_to_file(&self, args: &UploadArgs, file: &UploadedFile) -> Result<(), SaveError> {
        let folder = storage::map_path(&self.settings.storage_root, &args.folder);
        let temp_dir = self.settings.temp_dir.clone();
        let overwrite = args.overwrite;
        let locks = Arc::clone(&self.locks);
        let content = file.content.clone();

        let summary = tokio::task::spawn_blocking(move || -> Result<_, SaveError> {
            let temp = TempArchive::from_bytes(temp_dir.as_deref(), &content)?;
            tracing::debug!(
                temp = %temp.path().display(),
                sha256 = %temp.content_hash(),
                bytes = temp.size(),
                "Archive spooled"
            );
            extract_to_folder(temp.path(), &folder, overwrite, &locks)
        })
        .await??;

        tracing::info!(
            target: AUDIT_TARGET,
            file_name = %file.file_name,
            files = summary.files,
            "Unpacked: {}",
            file.file_name
        );
        Ok(())
    }

    /// Write the file as `folder/<base name>`, returning the final path.
    #[tracing::instrument(
        name = "upload.upload_to_file",
        skip(self, args, file),
        fields(file_name = %file.file_name, bytes = file.len()),
        err
    )]
    async fn upload_to_file(
        &self,
        args: &UploadArgs,
        file: &UploadedFile,
    ) -> Result<PathBuf, SaveError> {
        let name = storage::base_name(&file.file_name)
            .ok_or_else(|| SaveError::InvalidFileName(file.file_name.clone()))?
            .to_string();
        let folder = storage::map_path(&self.settings.storage_root, &args.folder);
        let overwrite = args.overwrite;
        let content = file.content.clone();

        let path = tokio::task::spawn_blocking(move || {
            storage::save_file(&folder, &name, &content, overwrite)
        })
        .await??;

        metrics::record_file_saved("file", file.len() as u64);
        tracing::info!(path = %path.display(), "File has been uploaded: {}", path.display());
        Ok(path)
    }
}
