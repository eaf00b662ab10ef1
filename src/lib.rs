//! Upload Pipeline Library
//!
//! The save step of a media upload pipeline: takes the files posted with an
//! upload request and stores them.
//!
//! # Features
//!
//! - **File-only uploads**: write posted files into a folder, with
//!   collision-free renaming unless overwrite is requested
//! - **Zip unpacking**: extract archives entry by entry, holding a per-path
//!   lock while each file is written
//! - **Media library hand-off**: create media items through a
//!   [`media::MediaLibrary`], optionally filling their alt text
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use upload_pipeline::{config::Config, media::LocalMediaLibrary, security::SecurityContext};
//! use upload_pipeline::upload::{SaveSettings, SaveStep, UploadArgs, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let security = Arc::new(SecurityContext::new());
//!     let library = LocalMediaLibrary::open(&config.media.library_root, Arc::clone(&security)).await?;
//!     let step = SaveStep::new(Arc::new(library), security, SaveSettings::from(&config));
//!
//!     let mut args = UploadArgs::new("/media library/images");
//!     args.add_file(UploadedFile::new("photo.jpg", std::fs::read("photo.jpg")?));
//!     step.process(&mut args).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod file_handle;
pub mod logging;
pub mod media;
pub mod metrics;
pub mod security;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use upload::{SaveError, SaveStep, UploadArgs, UploadedArtifact, UploadedFile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
