//! Upload Pipeline - run the upload save step on local files
//!
//! Reads the given files, pushes them through the save step and prints the
//! uploaded artifacts as JSON.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use upload_pipeline::config::Config;
use upload_pipeline::media::LocalMediaLibrary;
use upload_pipeline::security::SecurityContext;
use upload_pipeline::upload::{
    SaveSettings, SaveStep, UploadArgs, UploadDestination, UploadedArtifact, UploadedFile,
    ALT_PARAMETER, FILENAME_PROPERTY,
};
use upload_pipeline::{logging, metrics};

/// Upload Pipeline - store posted files, unpack archives, create media items
#[derive(Parser, Debug)]
#[command(name = "upload-pipeline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Destination folder (filesystem folder or media folder path)
    #[arg(short, long)]
    folder: String,

    /// Unpack zip archives
    #[arg(long)]
    unpack: bool,

    /// Overwrite existing files and items instead of renaming
    #[arg(long)]
    overwrite: bool,

    /// Write to the filesystem only, skipping the media library
    #[arg(long)]
    file_only: bool,

    /// Media blob destination: database or file
    #[arg(long, default_value = "database")]
    destination: UploadDestination,

    /// Create a new version when overwriting media items
    #[arg(long)]
    versioned: bool,

    /// Language of created media items
    #[arg(long, default_value = "en")]
    language: String,

    /// Alternate text for a file, as FILE=TEXT (repeatable)
    #[arg(long = "alt", value_name = "FILE=TEXT")]
    alt: Vec<String>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    metrics: bool,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    uploaded_items: &'a [UploadedArtifact],
    properties: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => Config::default(),
    };

    logging::init_subscriber(&config.logging)?;
    info!("Starting upload-pipeline v{}", upload_pipeline::VERSION);

    let security = Arc::new(SecurityContext::new());
    let library = LocalMediaLibrary::open(&config.media.library_root, Arc::clone(&security))
        .await
        .context("Failed to open media library")?;
    let step = SaveStep::new(Arc::new(library), security, SaveSettings::from(&config));

    let mut upload = UploadArgs::new(args.folder.clone());
    upload.unpack = args.unpack;
    upload.overwrite = args.overwrite;
    upload.file_only = args.file_only;
    upload.destination = args.destination;
    upload.versioned = args.versioned;
    upload.language = args.language.clone();

    for path in &args.files {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        upload.add_file(UploadedFile::new(file_name, content));
    }

    for alt in &args.alt {
        let (file, text) = alt
            .split_once('=')
            .with_context(|| format!("Invalid --alt value {:?}, expected FILE=TEXT", alt))?;
        upload.set_file_parameter(file, ALT_PARAMETER, text);
    }

    step.process(&mut upload).await?;

    let filename = upload
        .property(FILENAME_PROPERTY)
        .and_then(|handle| step.file_handles().resolve(handle));
    let report = Report {
        uploaded_items: &upload.uploaded_items,
        properties: &upload.properties,
        filename,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.metrics && config.metrics.enabled {
        print!("{}", metrics::gather_text());
    }

    Ok(())
}
