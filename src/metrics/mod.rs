//! Metrics module
//!
//! Prometheus counters for the save step.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Save metrics
    pub static ref FILES_SAVED: CounterVec = register_counter_vec!(
        "upload_pipeline_files_saved_total",
        "Files written to the filesystem",
        &["mode"]  // "file" or "archive_entry"
    ).unwrap();

    pub static ref BYTES_WRITTEN: Counter = register_counter!(
        "upload_pipeline_bytes_written_total",
        "Total bytes written to the filesystem"
    ).unwrap();

    pub static ref SAVE_DURATION: HistogramVec = register_histogram_vec!(
        "upload_pipeline_save_duration_seconds",
        "Per-file save duration in seconds",
        &["mode"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).unwrap();

    // Archive metrics
    pub static ref ARCHIVE_ENTRIES: CounterVec = register_counter_vec!(
        "upload_pipeline_archive_entries_total",
        "Archive entries extracted",
        &["kind"]  // "file" or "directory"
    ).unwrap();

    // Media metrics
    pub static ref MEDIA_ITEMS: CounterVec = register_counter_vec!(
        "upload_pipeline_media_items_total",
        "Media items created through the media library",
        &["destination"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "upload_pipeline_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a file written to disk
pub fn record_file_saved(mode: &str, bytes: u64) {
    FILES_SAVED.with_label_values(&[mode]).inc();
    BYTES_WRITTEN.inc_by(bytes as f64);
}

/// Record how long one uploaded file took
pub fn record_save_duration(mode: &str, duration_secs: f64) {
    SAVE_DURATION.with_label_values(&[mode]).observe(duration_secs);
}

/// Record an extracted archive entry
pub fn record_archive_entry(is_dir: bool) {
    let kind = if is_dir { "directory" } else { "file" };
    ARCHIVE_ENTRIES.with_label_values(&[kind]).inc();
}

/// Record a media item handed back by the media library
pub fn record_media_item(destination: &str) {
    MEDIA_ITEMS.with_label_values(&[destination]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_file_saved() {
        record_file_saved("file", 1024);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_record_archive_entry() {
        record_archive_entry(true);
        record_archive_entry(false);
    }

    #[test]
    fn test_gather_text_contains_counters() {
        record_media_item("database");
        record_error("io");
        let text = gather_text();
        assert!(text.contains("upload_pipeline_media_items_total"));
        assert!(text.contains("upload_pipeline_errors_total"));
    }
}
