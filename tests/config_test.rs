//! Configuration loading tests

use serial_test::serial;
use std::io::Write;
use upload_pipeline::config::{Config, ConfigLoader};
use upload_pipeline::upload::SaveSettings;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
storage:
  root: "/srv/site"
  temp_dir: "/var/tmp/uploads"
media:
  auto_set_alt: true
  library_root: "/srv/media"
logging:
  level: debug
  json: true
metrics:
  enabled: false
"#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.storage.root, "/srv/site");
    assert_eq!(config.storage.temp_dir.as_deref(), Some("/var/tmp/uploads"));
    assert!(config.media.auto_set_alt);
    assert_eq!(config.media.library_root, "/srv/media");
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
    assert!(!config.metrics.enabled);

    let settings = SaveSettings::from(&config);
    assert_eq!(settings.storage_root, std::path::PathBuf::from("/srv/site"));
    assert!(settings.auto_set_alt);
}

#[test]
fn test_partial_config_uses_defaults() {
    let file = write_config("media:\n  auto_set_alt: true\n");
    let config = Config::load(file.path()).unwrap();

    assert!(config.media.auto_set_alt);
    assert_eq!(config.media.library_root, "media");
    assert_eq!(config.storage.root, ".");
    assert!(config.storage.temp_dir.is_none());
    assert!(config.metrics.enabled);
}

#[test]
#[serial]
fn test_env_expansion_with_default() {
    std::env::remove_var("UPLOAD_PIPELINE_SITE_ROOT");
    let config = ConfigLoader::parse("storage:\n  root: \"${UPLOAD_PIPELINE_SITE_ROOT:-/srv/default}\"\n")
        .unwrap();
    assert_eq!(config.storage.root, "/srv/default");

    std::env::set_var("UPLOAD_PIPELINE_SITE_ROOT", "/srv/from-env");
    let config = ConfigLoader::parse("storage:\n  root: \"${UPLOAD_PIPELINE_SITE_ROOT:-/srv/default}\"\n")
        .unwrap();
    assert_eq!(config.storage.root, "/srv/from-env");
    std::env::remove_var("UPLOAD_PIPELINE_SITE_ROOT");
}

#[test]
fn test_invalid_log_level_rejected() {
    let file = write_config("logging:\n  level: loud\n");
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_malformed_yaml_rejected() {
    let file = write_config("storage: [unclosed");
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_missing_file_rejected() {
    assert!(Config::load("/definitely/not/here.yaml").is_err());
}
