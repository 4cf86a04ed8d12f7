//! Unit tests for configuration resolution and graceful degradation
//!
//! Tests cover:
//! - Root folder priority: CLI > environment > TOML > compiled default
//! - Config path priority: CLI > environment > per-user config dir
//! - Root folder initialization
//! - TOML loading never fails
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SHELFSYNC_ROOT_FOLDER or SHELFSYNC_CONFIG are marked
//! with #[serial] so they run sequentially.

use serial_test::serial;
use shelfsync_common::config::{
    default_root_folder, load_toml_or_default, resolve_config_path, resolve_root_folder, ConfigSource,
    LoggingConfig, RootFolderInitializer, CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = resolve_root_folder(None, ROOT_FOLDER_ENV, None);

    assert!(!root_folder.as_os_str().is_empty());
    assert_eq!(root_folder, default_root_folder());
}

#[test]
#[serial]
fn test_resolver_cli_beats_environment() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/shelfsync-env-root");

    let root_folder = resolve_root_folder(
        Some(Path::new("/tmp/shelfsync-cli-root")),
        ROOT_FOLDER_ENV,
        Some(Path::new("/tmp/shelfsync-toml-root")),
    );
    assert_eq!(root_folder, PathBuf::from("/tmp/shelfsync-cli-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_environment_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/shelfsync-env-root");

    let root_folder = resolve_root_folder(
        None,
        ROOT_FOLDER_ENV,
        Some(Path::new("/tmp/shelfsync-toml-root")),
    );
    assert_eq!(root_folder, PathBuf::from("/tmp/shelfsync-env-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_blank_environment_falls_through_to_toml() {
    env::set_var(ROOT_FOLDER_ENV, "   ");

    let root_folder = resolve_root_folder(
        None,
        ROOT_FOLDER_ENV,
        Some(Path::new("/tmp/shelfsync-toml-root")),
    );
    assert_eq!(root_folder, PathBuf::from("/tmp/shelfsync-toml-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_config_path_environment_override() {
    env::set_var(CONFIG_FILE_ENV, "/tmp/shelfsync-test/config.toml");

    assert_eq!(
        resolve_config_path(None),
        Some(PathBuf::from("/tmp/shelfsync-test/config.toml"))
    );
    assert_eq!(
        resolve_config_path(Some(Path::new("/etc/shelfsync.toml"))),
        Some(PathBuf::from("/etc/shelfsync.toml"))
    );

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
fn test_initializer_database_path() {
    let root = PathBuf::from("/tmp/shelfsync-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("shelfsync.db"));
}

#[test]
fn test_initializer_idempotent_directory_creation() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("nested").join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(root.is_dir());
}

#[derive(Debug, Default, serde::Deserialize, PartialEq)]
#[serde(default)]
struct SampleConfig {
    root_folder: Option<PathBuf>,
    logging: LoggingConfig,
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.toml");

    let (config, source): (SampleConfig, _) = load_toml_or_default(Some(&path));

    assert_eq!(config, SampleConfig::default());
    assert_eq!(source, ConfigSource::Missing(Some(path)));
}

#[test]
fn test_load_malformed_file_uses_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "root_folder = [not toml").unwrap();

    let (config, source): (SampleConfig, _) = load_toml_or_default(Some(&path));

    assert_eq!(config, SampleConfig::default());
    assert!(matches!(source, ConfigSource::Invalid { .. }));
}

#[test]
fn test_load_partial_file_keeps_other_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "root_folder = \"/srv/shelfsync\"\n").unwrap();

    let (config, source): (SampleConfig, _) = load_toml_or_default(Some(&path));

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/shelfsync")));
    assert_eq!(config.logging.level, "info");
    assert_eq!(source, ConfigSource::File(path));
}
