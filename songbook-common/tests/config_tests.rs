//! Integration tests for configuration resolution
//!
//! Covers:
//! - Missing config files fall back to defaults
//! - Explicitly requested config files must exist
//! - Priority order: CLI > environment > TOML > default
//!
//! Note: Uses serial_test to prevent environment variable races.
//! Tests touching SONGBOOK_* variables are marked with #[serial].

use serial_test::serial;
use songbook_common::config::{
    load_toml_config, read_toml_config, ClientConfig, ServerConfig, TomlConfig, DEFAULT_API_URL,
    DEFAULT_BIND, DEFAULT_MAX_UPLOAD_BYTES, ENV_API_URL, ENV_BIND, ENV_CONFIG_FILE,
    ENV_DATABASE_URL, ENV_STORAGE_DIR, ENV_UPLOADS_DIR,
};
use songbook_common::Error;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn clear_env() {
    for var in [
        ENV_CONFIG_FILE,
        ENV_API_URL,
        ENV_STORAGE_DIR,
        ENV_DATABASE_URL,
        ENV_UPLOADS_DIR,
        ENV_BIND,
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_client_defaults_without_overrides() {
    clear_env();

    let config = ClientConfig::resolve(&TomlConfig::default(), None, None);

    assert_eq!(config.api_url, DEFAULT_API_URL);
    assert_eq!(config.request_timeout, Duration::from_secs(10));
    assert!(config.storage_dir.ends_with("storage"));
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    clear_env();
    env::set_var(ENV_API_URL, "http://from-env/api");
    env::set_var(ENV_STORAGE_DIR, "/tmp/songbook-env-storage");

    let toml = TomlConfig {
        api_url: Some("http://from-toml/api".into()),
        storage_dir: Some(PathBuf::from("/tmp/songbook-toml-storage")),
        ..Default::default()
    };
    let config = ClientConfig::resolve(&toml, None, None);

    assert_eq!(config.api_url, "http://from-env/api");
    assert_eq!(config.storage_dir, PathBuf::from("/tmp/songbook-env-storage"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_beats_env_var() {
    clear_env();
    env::set_var(ENV_API_URL, "http://from-env/api");

    let config = ClientConfig::resolve(&TomlConfig::default(), Some("http://from-cli/api"), None);
    assert_eq!(config.api_url, "http://from-cli/api");

    clear_env();
}

#[test]
#[serial]
fn test_toml_used_when_no_env() {
    clear_env();

    let toml = TomlConfig {
        api_url: Some("http://from-toml/api".into()),
        request_timeout_secs: Some(4),
        ..Default::default()
    };
    let config = ClientConfig::resolve(&toml, None, None);

    assert_eq!(config.api_url, "http://from-toml/api");
    assert_eq!(config.request_timeout, Duration::from_secs(4));
}

#[test]
#[serial]
fn test_server_defaults_and_overrides() {
    clear_env();

    let defaults = ServerConfig::resolve(&TomlConfig::default(), None);
    assert_eq!(defaults.bind, DEFAULT_BIND);
    assert_eq!(defaults.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    assert!(defaults.database_url.starts_with("sqlite://"));
    assert!(defaults.uploads_dir.ends_with("uploads"));

    env::set_var(ENV_DATABASE_URL, "sqlite::memory:");
    env::set_var(ENV_UPLOADS_DIR, "/tmp/songbook-uploads");
    let overridden = ServerConfig::resolve(&TomlConfig::default(), Some("0.0.0.0:9000"));
    assert_eq!(overridden.bind, "0.0.0.0:9000");
    assert_eq!(overridden.database_url, "sqlite::memory:");
    assert_eq!(overridden.uploads_dir, PathBuf::from("/tmp/songbook-uploads"));

    clear_env();
}

#[test]
#[serial]
fn test_explicit_missing_config_file_is_error() {
    clear_env();

    let result = load_toml_config(Some(Path::new("/nonexistent/songbook/config.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_config_file_from_env_var_is_loaded() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "api_url = \"http://env-file/api\"\n[logging]\nlevel = \"warn\"\n")
        .unwrap();
    env::set_var(ENV_CONFIG_FILE, &path);

    let config = load_toml_config(None).unwrap();
    assert_eq!(config.api_url.as_deref(), Some("http://env-file/api"));
    assert_eq!(config.logging.level, "warn");

    clear_env();
}

#[test]
fn test_malformed_config_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "api_url = [not toml").unwrap();

    let result = read_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}
