use mica_config::{CatalogConfig, ConfigProvider, FileDiscovery};
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
#[serial]
fn test_full_file_round_trips_every_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mica.yaml");
    std::fs::write(
        &path,
        r#"
database:
  path: /var/lib/mica/catalog.db
scripts:
  timeout: 2500
  workers: 4
  step_budget: 5000
history:
  retention_days: 14
render:
  strict: true
fetch:
  remote_timeout_ms: 1000
  default_limit: 500
  secrets:
    staging: abc
catalog:
  require_registered_kinds: true
"#,
    )
    .unwrap();

    let config: CatalogConfig = ConfigProvider::new()
        .with_discovery(FileDiscovery::with_dirs(None, Some(dir.path().to_path_buf())))
        .with_env(false)
        .load()
        .unwrap();

    assert_eq!(
        config.database.path,
        Some(PathBuf::from("/var/lib/mica/catalog.db"))
    );
    assert_eq!(config.scripts.timeout, Duration::from_millis(2500));
    assert_eq!(config.scripts.workers, 4);
    assert_eq!(config.scripts.step_budget, 5000);
    assert_eq!(config.history.retention().days, 14);
    assert!(config.render.strict);
    assert_eq!(config.fetch.remote_timeout(), Duration::from_secs(1));
    assert_eq!(config.fetch.default_limit, Some(500));
    assert_eq!(config.fetch.secrets["staging"], "abc");
    assert!(config.catalog.require_registered_kinds);
}

#[test]
#[serial]
fn test_database_path_from_environment() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("env.db");
    std::env::set_var("MICA_DATABASE__PATH", &db);
    let loaded = ConfigProvider::new()
        .with_discovery(FileDiscovery::with_dirs(
            Some(dir.path().join("none")),
            Some(dir.path().join("none")),
        ))
        .load();
    std::env::remove_var("MICA_DATABASE__PATH");

    assert_eq!(loaded.unwrap().database.path, Some(db));
}
