use std::time::Duration;
use vigil_engine::config::{ConfigLoader, VigilConfig};

#[test]
fn test_empty_config_uses_defaults() {
    let config = ConfigLoader::parse("").unwrap();
    assert_eq!(config.monitor.default_interval_secs, 10);
    assert_eq!(config.recovery.reopen_delay(), Duration::from_secs(10));
    assert_eq!(config.recovery.fallback_delay(), Duration::from_secs(3));
    assert_eq!(
        config.recovery.signals,
        vec!["403", "forbidden", "403 forbidden", "access denied"]
    );
    assert!(config.store.path.is_none());
}

#[test]
fn test_partial_override() {
    let yaml = r#"
monitor:
  default_interval_secs: 30
recovery:
  signals: ["captcha"]
store:
  path: /tmp/vigil-session.json
"#;
    let config: VigilConfig = ConfigLoader::parse(yaml).unwrap();
    assert_eq!(config.monitor.default_interval_secs, 30);
    assert_eq!(config.monitor.banner_duration_ms, 10_000);
    assert_eq!(config.recovery.signals, vec!["captcha"]);
    assert_eq!(config.recovery.reopen_delay_ms, 10_000);
    assert_eq!(
        config.store.resolved_path(),
        std::path::PathBuf::from("/tmp/vigil-session.json")
    );
}

#[test]
fn test_invalid_yaml_is_parse_error() {
    assert!(ConfigLoader::parse("monitor: [").is_err());
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vigil.yaml");
    std::fs::write(&path, "recovery:\n  fallback_delay_ms: 500\n").unwrap();

    let config = ConfigLoader::load_from(&path).await.unwrap();
    assert_eq!(config.recovery.fallback_delay(), Duration::from_millis(500));
}
