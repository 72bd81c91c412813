//! Integration tests for consult-config

use consult_config::domains::logging::{LogFormat, LogLevel};
use consult_config::*;
use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = ConsultConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("CONSULT_BASE_URL", Some("https://api.consult.example/api")),
        ("CONSULT_TIMEOUT_MS", Some("5000")),
        ("CONSULT_RETRY_MAX_ATTEMPTS", Some("1")),
        ("CONSULT_RETRY_MAX_FAILURES", Some("3")),
        ("CONSULT_CACHE_TTL_MS", Some("100")),
        ("CONSULT_LOG_LEVEL", Some("debug")),
        ("CONSULT_TOKEN_FILE", Some("/tmp/consult-token.json")),
    ];

    with_vars(vars, || {
        let loader = ConfigLoader::new();
        let config = loader.from_env().unwrap();

        assert_eq!(config.http.base_url, "https://api.consult.example/api");
        assert_eq!(config.http.timeout, Duration::from_millis(5000));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.max_failures, 3);
        assert_eq!(config.cache.default_ttl, Duration::from_millis(100));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.auth.token_file.as_deref(),
            Some(std::path::Path::new("/tmp/consult-token.json"))
        );
    });
}

#[test]
fn test_invalid_env_value_is_reported() {
    with_vars(vec![("CONSULT_RETRY_MAX_FAILURES", Some("many"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
        assert!(err.to_string().contains("RETRY_MAX_FAILURES"));
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("PORTAL_CACHE_ENABLED", Some("false"))], || {
        let config = ConfigLoader::with_prefix("PORTAL").from_env().unwrap();
        assert!(!config.cache.enabled);
    });
}

#[test]
fn test_yaml_config_serialization() {
    let yaml = ConsultConfig::generate_sample();
    assert!(yaml.contains("base_url"));
    assert!(yaml.contains("reset_timeout_ms"));

    let parsed: ConsultConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
}

#[test]
fn test_comprehensive_config_file() {
    let yaml = r#"
http:
  base_url: "https://portal.example.org/api"
  timeout_ms: 10000
  app_version: "2.3.1"

retry:
  max_attempts: 2
  max_failures: 4
  base_delay_ms: 200
  max_delay_ms: 1600
  reset_timeout_ms: 15000

cache:
  enabled: true
  default_ttl_ms: 60000

auth:
  refresh_path: "/auth/refresh"
  token_lifetime_secs: 3600

logging:
  level: warn
  format: json
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = ConfigLoader::with_prefix("CONSULT_TEST_UNSET")
        .from_file(file.path())
        .unwrap();

    assert_eq!(config.http.base_url, "https://portal.example.org/api");
    assert_eq!(config.http.timeout, Duration::from_secs(10));
    assert_eq!(config.http.app_version, "2.3.1");
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.retry.max_delay, Duration::from_millis(1600));
    assert_eq!(config.cache.default_ttl, Duration::from_secs(60));
    assert_eq!(config.auth.token_lifetime, Duration::from_secs(3600));
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_invalid_file_fails_validation() {
    let yaml = "retry:\n  base_delay_ms: 9000\n  max_delay_ms: 100\n";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let err = ConfigLoader::with_prefix("CONSULT_TEST_UNSET")
        .from_file(file.path())
        .unwrap_err();
    match err {
        ConfigError::DomainError { domain, .. } => assert_eq!(domain, "retry"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_file() {
    let result = ConfigLoader::new().load(Some("/definitely/not/here/consult.yaml"));
    assert!(matches!(result, Err(ConfigError::FileReadError(_))));
}
