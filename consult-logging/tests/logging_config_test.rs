use consult_logging::{init_logging_from_config, init_simple_tracing, LogFormat, LogLevel, LoggingConfig};

#[test]
fn test_logging_config_from_yaml() {
    let yaml_config = r#"
level: debug
format: json
directives:
  - consult_http=trace
"#;

    let config: LoggingConfig = serde_yaml::from_str(yaml_config).unwrap();

    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.directives, vec!["consult_http=trace".to_string()]);
}

#[test]
fn test_minimal_logging_config() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Text);
    assert!(config.directives.is_empty());
}

#[test]
fn test_repeated_initialization_is_harmless() {
    let config = LoggingConfig {
        format: LogFormat::Compact,
        ..Default::default()
    };

    init_logging_from_config(&config).unwrap();
    init_logging_from_config(&config).unwrap();
    init_simple_tracing("debug").unwrap();

    tracing::info!("logging initialized twice without error");
}
