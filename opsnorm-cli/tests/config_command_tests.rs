//! Integration tests for the `opsnorm config` and `opsnorm normalize` paths.
//!
//! Exercises config loading and rule resolution with real TOML and YAML files.

use std::fs;
use tempfile::TempDir;

use opsnorm_core::config::OpsnormConfig;
use opsnorm_core::types::{LogRecord, Severity, Value};
use opsnorm_log_pipeline::{RuleRegistry, RuleSetLoader};

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A config with two built-in receivers
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("opsnorm.toml");

    let valid_config = r#"
[general]
log_level = "info"
log_format = "json"

[output]
kind = "stdout"

[[receivers]]
name = "couch"
type = "couchdb"

[[receivers]]
name = "es-gc"
type = "elasticsearch_gc"
include_paths = ["/var/log/elasticsearch/gc.log*"]
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let result = OpsnormConfig::load(&config_path).await;

    // Then: Should succeed and keep receiver order
    let config = result.expect("valid config should load");
    assert_eq!(config.receivers.len(), 2);
    assert_eq!(config.receivers[1].kind, "elasticsearch_gc");
    assert_eq!(config.receivers[1].include_paths.len(), 1);
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    // Given: A malformed TOML file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[general\nlog_level = \"info\"\n").expect("should write bad config");

    // When: Loading the config
    let result = OpsnormConfig::load(&config_path).await;

    // Then: Should fail
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    let config_path = std::path::PathBuf::from("/nonexistent/opsnorm.toml");

    let result = OpsnormConfig::load(&config_path).await;

    let err = result.expect_err("missing file should fail to load");
    assert!(err.to_string().contains("/nonexistent/opsnorm.toml"));
}

#[tokio::test]
async fn test_config_validate_empty_file() {
    // Given: An empty config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").expect("should write empty file");

    // When: Loading the config
    let config = OpsnormConfig::load(&config_path)
        .await
        .expect("empty config should use defaults");

    // Then: Defaults apply and there is nothing to tail
    assert!(config.receivers.is_empty());
    assert_eq!(config.output.kind, "stdout");
    assert!(!config.metrics.enabled);
}

#[tokio::test]
async fn test_config_duplicate_receiver_names_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("dup.toml");
    fs::write(
        &config_path,
        "[[receivers]]\nname = \"app\"\ntype = \"couchdb\"\n\n[[receivers]]\nname = \"app\"\ntype = \"solr_system\"\n",
    )
    .expect("should write config");

    let err = OpsnormConfig::load(&config_path)
        .await
        .expect_err("duplicate names should be rejected");
    assert!(err.to_string().contains("duplicate receiver name"));
}

#[tokio::test]
async fn test_config_file_output_requires_path() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("out.toml");
    fs::write(&config_path, "[output]\nkind = \"file\"\n").expect("should write config");

    let result = OpsnormConfig::load(&config_path).await;

    assert!(result.is_err(), "file output without a path should fail");
}

#[tokio::test]
async fn test_config_unicode_paths() {
    // Given: A receiver path with non-ASCII characters
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("unicode.toml");
    fs::write(
        &config_path,
        "[[receivers]]\nname = \"solr\"\ntype = \"solr_system\"\ninclude_paths = [\"/로그/solr.log\"]\n",
    )
    .expect("should write unicode config");

    // When: Loading the config
    let config = OpsnormConfig::load(&config_path)
        .await
        .expect("unicode config should load");

    // Then: The path is preserved
    assert!(config.receivers[0].include_paths[0].contains("로그"));
}

#[tokio::test]
async fn test_config_receiver_type_resolves_from_rule_dir() {
    // Given: A custom rule set in a rule directory and a receiver using it
    let temp_dir = TempDir::new().expect("should create temp dir");
    let rule_dir = temp_dir.path().join("rules");
    fs::create_dir(&rule_dir).expect("should create rule dir");
    fs::write(
        rule_dir.join("access.yaml"),
        r#"
name: access
include_paths:
  - /var/log/app/access.log
processors:
  - type: parse_regex
    rules:
      - pattern: '^(?<method>[A-Z]+) (?<path>\S+) (?<status>\d{3})$'
"#,
    )
    .expect("should write rule set");

    // When: Building a registry from built-ins plus the directory
    let mut registry = RuleRegistry::with_builtins().expect("builtins should compile");
    for rule_set in RuleSetLoader::load_directory(&rule_dir)
        .await
        .expect("rule dir should be readable")
    {
        registry.register(&rule_set).expect("rule set should compile");
    }

    // Then: The custom type resolves and processes a line
    let compiled = registry
        .resolve("web", "access")
        .expect("custom type should resolve");
    assert_eq!(compiled.include_paths().to_vec(), vec!["/var/log/app/access.log"]);
    let record = compiled
        .chain()
        .process(LogRecord::from_text("web", "/var/log/app/access.log", "GET /health 200"));
    assert_eq!(record.fields.get("status"), Some(&Value::from("200")));
    assert!(registry.resolve("web", "nginx").is_err());
}

#[tokio::test]
async fn test_normalize_couchdb_file() {
    // Given: A CouchDB log file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let log_path = temp_dir.path().join("couchdb.log");
    fs::write(
        &log_path,
        "[info] 2023-01-01T12:00:00.000000Z couchdb@127.0.0.1 <0.1.0> -------- Apache CouchDB has started on http://127.0.0.1:5984/\n",
    )
    .expect("should write log");

    // When: Stitching and processing the file with the couchdb rules
    let registry = RuleRegistry::with_builtins().expect("builtins should compile");
    let compiled = registry
        .resolve("couch", "couchdb")
        .expect("couchdb is built in");
    let text = fs::read_to_string(&log_path).expect("should read log");
    let chain = compiled.chain();
    let records: Vec<LogRecord> = compiled
        .stitcher(1000, 512 * 1024)
        .stitch_all(text.lines())
        .into_iter()
        .map(|line| chain.process(LogRecord::from_text("couch", "couchdb.log", line)))
        .collect();

    // Then: One record with severity and body extracted
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].severity(), Some(Severity::Info));
    assert!(records[0].timestamp.is_some());
    assert!(
        records[0]
            .body()
            .is_some_and(|b| b.contains("Apache CouchDB has started"))
    );
}
