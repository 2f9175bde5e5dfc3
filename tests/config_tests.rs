//! Configuration integration tests

use vendorchat::config::{Config, ConfigError};
use vendorchat::llm::adapters::{create_qwen_adapter, Transport};

#[test]
fn test_env_credentials_resolved() {
    std::env::set_var("VENDORCHAT_TEST_QWEN_KEY", "sk-from-env");
    let config = Config::from_toml(
        r#"
[qwen]
api_key = "env:VENDORCHAT_TEST_QWEN_KEY"
randomness = 0.2
history_max_char = 100
"#,
    )
    .unwrap();
    let qwen = config.qwen().unwrap();
    assert_eq!(qwen.api_key, "sk-from-env");
    assert_eq!(qwen.history_limits().max_char, Some(100));

    let adapter = create_qwen_adapter(qwen, Transport::default()).unwrap();
    assert_eq!(adapter.randomness(), 0.2);
}

#[test]
fn test_unset_env_credential_rejected() {
    let result = Config::from_toml(
        r#"
[baidu]
api_key = "env:VENDORCHAT_TEST_SURELY_UNSET"
secret_key = "sk"
"#,
    );
    assert!(matches!(result, Err(ConfigError::MissingCredential(_))));
}

#[test]
fn test_load_from_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("vendorchat.toml");
    std::fs::write(
        &path,
        "[translate]\napp_id = \"id\"\napp_key = \"key\"\n\n[request_log]\npath = \"r.db\"\n",
    )
    .unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.translate().unwrap().max_len, 6000);
    assert!(config.request_log_path().is_ok());
    assert!(matches!(config.qwen(), Err(ConfigError::MissingSection("qwen"))));
}

#[test]
fn test_missing_file_reports_path() {
    let err = Config::load(std::path::Path::new("/nonexistent/vendorchat.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/vendorchat.toml"));
}
