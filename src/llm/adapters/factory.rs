//! Adapter factory
//!
//! Creates adapter instances from configuration.

use crate::config::QwenConfig;
use crate::llm::adapters::qwen::QwenAdapter;
use crate::llm::adapters::transport::Transport;
use crate::llm::adapters::AdapterError;

/// Create the Qwen adapter from its config section
pub fn create_qwen_adapter(
    config: &QwenConfig,
    transport: Transport,
) -> Result<QwenAdapter, AdapterError> {
    let api_key = resolve_env_var(&config.api_key);
    if api_key.is_empty() || api_key.starts_with("env:") {
        return Err(AdapterError::Configuration(
            "Missing 'api_key' in [qwen]".to_string(),
        ));
    }
    Ok(QwenAdapter::with_transport(api_key, config.randomness, transport)?.with_model(&config.model))
}

/// Resolve environment variable reference
///
/// If value starts with "env:", read from environment.
/// Otherwise return value as-is; an unset variable leaves the reference unresolved.
pub fn resolve_env_var(value: &str) -> String {
    if let Some(rest) = value.strip_prefix("env:") {
        std::env::var(rest).unwrap_or_else(|_| format!("env:{}", rest))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::adapters::transport::FakeTransport;

    fn qwen_config(api_key: &str) -> QwenConfig {
        toml::from_str(&format!("api_key = \"{}\"", api_key)).unwrap()
    }

    #[test]
    fn test_resolve_env_var_literal() {
        assert_eq!(resolve_env_var("plain-key"), "plain-key");
    }

    #[test]
    fn test_resolve_env_var_from_env() {
        std::env::set_var("VENDORCHAT_FACTORY_TEST_KEY", "from-env");
        assert_eq!(resolve_env_var("env:VENDORCHAT_FACTORY_TEST_KEY"), "from-env");
    }

    #[test]
    fn test_resolve_env_var_unset_stays() {
        assert_eq!(
            resolve_env_var("env:VENDORCHAT_FACTORY_UNSET_KEY"),
            "env:VENDORCHAT_FACTORY_UNSET_KEY"
        );
    }

    #[test]
    fn test_create_qwen_adapter() {
        let adapter = create_qwen_adapter(
            &qwen_config("sk-1"),
            Transport::Fake(FakeTransport::default()),
        )
        .unwrap();
        assert_eq!(adapter.model(), "qwen-turbo-latest");
        assert_eq!(adapter.randomness(), 0.5);
    }

    #[test]
    fn test_create_qwen_adapter_unresolved_key() {
        let result = create_qwen_adapter(
            &qwen_config("env:VENDORCHAT_FACTORY_UNSET_KEY"),
            Transport::Fake(FakeTransport::default()),
        );
        assert!(matches!(result, Err(AdapterError::Configuration(_))));
    }
}
