//! Configuration
//!
//! TOML file with one section per vendor. Credentials may be written as
//! `env:NAME` to read them from the environment.

use crate::llm::adapters::resolve_env_var;
use crate::llm::adapters::qwen::QWEN_MODEL;
use crate::llm::history::WindowLimits;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration errors (fatal to setup)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("randomness must be within [0, 1], got {0}")]
    InvalidRandomness(f64),

    #[error("Missing [{0}] section in config")]
    MissingSection(&'static str),

    #[error("Missing credential '{0}' (empty or unresolved env reference)")]
    MissingCredential(String),

    #[error("No request log database configured ([request_log] path)")]
    MissingDatabase,
}

/// Whole configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub qwen: Option<QwenConfig>,
    pub baidu: Option<BaiduConfig>,
    pub translate: Option<TranslateConfig>,
    pub request_log: Option<RequestLogConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[qwen]`
#[derive(Debug, Clone, Deserialize)]
pub struct QwenConfig {
    pub api_key: String,
    #[serde(default = "default_qwen_model")]
    pub model: String,
    /// System description prepended to every request
    pub system: Option<String>,
    #[serde(default = "default_randomness")]
    pub randomness: f64,
    pub history_max_char: Option<usize>,
    /// Seconds
    pub history_max_time: Option<f64>,
}

impl QwenConfig {
    pub fn history_limits(&self) -> WindowLimits {
        WindowLimits::new(self.history_max_char, self.history_max_time)
    }
}

/// `[baidu]`
#[derive(Debug, Clone, Deserialize)]
pub struct BaiduConfig {
    pub api_key: String,
    pub secret_key: String,
    #[serde(default = "default_token_valid_seconds")]
    pub token_valid_seconds: u64,
    /// ERNIE system character
    pub character: Option<String>,
}

/// `[translate]`
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateConfig {
    pub app_id: String,
    pub app_key: String,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

/// `[request_log]`
#[derive(Debug, Clone, Deserialize)]
pub struct RequestLogConfig {
    pub path: PathBuf,
}

/// `[logging]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to this file
    pub file: Option<PathBuf>,
    /// Filter directive, e.g. `info` or `vendorchat=debug`
    pub level: Option<String>,
}

fn default_qwen_model() -> String {
    QWEN_MODEL.to_string()
}

fn default_randomness() -> f64 {
    0.5
}

fn default_token_valid_seconds() -> u64 {
    43200
}

fn default_max_len() -> usize {
    6000
}

impl Config {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse, resolve `env:` references and validate
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.resolve()?;
        Ok(config)
    }

    fn resolve(&mut self) -> Result<(), ConfigError> {
        if let Some(qwen) = &mut self.qwen {
            qwen.api_key = credential("qwen.api_key", &qwen.api_key)?;
            if !(0.0..=1.0).contains(&qwen.randomness) {
                return Err(ConfigError::InvalidRandomness(qwen.randomness));
            }
        }
        if let Some(baidu) = &mut self.baidu {
            baidu.api_key = credential("baidu.api_key", &baidu.api_key)?;
            baidu.secret_key = credential("baidu.secret_key", &baidu.secret_key)?;
        }
        if let Some(translate) = &mut self.translate {
            translate.app_id = credential("translate.app_id", &translate.app_id)?;
            translate.app_key = credential("translate.app_key", &translate.app_key)?;
        }
        Ok(())
    }

    pub fn qwen(&self) -> Result<&QwenConfig, ConfigError> {
        self.qwen.as_ref().ok_or(ConfigError::MissingSection("qwen"))
    }

    pub fn baidu(&self) -> Result<&BaiduConfig, ConfigError> {
        self.baidu.as_ref().ok_or(ConfigError::MissingSection("baidu"))
    }

    pub fn translate(&self) -> Result<&TranslateConfig, ConfigError> {
        self.translate
            .as_ref()
            .ok_or(ConfigError::MissingSection("translate"))
    }

    /// Request log path; required by commands that only read the log
    pub fn request_log_path(&self) -> Result<&Path, ConfigError> {
        self.request_log
            .as_ref()
            .map(|log| log.path.as_path())
            .ok_or(ConfigError::MissingDatabase)
    }
}

fn credential(name: &str, value: &str) -> Result<String, ConfigError> {
    let resolved = resolve_env_var(value);
    if resolved.is_empty() || resolved.starts_with("env:") {
        return Err(ConfigError::MissingCredential(name.to_string()));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_in() {
        let config = Config::from_toml(
            r#"
[qwen]
api_key = "sk-1"

[translate]
app_id = "id"
app_key = "key"
"#,
        )
        .unwrap();
        let qwen = config.qwen().unwrap();
        assert_eq!(qwen.model, "qwen-turbo-latest");
        assert_eq!(qwen.randomness, 0.5);
        assert_eq!(config.translate().unwrap().max_len, 6000);
        assert!(matches!(
            config.baidu(),
            Err(ConfigError::MissingSection("baidu"))
        ));
        assert!(matches!(
            config.request_log_path(),
            Err(ConfigError::MissingDatabase)
        ));
    }

    #[test]
    fn test_randomness_out_of_range() {
        let result = Config::from_toml("[qwen]\napi_key = \"k\"\nrandomness = 1.5\n");
        assert!(matches!(result, Err(ConfigError::InvalidRandomness(r)) if r == 1.5));
    }

    #[test]
    fn test_unresolved_env_credential() {
        let result = Config::from_toml(
            "[baidu]\napi_key = \"env:VENDORCHAT_CONFIG_UNSET\"\nsecret_key = \"s\"\n",
        );
        match result {
            Err(ConfigError::MissingCredential(name)) => assert_eq!(name, "baidu.api_key"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_history_limits() {
        let config = Config::from_toml(
            "[qwen]\napi_key = \"k\"\nhistory_max_char = 100\nhistory_max_time = 60.0\n",
        )
        .unwrap();
        let limits = config.qwen().unwrap().history_limits();
        assert_eq!(limits.max_char, Some(100));
        assert_eq!(limits.max_time, Some(60.0));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Config::from_toml("[qwen"),
            Err(ConfigError::Parse(_))
        ));
    }
}
