//! Explicit, constructed-once configuration. Components never read ambient
//! environment state; the CLI resolves the environment into this struct at
//! process start and passes it down.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub provider: ProviderConfig,

    #[serde(default = "default_max_tokens_per_batch")]
    pub max_tokens_per_batch: usize,

    #[serde(default = "default_literal_char_limit")]
    pub literal_char_limit: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "openai")]
    OpenAi {
        model: String,
        api_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    /// Offline provider, for tests and dry runs.
    #[serde(rename = "mock")]
    Mock,
}

fn default_max_tokens_per_batch() -> usize {
    24_000
}
fn default_literal_char_limit() -> usize {
    200
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_response_tokens() -> u32 {
    8000
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_timeout_seconds() -> u64 {
    120
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::OpenAi {
                model: "gpt-4o".to_string(),
                api_key: None,
                base_url: None,
            },
            max_tokens_per_batch: default_max_tokens_per_batch(),
            literal_char_limit: default_literal_char_limit(),
            temperature: default_temperature(),
            max_response_tokens: default_max_response_tokens(),
            retry_attempts: default_retry_attempts(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl DetectorConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert!(matches!(config.provider, ProviderConfig::OpenAi { .. }));
        assert_eq!(config.max_tokens_per_batch, 24_000);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = DetectorConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: DetectorConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.max_tokens_per_batch, config.max_tokens_per_batch);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: DetectorConfig =
            serde_yaml::from_str("provider:\n  type: mock\n").unwrap();
        assert!(matches!(parsed.provider, ProviderConfig::Mock));
        assert_eq!(parsed.literal_char_limit, 200);
        assert_eq!(parsed.temperature, 0.1);
        assert_eq!(parsed.retry_attempts, 3);
        assert_eq!(parsed.timeout_seconds, 120);
    }

    #[test]
    fn test_yaml_overrides_retry_and_timeout() {
        let parsed: DetectorConfig = serde_yaml::from_str(
            "provider:\n  type: mock\nretry_attempts: 5\ntimeout_seconds: 30\n",
        )
        .unwrap();
        assert_eq!(parsed.retry_attempts, 5);
        assert_eq!(parsed.timeout_seconds, 30);
    }
}
