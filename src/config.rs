use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    #[clap(long)]
    pub conf: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http_addr: String,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub calls_api: CallsApiConfig,
    pub mapping_store: MappingStoreConfig,
    pub fetch_strategy: FetchStrategy,
}

/// Upstream calls API endpoint and credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallsApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

/// Backend for the (user email, assistant id) permission relation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum MappingStoreConfig {
    Memory,
    Http {
        url: String,
        email_field: Option<String>,
        assistant_field: Option<String>,
        headers: Option<HashMap<String, String>>,
    },
}

/// How restricted call listings are fetched upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// One bulk request with server-side id filtering, re-checked
    /// client-side.
    #[default]
    Bulk,
    /// One request per permitted assistant, issued sequentially. Use
    /// when the bulk endpoint cannot filter reliably.
    PerAssistant,
}

impl Default for CallsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.vapi.ai".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl Default for MappingStoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            log_level: Some("info".to_string()),
            log_file: None,
            calls_api: CallsApiConfig::default(),
            mapping_store: MappingStoreConfig::default(),
            fetch_strategy: FetchStrategy::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }

    /// CALLS_API_KEY from the environment (or a .env file) overrides the
    /// config file, so the key can stay out of version control.
    pub fn apply_env(&mut self) {
        let _ = dotenv();
        if let Ok(key) = std::env::var("CALLS_API_KEY") {
            if !key.trim().is_empty() {
                self.calls_api.api_key = key;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.calls_api.base_url, "https://api.vapi.ai");
        assert!(matches!(config.mapping_store, MappingStoreConfig::Memory));
        assert_eq!(config.fetch_strategy, FetchStrategy::Bulk);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
http_addr = "127.0.0.1:9090"
log_level = "debug"
fetch_strategy = "per_assistant"

[calls_api]
base_url = "https://api.example.com/"
api_key = "secret"
timeout_secs = 10

[mapping_store]
type = "http"
url = "https://db.example.com/rest/v1/user_assistant_mappings"
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.http_addr, "127.0.0.1:9090");
        assert_eq!(config.fetch_strategy, FetchStrategy::PerAssistant);
        assert_eq!(config.calls_api.api_key, "secret");
        assert_eq!(config.calls_api.timeout_secs, 10);
        match config.mapping_store {
            MappingStoreConfig::Http { ref url, .. } => {
                assert_eq!(url, "https://db.example.com/rest/v1/user_assistant_mappings");
            }
            _ => panic!("expected http mapping store"),
        }
    }
}
