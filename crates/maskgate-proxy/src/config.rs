//! Gateway configuration

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Gateway configuration, loaded from YAML with CLI and env overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Service used when a request names no target
    #[serde(default = "default_target")]
    pub default_target: String,

    /// Whether user content is redacted before forwarding
    #[serde(default = "default_true")]
    pub secure_filtering: bool,

    /// Advisory security level echoed back to callers
    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Global rate-limit caps
    #[serde(default)]
    pub rate: RateConfig,

    /// Upstream service registry
    #[serde(default = "default_services")]
    pub services: BTreeMap<String, ServiceConfig>,
}

/// One upstream AI service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL, e.g. `https://openrouter.ai/api/v1`
    pub base_url: String,

    /// Credential injected on forwarded requests. Usually left unset in the
    /// file and resolved from `{NAME}_API_KEY` at startup.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Allowed models; the first entry is the default
    pub models: Vec<String>,
}

/// Sliding-window caps for upstream dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    #[serde(default = "default_per_minute")]
    pub per_minute: usize,

    #[serde(default = "default_per_hour")]
    pub per_hour: usize,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Low,
    Medium,
    #[default]
    High,
}

impl GatewayConfig {
    /// Load configuration from file, or defaults when the file is absent
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            Self::from_yaml(&content)?
        } else {
            Self::default()
        };
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Fill in missing service credentials from `{NAME}_API_KEY` env vars
    pub fn resolve_credentials(&mut self) {
        for (name, service) in &mut self.services {
            if service.api_key.as_deref().map_or(true, str::is_empty) {
                let var = format!("{}_API_KEY", name.to_uppercase());
                if let Ok(value) = std::env::var(&var) {
                    service.api_key = Some(value);
                } else {
                    tracing::warn!(service = %name, env = %var, "no credential configured");
                }
            }
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            default_target: default_target(),
            secure_filtering: true,
            security_level: SecurityLevel::default(),
            rate: RateConfig::default(),
            services: default_services(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_target() -> String {
    "openrouter".to_string()
}

fn default_true() -> bool {
    true
}

fn default_per_minute() -> usize {
    60
}

fn default_per_hour() -> usize {
    1000
}

fn default_services() -> BTreeMap<String, ServiceConfig> {
    let mut services = BTreeMap::new();
    services.insert(
        "openrouter".to_string(),
        ServiceConfig {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            models: vec![
                "anthropic/claude-3-haiku".to_string(),
                "openai/gpt-4".to_string(),
                "meta-llama/llama-3.1-8b-instruct".to_string(),
            ],
        },
    );
    services.insert(
        "openai".to_string(),
        ServiceConfig {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            models: vec!["gpt-4".to_string(), "gpt-3.5-turbo".to_string()],
        },
    );
    services.insert(
        "anthropic".to_string(),
        ServiceConfig {
            base_url: "https://api.anthropic.com/v1".to_string(),
            api_key: None,
            models: vec![
                "claude-3-haiku-20240307".to_string(),
                "claude-3-sonnet-20240229".to_string(),
            ],
        },
    );
    services
}
