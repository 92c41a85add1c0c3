use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefaults {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on observe-decide-act steps per run.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// At most this many actions are executed from a single LLM turn.
    #[serde(default = "default_max_actions_per_step")]
    pub max_actions_per_step: u32,
    /// Consecutive action failures before the run is aborted.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_llm_max_retries")]
    pub llm_max_retries: u32,
    /// Base delay for LLM retry backoff. The default is generous so free-tier
    /// rate limits are respected.
    #[serde(default = "default_llm_retry_delay_ms")]
    pub llm_retry_delay_ms: u64,
    /// Explicit LLM provider. If unset, inferred from the model prefix.
    #[serde(default)]
    pub provider: Option<String>,
}

fn default_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_steps() -> u32 {
    20
}

fn default_max_actions_per_step() -> u32 {
    4
}

fn default_max_failures() -> u32 {
    5
}

fn default_llm_max_retries() -> u32 {
    10
}

fn default_llm_retry_delay_ms() -> u64 {
    10_000
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_steps: default_max_steps(),
            max_actions_per_step: default_max_actions_per_step(),
            max_failures: default_max_failures(),
            llm_max_retries: default_llm_max_retries(),
            llm_retry_delay_ms: default_llm_retry_delay_ms(),
            provider: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// Run Chrome with a visible window. Job boards are significantly less
    /// hostile to headed sessions.
    #[serde(default = "default_headed")]
    pub headed: bool,
    /// Chrome/Chromium binary override. Auto-discovered when unset.
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default = "default_navigate_settle_ms")]
    pub navigate_settle_ms: u64,
    #[serde(default = "default_wait_between_actions_ms")]
    pub wait_between_actions_ms: u64,
}

fn default_headed() -> bool {
    true
}

fn default_navigate_settle_ms() -> u64 {
    3000
}

fn default_wait_between_actions_ms() -> u64 {
    2000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headed: default_headed(),
            executable: None,
            navigate_settle_ms: default_navigate_settle_ms(),
            wait_between_actions_ms: default_wait_between_actions_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8012
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub agent: AgentDefaults,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from the standard location, falling back to defaults when the
    /// config file does not exist yet.
    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let path = paths.config_file();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, paths: &Paths) -> Result<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// API key for a provider, with environment variables taking precedence
    /// over the config file (GEMINI_API_KEY, OPENAI_API_KEY, ...).
    pub fn api_key(&self, provider: &str) -> Option<String> {
        let env_name = format!("{}_API_KEY", provider.to_uppercase());
        if let Ok(key) = std::env::var(&env_name) {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.providers
            .get(provider)
            .map(|p| p.api_key.clone())
            .filter(|k| !k.is_empty())
    }

    pub fn api_base(&self, provider: &str) -> Option<String> {
        self.providers.get(provider).and_then(|p| p.api_base.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.agent.max_actions_per_step, 4);
        assert_eq!(config.agent.max_failures, 5);
        assert_eq!(config.server.port, 8012);
        assert!(config.browser.headed);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{"agent": {"model": "gemini-2.0-flash"}, "server": {"port": 9000}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.agent.model, "gemini-2.0-flash");
        assert_eq!(config.agent.max_steps, 20);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_api_key_from_config() {
        let mut config = Config::default();
        config.providers.insert(
            "acme".to_string(),
            ProviderConfig {
                api_key: "test-key".to_string(),
                api_base: None,
            },
        );
        assert_eq!(config.api_key("acme"), Some("test-key".to_string()));
        assert_eq!(config.api_key("nonexistent"), None);
    }
}
