// yo9gag-config - Unified configuration for the webhook server and the uploader
//
// Supports configuration from multiple sources:
// 1. Environment variables (YO9GAG_* prefix, then legacy un-prefixed names)
// 2. Config file path from YO9GAG_CONFIG env var
// 3. Config file contents from YO9GAG_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.yo9gag.toml)
// 5. Component-specific defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod component;
mod env_overrides;
mod sources;
mod validation;

pub use component::Component;
pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use validation::YO_API_TOKEN_LENGTH;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub yo: YoConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

/// Key-value store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,

    pub keys: StoreKeys,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis: Some(RedisConfig::default()),
            keys: StoreKeys::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Redis => write!(f, "redis"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            _ => anyhow::bail!("Unsupported store backend: {}. Supported: redis, memory", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URI, e.g. `redis://:password@host:port`
    pub url: String,
    /// Connection attempts made at startup before giving up
    pub connect_max_attempts: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_max_attempts: 5,
        }
    }
}

/// Names of the five keys shared by the server and the uploader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreKeys {
    /// Set of hot links a random Yo is picked from
    pub candidates: String,
    /// Set of links that already crossed the vote threshold
    pub popular: String,
    pub subscribers: String,
    /// Hash of day -> received Yo count
    pub yo_count: String,
    /// Hash of day -> new subscriber count
    pub new_subscriber_count: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            candidates: "top9gags".to_string(),
            popular: "best9gags".to_string(),
            subscribers: "yo9gag_subscribers".to_string(),
            yo_count: "statistics:yo".to_string(),
            new_subscriber_count: "statistics:new_subscribers".to_string(),
        }
    }
}

impl StoreKeys {
    pub fn all(&self) -> [&str; 5] {
        [
            &self.candidates,
            &self.popular,
            &self.subscribers,
            &self.yo_count,
            &self.new_subscriber_count,
        ]
    }
}

/// Yo push API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoConfig {
    pub api_url: String,
    pub api_token: String,
    pub broadcast_delay_ms: u64,
}

impl Default for YoConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.justyo.co/".to_string(),
            api_token: String::new(),
            broadcast_delay_ms: 1000,
        }
    }
}

impl YoConfig {
    pub fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.broadcast_delay_ms)
    }
}

/// Ranking (InfiniGAG) API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub api_url: String,
    /// Number of links kept in the candidate set
    pub target_count: usize,
    /// Votes a link needs (strictly more than) to be broadcast
    pub popular_votes: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            api_url: "http://infinigag.k3min.eu/".to_string(),
            target_count: 100,
            popular_votes: 40_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Webhook server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration for a component from all sources with priority
    pub fn load(component: Component) -> Result<Self> {
        sources::load_config(component)
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(component: Component, path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(component, path)
    }

    /// Construct a config that contains only component defaults (no env or files).
    pub fn from_component_defaults(component: Component) -> Self {
        component.defaults()
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.store = other.store;
        self.yo = other.yo;
        self.ranking = other.ranking;
        self.log = other.log;

        if other.server.is_some() {
            self.server = other.server;
        }
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration from inline TOML plus overrides supplied by an `EnvSource`.
    pub fn load_with_env<E: EnvSource>(
        component: Component,
        inline_config: Option<&str>,
        env: &E,
    ) -> Result<Self> {
        let mut config = RuntimeConfig::from_component_defaults(component);

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate(component)?;
        Ok(config)
    }

    /// Validate the configuration for the component that will run it
    pub fn validate(&self, component: Component) -> Result<()> {
        validation::validate_config(self, component)
    }

    /// Non-fatal findings about the configuration, for logging at startup
    pub fn warnings(&self) -> Vec<String> {
        validation::config_warnings(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.get_raw(&format!("{}{}", ENV_PREFIX, key))
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    const TOKEN: &str = "0123456789abcdef0123456789abcdef0123";

    #[test]
    fn test_store_backend_from_str() {
        assert_eq!(
            "redis".parse::<StoreBackend>().unwrap(),
            StoreBackend::Redis
        );
        assert_eq!(
            "Memory".parse::<StoreBackend>().unwrap(),
            StoreBackend::Memory
        );
        assert!("dynamo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let ranking = RankingConfig::default();
        assert_eq!(ranking.target_count, 100);
        assert_eq!(ranking.popular_votes, 40_000);

        let keys = StoreKeys::default();
        assert_eq!(keys.candidates, "top9gags");
        assert_eq!(keys.new_subscriber_count, "statistics:new_subscribers");

        let yo = YoConfig::default();
        assert_eq!(yo.broadcast_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_inline_toml_then_env() {
        let inline = r#"
            [store]
            backend = "memory"

            [ranking]
            target_count = 3

            [yo]
            api_token = "0123456789abcdef0123456789abcdef0123"
        "#;
        let env = MapEnv(HashMap::from([("YO9GAG_POPULAR_VOTES", "10")]));

        let config = RuntimeConfig::load_with_env(Component::Uploader, Some(inline), &env).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.ranking.target_count, 3);
        assert_eq!(config.ranking.popular_votes, 10);
        assert_eq!(config.ranking.api_url, "http://infinigag.k3min.eu/");
        assert_eq!(config.store.keys, StoreKeys::default());
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let env = MapEnv(HashMap::from([
            ("YO9GAG_STORE_BACKEND", "memory"),
            ("YO_API_TOKEN", "too-short"),
        ]));
        let err = RuntimeConfig::load_with_env(Component::Server, None, &env).unwrap_err();
        assert!(err.to_string().contains("Yo API token"));

        let env = MapEnv(HashMap::from([
            ("YO9GAG_STORE_BACKEND", "memory"),
            ("YO_API_TOKEN", TOKEN),
        ]));
        assert!(RuntimeConfig::load_with_env(Component::Server, None, &env).is_ok());
    }
}
