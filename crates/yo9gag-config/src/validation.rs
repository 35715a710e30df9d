// Configuration validation
//
// Every failure here is fatal at startup: the component refuses to run.

use super::*;
use anyhow::{bail, Result};
use std::collections::HashSet;

/// Length of a valid Yo API access token
pub const YO_API_TOKEN_LENGTH: usize = 36;

pub fn validate_config(config: &RuntimeConfig, component: Component) -> Result<()> {
    validate_store_config(&config.store)?;
    validate_yo_config(&config.yo)?;
    validate_ranking_config(&config.ranking)?;

    if component == Component::Server {
        let server = config
            .server
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("server configuration required"))?;
        validate_server_config(server)?;
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<()> {
    if config.backend == StoreBackend::Redis {
        let redis = config
            .redis
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("redis store backend requires 'redis' configuration"))?;

        if redis.url.is_empty() {
            bail!(
                "Redis URL is required\n\n\
                How to fix:\n\
                  • Environment: export REDISCLOUD_URL=redis://:password@host:6379\n\
                  • Environment: export {}REDIS_URL=redis://:password@host:6379\n\
                  • TOML: [store.redis]\n              url = \"redis://:password@host:6379\"\n",
                ENV_PREFIX
            );
        }

        if redis.connect_max_attempts == 0 {
            bail!("store.redis.connect_max_attempts must be greater than 0");
        }
    }

    let mut seen = HashSet::new();
    for key in config.keys.all() {
        if key.is_empty() {
            bail!("store.keys entries must not be empty");
        }
        if !seen.insert(key) {
            bail!("store.keys entries must be distinct, '{}' is used twice", key);
        }
    }

    Ok(())
}

fn validate_yo_config(config: &YoConfig) -> Result<()> {
    validate_http_url("yo.api_url", &config.api_url)?;

    if config.api_token.chars().count() != YO_API_TOKEN_LENGTH {
        bail!(
            "Yo API token is invalid (expected {} characters, got {})\n\n\
            How to fix:\n\
              • Environment: export YO_API_TOKEN=<your-token>\n\
              • TOML: [yo]\n              api_token = \"<your-token>\"\n",
            YO_API_TOKEN_LENGTH,
            config.api_token.chars().count()
        );
    }

    Ok(())
}

/// Broadcast delays above this are accepted but reported
const LARGE_BROADCAST_DELAY_MS: u64 = 60_000;

/// Settings that are valid but probably unintended.
///
/// Validation runs before logging is configured, so these are returned to
/// the caller to log once its subscriber is installed.
pub fn config_warnings(config: &RuntimeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.yo.broadcast_delay_ms > LARGE_BROADCAST_DELAY_MS {
        warnings.push(format!(
            "yo.broadcast_delay_ms is very large ({} ms); the uploader waits for every broadcast",
            config.yo.broadcast_delay_ms
        ));
    }

    warnings
}

fn validate_ranking_config(config: &RankingConfig) -> Result<()> {
    validate_http_url("ranking.api_url", &config.api_url)?;

    if config.target_count == 0 {
        bail!("ranking.target_count must be greater than 0");
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    Ok(())
}

fn validate_http_url(field: &str, url: &str) -> Result<()> {
    if url.is_empty() {
        bail!("{} must not be empty", field);
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{} must be an http(s) URL, got '{}'", field, url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_yo_token_length() {
        let mut yo = YoConfig {
            api_token: "a".repeat(YO_API_TOKEN_LENGTH),
            ..Default::default()
        };
        assert!(validate_yo_config(&yo).is_ok());

        yo.api_token = "a".repeat(YO_API_TOKEN_LENGTH + 1);
        assert!(validate_yo_config(&yo).is_err());

        yo.api_token = String::new();
        assert!(validate_yo_config(&yo).is_err());
    }

    #[test]
    fn test_validate_store_config() {
        let memory = StoreConfig {
            backend: StoreBackend::Memory,
            redis: None,
            keys: StoreKeys::default(),
        };
        assert!(validate_store_config(&memory).is_ok());

        // Redis without a URL
        let redis = StoreConfig::default();
        assert!(validate_store_config(&redis).is_err());

        // Two logical structures sharing a key
        let mut clashing = memory.clone();
        clashing.keys.popular = clashing.keys.candidates.clone();
        assert!(validate_store_config(&clashing).is_err());
    }

    #[test]
    fn test_validate_ranking_config() {
        assert!(validate_ranking_config(&RankingConfig::default()).is_ok());

        let zero = RankingConfig {
            target_count: 0,
            ..Default::default()
        };
        assert!(validate_ranking_config(&zero).is_err());

        let not_http = RankingConfig {
            api_url: "ftp://ranking".to_string(),
            ..Default::default()
        };
        assert!(validate_ranking_config(&not_http).is_err());
    }

    #[test]
    fn test_large_broadcast_delay_is_a_warning_not_an_error() {
        let mut config = RuntimeConfig::from_component_defaults(Component::Uploader);
        assert!(config_warnings(&config).is_empty());

        config.yo.api_token = "a".repeat(YO_API_TOKEN_LENGTH);
        config.yo.broadcast_delay_ms = LARGE_BROADCAST_DELAY_MS + 1;
        assert!(validate_yo_config(&config.yo).is_ok());
        let warnings = config_warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("broadcast_delay_ms"));
    }
}
