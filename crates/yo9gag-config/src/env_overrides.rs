use super::{LogFormat, RedisConfig, RuntimeConfig, ServerConfig, StoreBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "YO9GAG_";

/// Abstraction over environment-variable lookups so tests can supply
/// their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the YO9GAG_ prefix
    /// Used for the legacy deployment variables (REDISCLOUD_URL, PORT, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
///
/// Every setting can be given as `YO9GAG_<NAME>`; most also accept the legacy
/// un-prefixed name older deployments used. The prefixed name wins.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Store backend
    if let Some(backend) = lookup(env, "STORE_BACKEND", None) {
        config.store.backend = backend
            .parse::<StoreBackend>()
            .context("Invalid YO9GAG_STORE_BACKEND value")?;
    }
    if let Some(url) = lookup(env, "REDIS_URL", Some("REDISCLOUD_URL")) {
        ensure_redis(config).url = url;
    }
    if let Some(val) = parse_u32(env, "REDIS_CONNECT_MAX_ATTEMPTS", Some("REDIS_CONNECT_MAX_ATTEMPTS"))? {
        ensure_redis(config).connect_max_attempts = val;
    }

    // Store key names
    let keys = &mut config.store.keys;
    if let Some(key) = lookup(env, "REDIS_KEY_TOP9GAGS", Some("REDIS_KEY_TOP9GAGS")) {
        keys.candidates = key;
    }
    if let Some(key) = lookup(env, "REDIS_KEY_BEST9GAGS", Some("REDIS_KEY_BEST9GAGS")) {
        keys.popular = key;
    }
    if let Some(key) = lookup(env, "REDIS_KEY_SUBSCRIBERS", Some("REDIS_KEY_SUBSCRIBERS")) {
        keys.subscribers = key;
    }
    if let Some(key) = lookup(
        env,
        "REDIS_KEY_STATISTICS_YO_COUNT",
        Some("REDIS_KEY_STATISTICS_YO_COUNT"),
    ) {
        keys.yo_count = key;
    }
    if let Some(key) = lookup(
        env,
        "REDIS_KEY_STATISTICS_NEW_SUBSCRIBER_COUNT",
        Some("REDIS_KEY_STATISTICS_NEW_SUBSCRIBER_COUNT"),
    ) {
        keys.new_subscriber_count = key;
    }

    // Yo API
    if let Some(url) = lookup(env, "YO_API_URL", Some("YO_API_URL")) {
        config.yo.api_url = url;
    }
    if let Some(token) = lookup(env, "YO_API_TOKEN", Some("YO_API_TOKEN")) {
        config.yo.api_token = token;
    }
    if let Some(val) = parse_u64(env, "YO_BROADCAST_DELAY_MS", None)? {
        config.yo.broadcast_delay_ms = val;
    }

    // Ranking API
    if let Some(url) = lookup(env, "RANKING_API_URL", Some("INFINIGAG_API_URL")) {
        config.ranking.api_url = url;
    }
    if let Some(val) = parse_usize(env, "TARGET_COUNT", Some("TOP9GAGS_COUNT"))? {
        config.ranking.target_count = val;
    }
    if let Some(val) = parse_u64(env, "POPULAR_VOTES", Some("BEST9GAGS_VOTES_COUNT"))? {
        config.ranking.popular_votes = val;
    }

    // Logging
    if let Some(level) = lookup(env, "LOG_LEVEL", None) {
        config.log.level = level;
    }
    if let Some(format) = lookup(env, "LOG_FORMAT", None) {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Server settings are ignored by components that don't listen
    if let Some(server) = config.server.as_mut() {
        apply_server_overrides(server, env)?;
    }

    Ok(())
}

fn apply_server_overrides<E: EnvSource>(server: &mut ServerConfig, env: &E) -> Result<()> {
    if let Some(port) = env.get_raw("PORT") {
        let port = port
            .parse::<u16>()
            .map_err(|e| anyhow!("Failed to parse PORT: {}", e))?;
        server.listen_addr = format!("0.0.0.0:{}", port);
    }
    if let Some(addr) = env.get("LISTEN_ADDR") {
        server.listen_addr = addr;
    }
    Ok(())
}

fn ensure_redis(config: &mut RuntimeConfig) -> &mut RedisConfig {
    config.store.redis.get_or_insert_with(RedisConfig::default)
}

/// Prefixed variable first, then the legacy name if there is one.
fn lookup<E: EnvSource>(env: &E, key: &str, legacy: Option<&str>) -> Option<String> {
    env.get(key)
        .or_else(|| legacy.and_then(|name| env.get_raw(name)))
}

fn parse_usize<E: EnvSource>(env: &E, key: &str, legacy: Option<&str>) -> Result<Option<usize>> {
    match lookup(env, key, legacy) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn parse_u64<E: EnvSource>(env: &E, key: &str, legacy: Option<&str>) -> Result<Option<u64>> {
    match lookup(env, key, legacy) {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn parse_u32<E: EnvSource>(env: &E, key: &str, legacy: Option<&str>) -> Result<Option<u32>> {
    match lookup(env, key, legacy) {
        Some(val) => {
            let parsed = val
                .parse::<u32>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
