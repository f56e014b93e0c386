//! Configuration loader: merges .env, config.toml, and env vars.

use common::{DeskConfig, Error};
use std::path::Path;

/// Upper bound for cache TTLs (one year).
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_non_negative_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

pub fn validate_config(config: &DeskConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
        issues.push(format!(
            "server.bind_addr must be a socket address (got {:?})",
            config.server.bind_addr
        ));
    }
    for origin in &config.server.allowed_origins {
        let well_formed = (origin.starts_with("http://") || origin.starts_with("https://"))
            && !origin.ends_with('/');
        if !well_formed {
            issues.push(format!(
                "server.allowed_origins entries must look like https://host[:port] (got {:?})",
                origin
            ));
        }
    }

    let url = config.upstream.advisory_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        issues.push("upstream.advisory_url must be an http(s) URL".into());
    }
    if config.upstream.timeout_secs == 0 {
        issues.push("upstream.timeout_secs must be > 0".into());
    }

    if config.cache.topic_key.trim().is_empty() {
        issues.push("cache.topic_key must not be empty".into());
    }
    if let Some(redis_url) = &config.cache.redis_url {
        if !(redis_url.starts_with("redis://") || redis_url.starts_with("rediss://")) {
            issues.push("cache.redis_url must start with redis:// or rediss://".into());
        }
    }
    if config.cache.redis_pool_size == 0 {
        issues.push("cache.redis_pool_size must be > 0".into());
    }
    if config.cache.distributed_ttl_secs == 0 || config.cache.distributed_ttl_secs > MAX_TTL_SECS {
        issues.push(format!("cache.distributed_ttl_secs must be in 1..={}", MAX_TTL_SECS));
    }
    if config.cache.memory_ttl_secs == 0 || config.cache.memory_ttl_secs > MAX_TTL_SECS {
        issues.push(format!("cache.memory_ttl_secs must be in 1..={}", MAX_TTL_SECS));
    }
    if config.cache.stale_max_age_secs > config.cache.fresh_max_age_secs {
        issues.push("cache.stale_max_age_secs must be <= cache.fresh_max_age_secs".into());
    }

    if config.timing.heartbeat_secs == 0 {
        issues.push("timing.heartbeat_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Read `config.toml`-style content into a config, defaults filling gaps.
pub fn parse_config_file(contents: &str) -> Result<DeskConfig, Error> {
    toml::from_str(contents).map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
}

/// Apply environment overrides through `lookup`.
pub fn apply_env_overrides<F>(config: &mut DeskConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("SIGNAL_DESK_BIND") {
        config.server.bind_addr = addr.trim().to_string();
    }
    if let Some(raw) = lookup("ALLOWED_ORIGINS") {
        config.server.allowed_origins = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(url) = lookup("ADVISORY_URL") {
        config.upstream.advisory_url = url.trim().to_string();
    }
    if let Some(raw) = lookup("UPSTREAM_TIMEOUT_SECS") {
        config.upstream.timeout_secs = parse_positive_u64(&raw, "UPSTREAM_TIMEOUT_SECS")?;
    }
    if let Some(url) = lookup("REDIS_URL") {
        let trimmed = url.trim();
        config.cache.redis_url = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
    if let Some(key) = lookup("CACHE_TOPIC_KEY") {
        config.cache.topic_key = key.trim().to_string();
    }
    if let Some(raw) = lookup("CACHE_TTL_SECS") {
        // One knob for both tiers; the file can still set them separately.
        let ttl = parse_positive_u64(&raw, "CACHE_TTL_SECS")?;
        config.cache.distributed_ttl_secs = ttl;
        config.cache.memory_ttl_secs = ttl;
    }
    if let Some(raw) = lookup("SCORE_REFRESH_SECS") {
        config.timing.score_refresh_secs = parse_non_negative_u64(&raw, "SCORE_REFRESH_SECS")?;
    }
    if let Some(raw) = lookup("ADVISORY_REFRESH_SECS") {
        config.timing.advisory_refresh_secs =
            parse_non_negative_u64(&raw, "ADVISORY_REFRESH_SECS")?;
    }
    Ok(())
}

/// Load configuration from environment and an optional config file.
pub fn load_config(path: Option<&Path>) -> Result<DeskConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults, then layer the config file if present.
    let config_path = path.unwrap_or_else(|| Path::new("config.toml"));
    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        parse_config_file(&contents)?
    } else if path.is_some() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            config_path.display()
        )));
    } else {
        DeskConfig::default()
    };

    // 3. Environment variables take priority.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}
