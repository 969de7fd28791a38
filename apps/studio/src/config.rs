use std::time::Duration;

use anyhow::{Context, Result};

use crate::preview::retry::RetryPolicy;

/// Tunables for one preview session. Defaults are sized for interactive
/// typing: a short debounce, a five-minute artifact trust window, one retry
/// per load signal.
#[derive(Debug, Clone, Copy)]
pub struct PreviewConfig {
    /// Quiet period after the last edit before a compile dispatches.
    pub debounce: Duration,
    /// How long a cached artifact is served without recompiling.
    pub freshness_window: Duration,
    /// Delay before the single retry after a busy signal.
    pub busy_retry_delay: Duration,
    /// Delay before the single retry after a capacity signal.
    pub overloaded_retry_delay: Duration,
    /// Upper bound on one remote compile call.
    pub compile_timeout: Duration,
    /// Cache occupancy bound; beyond it the oldest entry is evicted.
    pub cache_capacity: usize,
    /// Fall back to source output when the service reports its PDF renderer
    /// unavailable.
    pub degrade_to_source: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            freshness_window: Duration::from_secs(5 * 60),
            busy_retry_delay: Duration::from_secs(2),
            overloaded_retry_delay: Duration::from_secs(5),
            compile_timeout: Duration::from_secs(30),
            cache_capacity: 32,
            degrade_to_source: true,
        }
    }
}

impl PreviewConfig {
    /// Environment overrides for the defaults. Unset variables keep their
    /// default; set-but-unparsable values are startup errors.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            debounce: env_millis("PREVIEW_DEBOUNCE_MS", defaults.debounce)?,
            freshness_window: env_secs("PREVIEW_FRESHNESS_SECS", defaults.freshness_window)?,
            busy_retry_delay: env_secs("PREVIEW_BUSY_RETRY_SECS", defaults.busy_retry_delay)?,
            overloaded_retry_delay: env_secs(
                "PREVIEW_OVERLOADED_RETRY_SECS",
                defaults.overloaded_retry_delay,
            )?,
            compile_timeout: env_secs(
                "PREVIEW_COMPILE_TIMEOUT_SECS",
                defaults.compile_timeout,
            )?,
            cache_capacity: match std::env::var("PREVIEW_CACHE_CAPACITY") {
                Ok(raw) => raw
                    .parse()
                    .context("PREVIEW_CACHE_CAPACITY must be an integer")?,
                Err(_) => defaults.cache_capacity,
            },
            degrade_to_source: match std::env::var("PREVIEW_DEGRADE_TO_SOURCE") {
                Ok(raw) => raw
                    .parse()
                    .context("PREVIEW_DEGRADE_TO_SOURCE must be true or false")?,
                Err(_) => defaults.degrade_to_source,
            },
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            busy_delay: self.busy_retry_delay,
            overloaded_delay: self.overloaded_retry_delay,
            max_retries: 1,
        }
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("{key} must be an integer millisecond count"))?;
            Ok(Duration::from_millis(millis))
        }
        Err(_) => Ok(default),
    }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{key} must be an integer second count"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}

/// Process configuration for the export binary.
/// Loaded once at startup; fails fast on missing required variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub render_service_url: String,
    pub rust_log: String,
    pub preview: PreviewConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            render_service_url: require_env("RENDER_SERVICE_URL")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            preview: PreviewConfig::from_env()?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_interactive_tuning() {
        let config = PreviewConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(150));
        assert_eq!(config.freshness_window, Duration::from_secs(300));
        assert_eq!(config.busy_retry_delay, Duration::from_secs(2));
        assert_eq!(config.overloaded_retry_delay, Duration::from_secs(5));
        assert!(config.degrade_to_source);
    }

    #[test]
    fn test_retry_policy_carries_config_delays() {
        let mut config = PreviewConfig::default();
        config.busy_retry_delay = Duration::from_secs(7);
        let policy = config.retry_policy();
        assert_eq!(policy.busy_delay, Duration::from_secs(7));
        assert_eq!(policy.max_retries, 1, "retry happens exactly once");
    }

    // Single test so the process-global env vars are never touched from two
    // threads at once.
    #[test]
    fn test_env_overrides_apply_and_reject_junk() {
        std::env::set_var("PREVIEW_DEBOUNCE_MS", "300");
        std::env::set_var("PREVIEW_CACHE_CAPACITY", "8");
        let config = PreviewConfig::from_env().unwrap();
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.cache_capacity, 8);
        std::env::remove_var("PREVIEW_DEBOUNCE_MS");
        std::env::remove_var("PREVIEW_CACHE_CAPACITY");

        std::env::set_var("PREVIEW_DEBOUNCE_MS", "fast");
        assert!(PreviewConfig::from_env().is_err());
        std::env::remove_var("PREVIEW_DEBOUNCE_MS");
    }
}
