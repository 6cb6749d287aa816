//! Engine configuration.
//!
//! Defaults suit the public upstreams. Every knob can be overridden through
//! a `NAVQUOTE_*` environment variable; durations are given in the unit
//! named by the variable suffix.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::batch::DEFAULT_DEBOUNCE;
use crate::gateway::{RetryPolicy, DEFAULT_MAX_CONCURRENT};
use crate::resolver::UpstreamEndpoints;

pub const DEFAULT_RAW_CACHE_CAPACITY: usize = 200;
pub const DEFAULT_RAW_CACHE_TTL: Duration = Duration::from_secs(15);
pub const DEFAULT_RESULT_CACHE_CAPACITY: usize = 500;
pub const DEFAULT_RESULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const ENV_PREFIX: &str = "NAVQUOTE_";

/// Tunables for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Attempts, backoff and per-attempt timeout for upstream requests
    pub retry: RetryPolicy,
    /// Simultaneous upstream requests
    pub max_concurrent: usize,
    pub raw_cache_capacity: usize,
    pub raw_cache_ttl: Duration,
    pub result_cache_capacity: usize,
    pub result_cache_ttl: Duration,
    /// How long the coalescer collects queries before dispatching
    pub debounce: Duration,
    /// Period of the expired-entry sweep
    pub sweep_interval: Duration,
    pub endpoints: UpstreamEndpoints,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            raw_cache_capacity: DEFAULT_RAW_CACHE_CAPACITY,
            raw_cache_ttl: DEFAULT_RAW_CACHE_TTL,
            result_cache_capacity: DEFAULT_RESULT_CACHE_CAPACITY,
            result_cache_ttl: DEFAULT_RESULT_CACHE_TTL,
            debounce: DEFAULT_DEBOUNCE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            endpoints: UpstreamEndpoints::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `NAVQUOTE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`, which receives full
    /// variable names (`NAVQUOTE_RETRY_COUNT`).
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Self::default();

        Self {
            retry: RetryPolicy {
                attempts: env.parse("RETRY_COUNT", defaults.retry.attempts),
                base_delay: env.millis("RETRY_DELAY_MS", defaults.retry.base_delay),
                attempt_timeout: env.millis("ATTEMPT_TIMEOUT_MS", defaults.retry.attempt_timeout),
            },
            max_concurrent: env.parse("MAX_CONCURRENT", defaults.max_concurrent),
            raw_cache_capacity: env.parse("RAW_CACHE_CAPACITY", defaults.raw_cache_capacity),
            raw_cache_ttl: env.secs("RAW_CACHE_TTL_SECS", defaults.raw_cache_ttl),
            result_cache_capacity: env
                .parse("RESULT_CACHE_CAPACITY", defaults.result_cache_capacity),
            result_cache_ttl: env.secs("RESULT_CACHE_TTL_SECS", defaults.result_cache_ttl),
            debounce: env.millis("DEBOUNCE_MS", defaults.debounce),
            sweep_interval: env.secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            endpoints: UpstreamEndpoints {
                fund_url: env.template("FUND_URL", "{code}", defaults.endpoints.fund_url),
                stock_url: env.template("STOCK_URL", "{symbol}", defaults.endpoints.stock_url),
            },
        }
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<(String, String)> {
        let name = format!("{}{}", ENV_PREFIX, key);
        let value = (self.lookup)(&name)?;
        let value = value.trim().to_string();
        (!value.is_empty()).then_some((name, value))
    }

    fn parse<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr,
    {
        let Some((name, value)) = self.raw(key) else {
            return default;
        };
        value.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}='{}', using default", name, value);
            default
        })
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        Duration::from_millis(self.parse(key, default.as_millis() as u64))
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parse(key, default.as_secs()))
    }

    /// URL template that must contain `placeholder`.
    fn template(&self, key: &str, placeholder: &str, default: String) -> String {
        match self.raw(key) {
            Some((_, value)) if value.contains(placeholder) => value,
            Some((name, value)) => {
                warn!(
                    "Ignoring {}='{}': missing {} placeholder, using default",
                    name, value, placeholder
                );
                default
            }
            None => default,
        }
    }
}
