//! Runtime configuration for a linked collection
//!
//! `LinkedCollectionConfig` is built once and handed to `LinkedCollection::new`.
//! Defaults suit an in-process store; deployments against a remote store
//! usually want `store_timeout` set.

use std::env;
use std::time::Duration;

/// Store call timeout in milliseconds (unset = wait indefinitely)
pub const STORE_TIMEOUT_ENV: &str = "LINKED_COLLECTION_STORE_TIMEOUT_MS";

/// Write lock acquisition timeout in milliseconds (unset = wait indefinitely)
pub const LOCK_TIMEOUT_ENV: &str = "LINKED_COLLECTION_LOCK_TIMEOUT_MS";

/// Retries `InsertQueue` performs on link conflicts
pub const MAX_RETRIES_ENV: &str = "LINKED_COLLECTION_MAX_RETRIES";

/// First backoff delay in milliseconds; doubles per retry
pub const RETRY_BASE_DELAY_ENV: &str = "LINKED_COLLECTION_RETRY_BASE_DELAY_MS";

const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(10);

/// Settings shared by `LinkedCollection` and `InsertQueue`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedCollectionConfig {
    /// Upper bound for each individual store call
    pub store_timeout: Option<Duration>,

    /// Upper bound for waiting on the write gate before the first store call
    pub lock_timeout: Option<Duration>,

    /// Retry attempts on `LinkConflict` (0 = single attempt)
    pub max_retries: usize,

    /// Backoff before the first retry (10ms, 20ms, 40ms, ... by default)
    pub retry_base_delay: Duration,
}

impl Default for LinkedCollectionConfig {
    fn default() -> Self {
        Self {
            store_timeout: None,
            lock_timeout: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl LinkedCollectionConfig {
    /// Defaults overlaid with `LINKED_COLLECTION_*` environment variables
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            store_timeout: parse_env(&lookup, STORE_TIMEOUT_ENV)
                .map(Duration::from_millis)
                .or(defaults.store_timeout),
            lock_timeout: parse_env(&lookup, LOCK_TIMEOUT_ENV)
                .map(Duration::from_millis)
                .or(defaults.lock_timeout),
            max_retries: parse_env(&lookup, MAX_RETRIES_ENV).unwrap_or(defaults.max_retries),
            retry_base_delay: parse_env(&lookup, RETRY_BASE_DELAY_ENV)
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Backoff before retry number `attempt` (0-based): base × 2^attempt
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.retry_base_delay.saturating_mul(factor)
    }
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}='{}'", key, raw);
            None
        }
    }
}
