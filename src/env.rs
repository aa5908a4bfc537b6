//! Captured process environment and typed lookups over it.
//!
//! Resolution never reads `std::env` directly: callers capture an
//! [`EnvSnapshot`] (usually [`EnvSnapshot::from_process`]) and pass it in.
//! Lookups return `None` both when a variable is absent and when its text
//! does not parse; a bad optional override falls back, it never fails.

use std::collections::BTreeMap;

pub const ENV_IP_MAX_REQUESTS: &str = "RATE_LIMITER_IP_MAX_REQUESTS";
pub const ENV_IP_BLOCK_TIME: &str = "RATE_LIMITER_IP_BLOCK_TIME";
pub const ENV_TOKEN_MAX_REQUESTS: &str = "RATE_LIMITER_TOKEN_MAX_REQUESTS";
pub const ENV_TOKEN_BLOCK_TIME: &str = "RATE_LIMITER_TOKEN_BLOCK_TIME";
pub const ENV_DEBUG: &str = "RATE_LIMITER_DEBUG";
pub const ENV_USE_REDIS: &str = "RATE_LIMITER_USE_REDIS";
pub const ENV_REDIS_ADDRESS: &str = "RATE_LIMITER_REDIS_ADDRESS";
pub const ENV_REDIS_PASSWORD: &str = "RATE_LIMITER_REDIS_PASSWORD";
pub const ENV_REDIS_DB: &str = "RATE_LIMITER_REDIS_DB";

/// Prefix shared by the token-wide and per-token variables.
pub const ENV_TOKEN_PREFIX: &str = "RATE_LIMITER_TOKEN_";
pub const MAX_REQUESTS_SUFFIX: &str = "MAX_REQUESTS";
pub const BLOCK_TIME_SUFFIX: &str = "BLOCK_TIME";

/// Name of the max-requests variable for a custom token.
pub fn custom_token_max_requests_key(token: &str) -> String {
    format!("{ENV_TOKEN_PREFIX}{token}_{MAX_REQUESTS_SUFFIX}")
}

/// Name of the block-time variable for a custom token.
pub fn custom_token_block_time_key(token: &str) -> String {
    format!("{ENV_TOKEN_PREFIX}{token}_{BLOCK_TIME_SUFFIX}")
}

/// Point-in-time copy of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Empty environment
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the current process environment.
    ///
    /// Entries whose name or value is not valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Iterate over variable names
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// String lookup; a variable set to "" is present with an empty value.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Base-10 signed integer lookup.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.vars.get(key)?.parse().ok()
    }

    /// Base-10 unsigned integer lookup; a leading `-` is malformed.
    pub fn get_uint(&self, key: &str) -> Option<u64> {
        self.vars.get(key)?.parse().ok()
    }

    /// Boolean lookup, accepting `1/t/true` and `0/f/false` in any case.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        parse_bool(self.vars.get(key)?)
    }
}

impl<K, V> FromIterator<(K, V)> for EnvSnapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}
