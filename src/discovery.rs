//! Custom token discovery.
//!
//! Any `RATE_LIMITER_TOKEN_<ID>_MAX_REQUESTS` or
//! `RATE_LIMITER_TOKEN_<ID>_BLOCK_TIME` variable declares a custom token
//! `<ID>`. Scanning and per-token resolution are separate steps.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::env::{custom_token_block_time_key, custom_token_max_requests_key, EnvSnapshot};
use crate::policy::RatePolicy;
use crate::trace::DebugTracer;

static CUSTOM_TOKEN_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^RATE_LIMITER_TOKEN_(.+)_(?:MAX_REQUESTS|BLOCK_TIME)$")
        .unwrap_or_else(|e| unreachable!("custom token pattern is a constant: {e}"))
});

/// Extract the custom token identifier from a variable name, if it has one.
pub fn custom_token_id(key: &str) -> Option<&str> {
    CUSTOM_TOKEN_KEY
        .captures(key)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

/// Distinct custom token identifiers declared in `env`.
pub fn discover_custom_tokens(env: &EnvSnapshot) -> BTreeSet<String> {
    env.keys()
        .filter_map(custom_token_id)
        .map(str::to_string)
        .collect()
}

/// Resolve one custom token: each field comes from its environment variable
/// when present and parseable, otherwise from `fallback`.
pub fn resolve_custom_token(
    token: &str,
    env: &EnvSnapshot,
    fallback: RatePolicy,
    tracer: &DebugTracer,
) -> RatePolicy {
    tracer.emit(format_args!("configuring custom token \"{token}\""));

    let max_requests_key = custom_token_max_requests_key(token);
    let max_requests = match non_negative(env, &max_requests_key) {
        Some(value) => value,
        None => {
            tracer.emit(format_args!(
                "env \"{max_requests_key}\" not found: using default value {}",
                fallback.max_requests_per_second
            ));
            fallback.max_requests_per_second
        }
    };

    let block_time_key = custom_token_block_time_key(token);
    let block_time = match non_negative(env, &block_time_key) {
        Some(value) => value,
        None => {
            tracer.emit(format_args!(
                "env \"{block_time_key}\" not found: using default value {}",
                fallback.block_duration_millis
            ));
            fallback.block_duration_millis
        }
    };

    RatePolicy::new(max_requests, block_time)
}

/// Integer lookup for policy fields; negative numbers count as malformed.
pub(crate) fn non_negative(env: &EnvSnapshot, key: &str) -> Option<u64> {
    env.get_uint(key)
}
