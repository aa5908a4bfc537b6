//! Precedence resolution: caller value, then environment (unless disabled),
//! then default.
//!
//! The debug gate is resolved first so that every later decision can be
//! traced. Backend and responder selection run last.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::backend::{BackendKind, RedisBackend, RedisSettings, StorageBackend};
use crate::config::{RateLimiterOptions, ResolvedConfig};
use crate::discovery::{discover_custom_tokens, non_negative, resolve_custom_token};
use crate::env::{
    EnvSnapshot, ENV_DEBUG, ENV_IP_BLOCK_TIME, ENV_IP_MAX_REQUESTS, ENV_REDIS_ADDRESS,
    ENV_REDIS_DB, ENV_REDIS_PASSWORD, ENV_TOKEN_BLOCK_TIME, ENV_TOKEN_MAX_REQUESTS,
    ENV_USE_REDIS,
};
use crate::error::{RateLimiterError, Result};
use crate::policy::RatePolicy;
use crate::responder::ResponderKind;
use crate::trace::DebugTracer;

/// Resolve `options` against a fresh capture of the process environment.
pub fn resolve_from_process_env(options: Option<RateLimiterOptions>) -> Result<ResolvedConfig> {
    resolve(options, &EnvSnapshot::from_process())
}

/// Resolve `options` against `env`.
///
/// Fails only when the environment selects the Redis backend without a
/// usable address; callers must not serve traffic in that case.
pub fn resolve(options: Option<RateLimiterOptions>, env: &EnvSnapshot) -> Result<ResolvedConfig> {
    let options = options.unwrap_or_default();
    let defaults = ResolvedConfig::defaults();
    let use_env = !options.disable_env;

    let mut tracer = DebugTracer::new(options.debug.unwrap_or(defaults.debug));
    if use_env {
        if let Some(debug) = env.get_bool(ENV_DEBUG) {
            tracer.set_enabled(debug);
            tracer.emit(format_args!("using env {}", ENV_DEBUG));
        }
    }

    let ip = resolve_policy(
        "IP",
        options.ip,
        defaults.ip,
        use_env.then_some(env),
        (ENV_IP_MAX_REQUESTS, ENV_IP_BLOCK_TIME),
        &tracer,
    );
    let token = resolve_policy(
        "Token",
        options.token,
        defaults.token,
        use_env.then_some(env),
        (ENV_TOKEN_MAX_REQUESTS, ENV_TOKEN_BLOCK_TIME),
        &tracer,
    );
    let custom_tokens = resolve_custom_tokens(
        options.custom_tokens,
        token,
        use_env.then_some(env),
        &tracer,
    );

    let (backend, backend_kind, redis): (
        Arc<dyn StorageBackend>,
        BackendKind,
        Option<RedisSettings>,
    ) = if use_env && env.get_bool(ENV_USE_REDIS) == Some(true) {
        tracer.emit(format_args!("using StorageAdapter Redis"));
        let settings = redis_settings(env)?;
        let backend = RedisBackend::new(settings.clone())?;
        let backend: Arc<dyn StorageBackend> = Arc::new(backend);
        (backend, BackendKind::Redis, Some(settings))
    } else if let Some(backend) = options.backend {
        tracer.emit(format_args!("using StorageAdapter Custom"));
        (backend, BackendKind::Custom, None)
    } else {
        tracer.emit(format_args!("using StorageAdapter Default"));
        (defaults.backend, BackendKind::Memory, None)
    };

    let (responder, responder_kind) = match options.responder {
        Some(responder) => {
            tracer.emit(format_args!("using ResponseWriter Custom"));
            (responder, ResponderKind::Custom)
        }
        None => {
            tracer.emit(format_args!("using ResponseWriter Default"));
            (defaults.responder, ResponderKind::Default)
        }
    };

    let resolved = ResolvedConfig {
        ip,
        token,
        custom_tokens,
        backend,
        backend_kind,
        redis,
        responder,
        responder_kind,
        debug: tracer.is_enabled(),
        disable_env: options.disable_env,
    };

    if tracer.is_enabled() {
        if let Ok(json) = serde_json::to_string(&resolved.snapshot()) {
            tracer.emit(format_args!("using configuration: {}", json));
        }
    }

    Ok(resolved)
}

/// IP and token scopes: caller value or default, then each field is
/// independently overwritten by its environment variable.
fn resolve_policy(
    scope: &str,
    caller: Option<RatePolicy>,
    default: RatePolicy,
    env: Option<&EnvSnapshot>,
    (max_requests_key, block_time_key): (&str, &str),
    tracer: &DebugTracer,
) -> RatePolicy {
    let mut policy = match caller {
        Some(policy) => policy,
        None => {
            tracer.emit(format_args!("using default {} policy", scope));
            default
        }
    };

    let Some(env) = env else {
        return policy;
    };

    if let Some(max_requests) = non_negative(env, max_requests_key) {
        policy = policy.with_max_requests(max_requests);
        tracer.emit(format_args!("using env {}", max_requests_key));
    }
    if let Some(block_time) = non_negative(env, block_time_key) {
        policy = policy.with_block_duration_millis(block_time);
        tracer.emit(format_args!("using env {}", block_time_key));
    }

    policy
}

/// Complete caller entries from the resolved token policy, then layer every
/// token declared in the environment on top.
///
/// For a token present in both, each field is decided on its own: the
/// environment wins where it has a parseable value, the caller entry
/// survives elsewhere.
fn resolve_custom_tokens(
    caller: Option<HashMap<String, Option<RatePolicy>>>,
    token: RatePolicy,
    env: Option<&EnvSnapshot>,
    tracer: &DebugTracer,
) -> BTreeMap<String, RatePolicy> {
    let mut custom_tokens: BTreeMap<String, RatePolicy> = caller
        .unwrap_or_default()
        .into_iter()
        .map(|(id, policy)| {
            let policy = policy.unwrap_or_else(|| {
                tracer.emit(format_args!(
                    "custom token \"{}\" has no policy: using Token policy",
                    id
                ));
                token
            });
            (id, policy)
        })
        .collect();

    let Some(env) = env else {
        return custom_tokens;
    };

    for id in discover_custom_tokens(env) {
        let fallback = custom_tokens.get(&id).copied().unwrap_or(token);
        let policy = resolve_custom_token(&id, env, fallback, tracer);
        custom_tokens.insert(id, policy);
    }

    custom_tokens
}

fn redis_settings(env: &EnvSnapshot) -> Result<RedisSettings> {
    let address = env
        .get_string(ENV_REDIS_ADDRESS)
        .ok_or(RateLimiterError::MissingRedisAddress)?;

    Ok(RedisSettings::new(address)
        .with_password(env.get_string(ENV_REDIS_PASSWORD).unwrap_or_default())
        .with_db(env.get_int(ENV_REDIS_DB).unwrap_or(0)))
}
