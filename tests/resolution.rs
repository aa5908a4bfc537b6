use std::process::Command;
use std::sync::Arc;

use ratelimiter::{
    resolve, BackendKind, DefaultResponder, EnvSnapshot, MemoryBackend, RateLimiterError,
    RateLimiterOptions, RatePolicy, ResolvedConfig, ResponderKind,
};

fn env(pairs: &[(&str, &str)]) -> EnvSnapshot {
    pairs.iter().copied().collect()
}

fn noisy_env() -> EnvSnapshot {
    env(&[
        ("RATE_LIMITER_IP_MAX_REQUESTS", "1"),
        ("RATE_LIMITER_IP_BLOCK_TIME", "2"),
        ("RATE_LIMITER_TOKEN_MAX_REQUESTS", "3"),
        ("RATE_LIMITER_TOKEN_BLOCK_TIME", "4"),
        ("RATE_LIMITER_TOKEN_ABC_MAX_REQUESTS", "5"),
        ("RATE_LIMITER_TOKEN_XYZ_BLOCK_TIME", "6"),
        ("RATE_LIMITER_DEBUG", "true"),
        ("RATE_LIMITER_USE_REDIS", "true"),
    ])
}

#[test]
fn test_disabled_env_with_no_fields_yields_defaults() {
    let options = RateLimiterOptions::new().without_env();
    let resolved = resolve(Some(options), &noisy_env()).unwrap();

    assert_eq!(resolved.ip, RatePolicy::new(100, 1000));
    assert_eq!(resolved.token, RatePolicy::new(200, 500));
    assert!(resolved.custom_tokens.is_empty());
    assert_eq!(resolved.backend_kind, BackendKind::Memory);
    assert_eq!(resolved.responder_kind, ResponderKind::Default);
    assert!(!resolved.debug);
}

#[test]
fn test_disabled_env_matches_empty_env() {
    let build = || {
        RateLimiterOptions::new()
            .without_env()
            .with_token(RatePolicy::new(9, 9))
            .with_custom_token("ABC", None)
            .with_custom_token("DEF", Some(RatePolicy::new(1, 1)))
            .with_debug(true)
    };

    let with_env = resolve(Some(build()), &noisy_env()).unwrap();
    let without_env = resolve(Some(build()), &EnvSnapshot::empty()).unwrap();
    assert_eq!(with_env.snapshot(), without_env.snapshot());
}

#[test]
fn test_ip_max_requests_from_env() {
    for value in [0i64, 1, 42, 100, 5_000_000] {
        let resolved = resolve(
            None,
            &env(&[("RATE_LIMITER_IP_MAX_REQUESTS", &value.to_string())]),
        )
        .unwrap();
        assert_eq!(resolved.ip.max_requests_per_second, value as u64);
        assert_eq!(resolved.ip.block_duration_millis, 1000);
    }

    for value in ["", "abc", "1.5", "ten"] {
        let resolved = resolve(None, &env(&[("RATE_LIMITER_IP_MAX_REQUESTS", value)])).unwrap();
        assert_eq!(resolved.ip.max_requests_per_second, 100, "{value:?}");
    }
}

#[test]
fn test_ip_policy_integer_edges() {
    let resolved = resolve(
        None,
        &env(&[
            ("RATE_LIMITER_IP_MAX_REQUESTS", "18446744073709551615"),
            ("RATE_LIMITER_IP_BLOCK_TIME", "-5"),
        ]),
    )
    .unwrap();
    assert_eq!(resolved.ip, RatePolicy::new(u64::MAX, 1000));

    let resolved = resolve(None, &env(&[("RATE_LIMITER_IP_MAX_REQUESTS", "-5")])).unwrap();
    assert_eq!(resolved.ip.max_requests_per_second, 100);
}

#[test]
fn test_resolution_is_idempotent() {
    let snapshot = env(&[
        ("RATE_LIMITER_IP_BLOCK_TIME", "2"),
        ("RATE_LIMITER_TOKEN_MAX_REQUESTS", "3"),
        ("RATE_LIMITER_TOKEN_ABC_MAX_REQUESTS", "5"),
        ("RATE_LIMITER_TOKEN_XYZ_BLOCK_TIME", "6"),
        ("RATE_LIMITER_DEBUG", "true"),
    ]);

    let build = || RateLimiterOptions::new().with_custom_token("QRS", None);
    let first = resolve(Some(build()), &snapshot).unwrap();
    let second = resolve(Some(build()), &snapshot).unwrap();
    assert_eq!(first.snapshot(), second.snapshot());
}

#[test]
fn test_discovery_completeness() {
    let resolved = resolve(
        None,
        &env(&[
            ("RATE_LIMITER_TOKEN_ABC_MAX_REQUESTS", "50"),
            ("RATE_LIMITER_TOKEN_XYZ_BLOCK_TIME", "999"),
        ]),
    )
    .unwrap();

    let keys: Vec<&str> = resolved.custom_tokens.keys().map(String::as_str).collect();
    assert_eq!(keys, ["ABC", "XYZ"]);
    let token = resolved.token;
    assert_eq!(
        resolved.custom_tokens["ABC"],
        RatePolicy::new(50, token.block_duration_millis)
    );
    assert_eq!(
        resolved.custom_tokens["XYZ"],
        RatePolicy::new(token.max_requests_per_second, 999)
    );
}

#[test]
fn test_discovered_tokens_fall_back_to_resolved_token_policy() {
    let resolved = resolve(
        Some(RateLimiterOptions::new().with_token(RatePolicy::new(30, 40))),
        &env(&[
            ("RATE_LIMITER_TOKEN_BLOCK_TIME", "45"),
            ("RATE_LIMITER_TOKEN_ABC_MAX_REQUESTS", "50"),
        ]),
    )
    .unwrap();

    assert_eq!(resolved.custom_tokens["ABC"], RatePolicy::new(50, 45));
}

#[test]
fn test_caller_entry_completion() {
    let options = RateLimiterOptions::new().with_custom_token("ABC", None);
    let resolved = resolve(Some(options), &EnvSnapshot::empty()).unwrap();

    assert_eq!(resolved.token, RatePolicy::new(200, 500));
    assert_eq!(resolved.custom_tokens["ABC"], RatePolicy::new(200, 500));
    assert_eq!(resolved.policy_for_token("ABC"), (&RatePolicy::new(200, 500), true));
    assert!(!resolved.policy_for_token("other").1);
}

#[test]
fn test_missing_redis_address_is_fatal_error() {
    let err = resolve(None, &env(&[("RATE_LIMITER_USE_REDIS", "true")])).unwrap_err();
    assert!(matches!(err, RateLimiterError::MissingRedisAddress));
    assert!(err.is_fatal());
}

#[test]
fn test_empty_redis_address_is_fatal_error() {
    let err = resolve(
        None,
        &env(&[
            ("RATE_LIMITER_USE_REDIS", "true"),
            ("RATE_LIMITER_REDIS_ADDRESS", ""),
        ]),
    )
    .unwrap_err();
    assert!(matches!(err, RateLimiterError::InvalidRedisAddress(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_redis_settings_from_env() {
    let resolved = resolve(
        None,
        &env(&[
            ("RATE_LIMITER_USE_REDIS", "TRUE"),
            ("RATE_LIMITER_REDIS_ADDRESS", "redis-host:6380"),
            ("RATE_LIMITER_REDIS_PASSWORD", "hunter2"),
            ("RATE_LIMITER_REDIS_DB", "not-a-number"),
        ]),
    )
    .unwrap();

    assert_eq!(resolved.backend_kind, BackendKind::Redis);
    let settings = resolved.redis.as_ref().unwrap();
    assert_eq!(settings.address, "redis-host:6380");
    assert_eq!(settings.password, "hunter2");
    assert_eq!(settings.db, 0);

    let json = serde_json::to_string(&resolved.snapshot()).unwrap();
    assert!(!json.contains("hunter2"));
}

#[test]
fn test_custom_backend_and_responder_survive() {
    let options = RateLimiterOptions::new()
        .with_backend(Arc::new(MemoryBackend::new()))
        .with_responder(Arc::new(DefaultResponder));
    let resolved = resolve(Some(options), &env(&[("RATE_LIMITER_USE_REDIS", "no")])).unwrap();

    assert_eq!(resolved.backend_kind, BackendKind::Custom);
    assert_eq!(resolved.responder_kind, ResponderKind::Custom);
}

#[tokio::test]
async fn test_resolved_config_is_shareable_across_tasks() {
    let resolved = Arc::new(resolve(None, &EnvSnapshot::empty()).unwrap());

    let mut handles = Vec::new();
    for i in 0..4 {
        let config = Arc::clone(&resolved);
        handles.push(tokio::spawn(async move {
            let key = format!("ip:10.0.0.{}", i);
            let window = std::time::Duration::from_secs(1);
            config.backend.record_attempt(&key, window).await.unwrap();
            config.backend.record_attempt(&key, window).await.unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 2);
    }
}

#[test]
fn test_defaults_snapshot_matches_unconfigured_resolution() {
    let resolved = resolve(None, &EnvSnapshot::empty()).unwrap();
    assert_eq!(resolved.snapshot(), ResolvedConfig::defaults().snapshot());
}

fn binary() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ratelimiter"));
    command.env_clear().current_dir(std::env::temp_dir());
    command
}

#[test]
fn test_binary_exits_on_missing_redis_address() {
    let output = binary()
        .env("RATE_LIMITER_USE_REDIS", "true")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("RATE_LIMITER_REDIS_ADDRESS"));
}

#[test]
fn test_binary_prints_resolved_configuration() {
    let output = binary()
        .env("RATE_LIMITER_TOKEN_ABC_MAX_REQUESTS", "50")
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tokens"]["ABC"]["maxRequestsPerSecond"], 50);
    assert_eq!(json["tokens"]["ABC"]["blockTimeMilliseconds"], 500);
    assert_eq!(json["backend"], "memory");
}
