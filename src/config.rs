use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::backend::{BackendKind, MemoryBackend, RedisSettings, StorageBackend};
use crate::error::{RateLimiterError, Result};
use crate::policy::RatePolicy;
use crate::responder::{DefaultResponder, Responder, ResponderKind};

pub const DEFAULT_IP_POLICY: RatePolicy = RatePolicy::new(100, 1000);
pub const DEFAULT_TOKEN_POLICY: RatePolicy = RatePolicy::new(200, 500);

/// Partial configuration supplied by the caller.
///
/// Every overridable field is `None` until the caller sets it; resolution
/// fills the gaps from the environment and the defaults.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimiterOptions {
    pub ip: Option<RatePolicy>,
    pub token: Option<RatePolicy>,
    /// Entries left as `None` inherit the resolved token policy.
    #[serde(rename = "tokens")]
    pub custom_tokens: Option<HashMap<String, Option<RatePolicy>>>,
    #[serde(skip)]
    pub backend: Option<Arc<dyn StorageBackend>>,
    #[serde(skip)]
    pub responder: Option<Arc<dyn Responder>>,
    pub debug: Option<bool>,
    /// Ignore the environment entirely. The environment cannot turn this off.
    #[serde(rename = "disableEnvs")]
    pub disable_env: bool,
}

impl RateLimiterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the value fields from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RateLimiterError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| RateLimiterError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn with_ip(mut self, policy: RatePolicy) -> Self {
        self.ip = Some(policy);
        self
    }

    pub fn with_token(mut self, policy: RatePolicy) -> Self {
        self.token = Some(policy);
        self
    }

    /// Add a custom token; `None` means "same as the token policy".
    pub fn with_custom_token(
        mut self,
        token: impl Into<String>,
        policy: Option<RatePolicy>,
    ) -> Self {
        self.custom_tokens
            .get_or_insert_with(HashMap::new)
            .insert(token.into(), policy);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.disable_env = true;
        self
    }
}

impl std::fmt::Debug for RateLimiterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterOptions")
            .field("ip", &self.ip)
            .field("token", &self.token)
            .field("custom_tokens", &self.custom_tokens)
            .field("backend", &self.backend.as_ref().map(|_| "custom"))
            .field("responder", &self.responder.as_ref().map(|_| "custom"))
            .field("debug", &self.debug)
            .field("disable_env", &self.disable_env)
            .finish()
    }
}

/// Fully resolved configuration, shared read-only for the process lifetime.
#[derive(Clone)]
pub struct ResolvedConfig {
    pub ip: RatePolicy,
    pub token: RatePolicy,
    pub custom_tokens: BTreeMap<String, RatePolicy>,
    pub backend: Arc<dyn StorageBackend>,
    pub backend_kind: BackendKind,
    /// Set only when the Redis backend was built from the environment.
    pub redis: Option<RedisSettings>,
    pub responder: Arc<dyn Responder>,
    pub responder_kind: ResponderKind,
    pub debug: bool,
    pub disable_env: bool,
}

impl ResolvedConfig {
    /// Baseline configuration: fixed IP and token policies, no custom tokens,
    /// a fresh in-memory backend and the default responder.
    pub fn defaults() -> Self {
        Self {
            ip: DEFAULT_IP_POLICY,
            token: DEFAULT_TOKEN_POLICY,
            custom_tokens: BTreeMap::new(),
            backend: Arc::new(MemoryBackend::new()),
            backend_kind: BackendKind::Memory,
            redis: None,
            responder: Arc::new(DefaultResponder),
            responder_kind: ResponderKind::Default,
            debug: false,
            disable_env: false,
        }
    }

    /// Policy for a bearer token, and whether it came from a custom entry.
    pub fn policy_for_token(&self, token: &str) -> (&RatePolicy, bool) {
        match self.custom_tokens.get(token) {
            Some(policy) => (policy, true),
            None => (&self.token, false),
        }
    }

    /// Value-only view, suitable for logging and comparison.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            ip: self.ip,
            token: self.token,
            custom_tokens: self.custom_tokens.clone(),
            backend: self.backend_kind,
            redis: self.redis.clone(),
            responder: self.responder_kind,
            debug: self.debug,
            disable_env: self.disable_env,
        }
    }
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("ip", &self.ip)
            .field("token", &self.token)
            .field("custom_tokens", &self.custom_tokens)
            .field("backend", &self.backend_kind)
            .field("responder", &self.responder_kind)
            .field("debug", &self.debug)
            .field("disable_env", &self.disable_env)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub ip: RatePolicy,
    pub token: RatePolicy,
    #[serde(rename = "tokens")]
    pub custom_tokens: BTreeMap<String, RatePolicy>,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisSettings>,
    pub responder: ResponderKind,
    pub debug: bool,
    #[serde(rename = "disableEnvs")]
    pub disable_env: bool,
}
