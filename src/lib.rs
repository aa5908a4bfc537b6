pub mod backend;
pub mod config;
pub mod discovery;
pub mod env;
pub mod error;
pub mod policy;
pub mod resolver;
pub mod responder;
pub mod trace;

pub use backend::{BackendKind, MemoryBackend, RedisBackend, RedisSettings, StorageBackend};
pub use config::{ConfigSnapshot, RateLimiterOptions, ResolvedConfig};
pub use env::EnvSnapshot;
pub use error::{RateLimiterError, Result};
pub use policy::RatePolicy;
pub use resolver::{resolve, resolve_from_process_env};
pub use responder::{BlockedRequest, DefaultResponder, Responder, ResponderKind};
