use std::fmt;

use tracing::info;

/// Gate for configuration resolution trace lines.
///
/// Lines go to the `ratelimiter::debug` target at info level, and only while
/// the gate is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugTracer {
    enabled: bool,
}

impl DebugTracer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Emit one trace line if the gate is open.
    pub fn emit(&self, message: fmt::Arguments<'_>) {
        if self.enabled {
            info!(target: "ratelimiter::debug", "{}", message);
        }
    }
}
