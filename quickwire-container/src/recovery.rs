//! Construction-lock recovery.

use tracing::debug;

use crate::instance::Instance;
use crate::key::TypeKey;
use crate::lifetime::LifetimeManager;

/// Guard for one construction attempt against a lifetime manager.
///
/// Created after a `get_value` miss. [`complete`](RecoveryGuard::complete)
/// stores the value through `set_value`; dropping the guard without
/// completing it (an early `?` return or a panic unwinding through the
/// engine) calls `recover` exactly once.
pub(crate) struct RecoveryGuard<'a> {
    manager: &'a dyn LifetimeManager,
    key: TypeKey,
    armed: bool,
}

impl<'a> RecoveryGuard<'a> {
    pub fn new(manager: &'a dyn LifetimeManager, key: TypeKey) -> Self {
        Self {
            manager,
            key,
            armed: true,
        }
    }

    /// Hands the constructed value to the manager and disarms the guard.
    ///
    /// Returns the value the manager ended up holding, which is an earlier
    /// one when `set_value` kept it, or `value` for managers that never cache.
    pub fn complete(mut self, value: Instance) -> Instance {
        self.armed = false;
        self.manager.set_value(value.clone());
        self.manager.cached_value().unwrap_or(value)
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(key = %self.key, "Construction failed, releasing lifetime manager");
            self.manager.recover();
        }
    }
}
