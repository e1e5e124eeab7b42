//! Lifetime managers.
//!
//! A lifetime manager holds zero or one cached instance for a registration
//! and decides whether a newly constructed instance is shared:
//! - [`UniqueLifetimeManager`]: never caches, every resolution builds anew
//! - [`ContainerControlledLifetimeManager`]: one instance for the container's life
//! - [`InstanceLifetimeManager`]: a caller-supplied value, never constructed
//!
//! Resolution-context types have no manager of their own; their value comes
//! from the caller of each top-level resolve and is reported as
//! [`Lifetime::ResolutionContext`].

use std::fmt;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, trace};

use crate::instance::Instance;

/// The sharing policy a lifetime manager implements.
///
/// # Ordering
/// Lifetimes are ordered by how long a shared value lives:
/// `ContainerControlled` and `Instance` outlive a `ResolutionContext`
/// value, which outlives a `Unique` one. `Custom` managers are treated as
/// shared for the container's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// New instance on every resolution, never cached.
    Unique,

    /// Created on first resolution, cached until the container is dropped.
    ContainerControlled,

    /// Supplied at registration time; the factory is never invoked.
    Instance,

    /// Supplied by the caller of each top-level resolve.
    ResolutionContext,

    /// A caller-implemented [`LifetimeManager`].
    Custom,
}

impl Lifetime {
    #[inline]
    fn ordering(&self) -> u8 {
        match self {
            Lifetime::ContainerControlled | Lifetime::Instance | Lifetime::Custom => 2,
            Lifetime::ResolutionContext => 1,
            Lifetime::Unique => 0,
        }
    }

    /// Returns `true` if values of `self` strictly outlive values of `other`.
    #[inline]
    pub fn outlives(&self, other: Lifetime) -> bool {
        self.ordering() > other.ordering()
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Unique => write!(f, "Unique"),
            Lifetime::ContainerControlled => write!(f, "ContainerControlled"),
            Lifetime::Instance => write!(f, "Instance"),
            Lifetime::ResolutionContext => write!(f, "ResolutionContext"),
            Lifetime::Custom => write!(f, "Custom"),
        }
    }
}

/// Policy object deciding whether and how an instance is cached.
///
/// The engine calls [`get_value`](LifetimeManager::get_value) before
/// constructing. On a miss it constructs, then calls
/// [`set_value`](LifetimeManager::set_value) on success or
/// [`recover`](LifetimeManager::recover) on failure, exactly once per
/// attempt. A manager that holds a lock between `get_value` and the end of
/// the attempt must release it in both.
#[cfg_attr(test, mockall::automock)]
pub trait LifetimeManager: Send + Sync {
    /// Returns the cached value, if any.
    fn get_value(&self) -> Option<Instance>;

    /// Stores a freshly constructed value.
    ///
    /// Must be safe to call when no lock is held.
    fn set_value(&self, value: Instance);

    /// Clears the cached value, dropping it.
    fn remove_value(&self);

    /// Returns the value currently held, without locking or starting a
    /// construction attempt.
    ///
    /// The engine reads it after `set_value` so a resolve returns whatever
    /// the manager kept. Managers that never cache keep the default.
    fn cached_value(&self) -> Option<Instance> {
        None
    }

    /// Releases anything held since a failed `get_value` miss.
    ///
    /// Must not panic when nothing is held. Managers that never lock keep
    /// the default no-op.
    fn recover(&self) {}

    /// The sharing policy, used for diagnostics and seal-time checks.
    fn lifetime(&self) -> Lifetime {
        Lifetime::Custom
    }
}

// ============================================================
// Unique
// ============================================================

/// Never caches: every resolution produces a distinct instance, even twice
/// within the same object graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniqueLifetimeManager;

impl LifetimeManager for UniqueLifetimeManager {
    fn get_value(&self) -> Option<Instance> {
        None
    }

    fn set_value(&self, _value: Instance) {}

    fn remove_value(&self) {}

    fn lifetime(&self) -> Lifetime {
        Lifetime::Unique
    }
}

// ============================================================
// Instance
// ============================================================

/// Always returns the value it was seeded with.
///
/// The value belongs to the caller that registered it, so `set_value` and
/// `remove_value` leave it in place.
pub struct InstanceLifetimeManager {
    value: Instance,
}

impl InstanceLifetimeManager {
    pub fn new(value: Instance) -> Self {
        Self { value }
    }
}

impl LifetimeManager for InstanceLifetimeManager {
    fn get_value(&self) -> Option<Instance> {
        Some(self.value.clone())
    }

    fn set_value(&self, _value: Instance) {
        trace!(value = %self.value.type_name(), "Ignoring set_value on a seeded instance");
    }

    fn remove_value(&self) {
        trace!(value = %self.value.type_name(), "Ignoring remove_value on a seeded instance");
    }

    fn cached_value(&self) -> Option<Instance> {
        Some(self.value.clone())
    }

    fn lifetime(&self) -> Lifetime {
        Lifetime::Instance
    }
}

impl fmt::Debug for InstanceLifetimeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceLifetimeManager")
            .field("value", &self.value)
            .finish()
    }
}

// ============================================================
// ContainerControlled
// ============================================================

/// Caches the first successfully constructed instance.
///
/// Construction is serialized by a per-manager lock that behaves like a
/// re-entrant monitor owned by a thread:
///
/// 1. `get_value` returns the cached value when present (fast path).
/// 2. Otherwise it takes the construction lock for the calling thread,
///    waiting while another thread owns it, and re-checks. A value that
///    appeared meanwhile is returned and the lock released. If there is
///    still none, `None` is returned and **the lock stays held**: the caller
///    is now the one constructing.
/// 3. `set_value` stores the value and releases the lock; `recover`
///    releases it without storing. Both are no-ops for a thread that does
///    not hold the lock.
///
/// ```text
/// Empty ──get_value (miss)──> Constructing ──set_value──> Cached
///                                  │
///                                  └────recover────> Empty
/// ```
pub struct ContainerControlledLifetimeManager {
    value: RwLock<Option<Instance>>,
    owner: Mutex<Option<Owner>>,
    released: Condvar,
}

#[derive(Debug, Clone, Copy)]
struct Owner {
    thread: ThreadId,
    depth: usize,
}

impl ContainerControlledLifetimeManager {
    pub fn new() -> Self {
        Self {
            value: RwLock::new(None),
            owner: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    /// Returns `true` if a value is cached.
    pub fn has_value(&self) -> bool {
        self.value.read().is_some()
    }

    /// Returns `true` if some thread is constructing the value.
    pub fn is_constructing(&self) -> bool {
        self.owner.lock().is_some()
    }

    fn synchronized_get_value(&self) -> Option<Instance> {
        let current = thread::current().id();
        let mut owner = self.owner.lock();

        while owner.is_some_and(|o| o.thread != current) {
            self.released.wait(&mut owner);
        }

        let depth = owner.map_or(0, |o| o.depth);
        *owner = Some(Owner {
            thread: current,
            depth: depth + 1,
        });

        let value = self.value.read().clone();
        if value.is_some() && Self::exit(&mut owner, current) {
            drop(owner);
            self.released.notify_all();
        }

        value
    }

    /// Releases one level of the lock if `current` holds it.
    ///
    /// Returns `true` when the lock became free.
    fn exit(owner: &mut Option<Owner>, current: ThreadId) -> bool {
        match owner {
            Some(o) if o.thread == current => {
                o.depth -= 1;
                if o.depth == 0 {
                    *owner = None;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn try_exit(&self) {
        let current = thread::current().id();
        let mut owner = self.owner.lock();

        if owner.is_none_or(|o| o.thread != current) {
            trace!("Construction lock not held by this thread, nothing to release");
            return;
        }

        if Self::exit(&mut owner, current) {
            drop(owner);
            self.released.notify_all();
        }
    }
}

impl Default for ContainerControlledLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeManager for ContainerControlledLifetimeManager {
    fn get_value(&self) -> Option<Instance> {
        if let Some(value) = self.value.read().as_ref() {
            return Some(value.clone());
        }

        self.synchronized_get_value()
    }

    fn set_value(&self, value: Instance) {
        {
            let mut slot = self.value.write();
            if let Some(existing) = slot.as_ref() {
                debug!(
                    cached = %existing.type_name(),
                    "Value already cached, keeping the first one"
                );
            } else {
                *slot = Some(value);
            }
        }

        self.try_exit();
    }

    fn remove_value(&self) {
        let removed = self.value.write().take();
        if let Some(value) = removed {
            debug!(value = %value.type_name(), "Removed cached value");
        }
    }

    fn cached_value(&self) -> Option<Instance> {
        self.value.read().clone()
    }

    fn recover(&self) {
        self.try_exit();
    }

    fn lifetime(&self) -> Lifetime {
        Lifetime::ContainerControlled
    }
}

impl fmt::Debug for ContainerControlledLifetimeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerControlledLifetimeManager")
            .field("cached", &self.has_value())
            .field("constructing", &self.is_constructing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn lifetime_ordering() {
        assert!(Lifetime::ContainerControlled.outlives(Lifetime::ResolutionContext));
        assert!(Lifetime::ResolutionContext.outlives(Lifetime::Unique));
        assert!(!Lifetime::Instance.outlives(Lifetime::ContainerControlled));
        assert!(!Lifetime::Unique.outlives(Lifetime::Unique));
    }

    #[test]
    fn lifetime_display() {
        assert_eq!(Lifetime::ContainerControlled.to_string(), "ContainerControlled");
        assert_eq!(Lifetime::Unique.to_string(), "Unique");
    }

    #[test]
    fn unique_never_caches() {
        let manager = UniqueLifetimeManager;
        manager.set_value(Instance::from_value(1u8));
        assert!(manager.get_value().is_none());
        manager.recover();
        assert_eq!(manager.lifetime(), Lifetime::Unique);
    }

    #[test]
    fn instance_always_returns_seed() {
        let seed = Arc::new(5u32);
        let manager = InstanceLifetimeManager::new(Instance::new(Arc::clone(&seed)));

        manager.set_value(Instance::from_value(6u32));
        manager.remove_value();

        let value: Arc<u32> = manager.get_value().unwrap().downcast().unwrap();
        assert!(Arc::ptr_eq(&seed, &value));
    }

    #[test]
    fn miss_holds_lock_until_set_value() {
        let manager = ContainerControlledLifetimeManager::new();

        assert!(manager.get_value().is_none());
        assert!(manager.is_constructing());

        manager.set_value(Instance::from_value(42u32));
        assert!(!manager.is_constructing());

        let value: Arc<u32> = manager.get_value().unwrap().downcast().unwrap();
        assert_eq!(*value, 42);
    }

    #[test]
    fn recover_releases_lock_and_leaves_empty() {
        let manager = ContainerControlledLifetimeManager::new();

        assert!(manager.get_value().is_none());
        manager.recover();

        assert!(!manager.is_constructing());
        assert!(!manager.has_value());
    }

    #[test]
    fn release_without_lock_is_noop() {
        let manager = ContainerControlledLifetimeManager::new();
        manager.recover();
        manager.recover();
        manager.set_value(Instance::from_value(1u8));
        assert!(!manager.is_constructing());
        assert!(manager.has_value());
    }

    #[test]
    fn recover_from_other_thread_does_not_release() {
        let manager = Arc::new(ContainerControlledLifetimeManager::new());
        assert!(manager.get_value().is_none());

        let other = Arc::clone(&manager);
        thread::spawn(move || other.recover()).join().unwrap();

        assert!(manager.is_constructing());
        manager.recover();
        assert!(!manager.is_constructing());
    }

    #[test]
    fn first_value_is_never_replaced() {
        let manager = ContainerControlledLifetimeManager::new();
        let first = Arc::new(1u32);

        manager.set_value(Instance::new(Arc::clone(&first)));
        manager.set_value(Instance::from_value(2u32));

        let value: Arc<u32> = manager.get_value().unwrap().downcast().unwrap();
        assert!(Arc::ptr_eq(&first, &value));
    }

    #[test]
    fn cached_value_never_takes_the_lock() {
        let manager = ContainerControlledLifetimeManager::new();
        assert!(manager.cached_value().is_none());
        assert!(!manager.is_constructing());

        let first = Arc::new(1u32);
        manager.set_value(Instance::new(Arc::clone(&first)));

        let value: Arc<u32> = manager.cached_value().unwrap().downcast().unwrap();
        assert!(Arc::ptr_eq(&first, &value));
        assert!(UniqueLifetimeManager.cached_value().is_none());
    }

    #[test]
    fn remove_value_drops_cached_instance() {
        struct Tracked(Arc<AtomicBool>);

        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let manager = ContainerControlledLifetimeManager::new();
        manager.set_value(Instance::from_value(Tracked(Arc::clone(&dropped))));

        manager.remove_value();

        assert!(dropped.load(Ordering::SeqCst));
        assert!(!manager.has_value());
    }

    #[test]
    fn reentrant_miss_needs_matching_releases() {
        let manager = ContainerControlledLifetimeManager::new();

        assert!(manager.get_value().is_none());
        assert!(manager.get_value().is_none());

        manager.recover();
        assert!(manager.is_constructing());
        manager.recover();
        assert!(!manager.is_constructing());
    }

    #[test]
    fn waiter_observes_value_set_by_constructing_thread() {
        let manager = Arc::new(ContainerControlledLifetimeManager::new());
        assert!(manager.get_value().is_none());

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                tx.send(()).unwrap();
                manager.get_value()
            })
        };

        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        let value = Arc::new(7u32);
        manager.set_value(Instance::new(Arc::clone(&value)));

        let seen: Arc<u32> = waiter.join().unwrap().unwrap().downcast().unwrap();
        assert!(Arc::ptr_eq(&value, &seen));
        assert!(!manager.is_constructing());
    }

    #[test]
    fn waiter_takes_over_after_recover() {
        let manager = Arc::new(ContainerControlledLifetimeManager::new());
        assert!(manager.get_value().is_none());

        let waiter = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let miss = manager.get_value().is_none();
                let holds = manager.is_constructing();
                manager.set_value(Instance::from_value(9u32));
                (miss, holds)
            })
        };

        thread::sleep(Duration::from_millis(20));
        manager.recover();

        assert_eq!(waiter.join().unwrap(), (true, true));
        let value: Arc<u32> = manager.get_value().unwrap().downcast().unwrap();
        assert_eq!(*value, 9);
    }
}
