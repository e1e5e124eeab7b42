//! Registration table: one registration per [`TypeKey`], Open until sealed.
//!
//! The table is a sharded [`DashMap`], so resolution never takes a
//! container-wide lock. The seal state sits behind its own lock: mutations
//! hold it shared, [`Registry::seal`] holds it exclusively, so a
//! registration in flight always finishes before the table freezes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{AlreadyRegisteredError, ContainerSealedError, QuickwireError, Result};
use crate::factory::{Dependency, Factory};
use crate::key::TypeKey;
use crate::lifetime::{Lifetime, LifetimeManager, UniqueLifetimeManager};

/// How a registered type obtains its value.
#[derive(Clone)]
pub enum Binding {
    /// A lifetime manager, optionally paired with a factory for misses.
    Managed {
        manager: Arc<dyn LifetimeManager>,
        factory: Option<Arc<dyn Factory>>,
    },

    /// The value is supplied by the caller of each top-level resolve.
    ResolutionContext,
}

/// Where a registration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Registered by the caller.
    Explicit,

    /// Created by auto-wiring on first resolution.
    Synthesized,
}

/// A single entry of the registration table.
#[derive(Clone)]
pub struct Registration {
    key: TypeKey,
    binding: Binding,
    origin: Origin,
}

impl Registration {
    pub fn managed(
        key: TypeKey,
        manager: Arc<dyn LifetimeManager>,
        factory: Option<Arc<dyn Factory>>,
    ) -> Self {
        Self {
            key,
            binding: Binding::Managed { manager, factory },
            origin: Origin::Explicit,
        }
    }

    pub fn resolution_context(key: TypeKey) -> Self {
        Self {
            key,
            binding: Binding::ResolutionContext,
            origin: Origin::Explicit,
        }
    }

    /// The Unique registration auto-wiring creates for a constructible type.
    pub(crate) fn synthesized(key: TypeKey, factory: Arc<dyn Factory>) -> Self {
        Self {
            key,
            binding: Binding::Managed {
                manager: Arc::new(UniqueLifetimeManager),
                factory: Some(factory),
            },
            origin: Origin::Synthesized,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn lifetime(&self) -> Lifetime {
        match &self.binding {
            Binding::Managed { manager, .. } => manager.lifetime(),
            Binding::ResolutionContext => Lifetime::ResolutionContext,
        }
    }

    /// Dependencies declared by the registration's factory, if it has one.
    pub fn dependencies(&self) -> &[Dependency] {
        match &self.binding {
            Binding::Managed {
                factory: Some(factory),
                ..
            } => factory.dependencies(),
            _ => &[],
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factory = match &self.binding {
            Binding::Managed {
                factory: Some(factory),
                ..
            } => Some(factory.name()),
            _ => None,
        };

        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime())
            .field("factory", &factory)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Whether the registration table still accepts mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealState {
    Open,
    Sealed,
}

/// Stores all registrations of a container.
pub(crate) struct Registry {
    registrations: DashMap<TypeKey, Arc<Registration>>,
    state: RwLock<SealState>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            registrations: DashMap::new(),
            state: RwLock::new(SealState::Open),
        }
    }

    /// Adds an explicit registration.
    ///
    /// # Errors
    /// - [`QuickwireError::ContainerSealed`] if the table is sealed
    /// - [`QuickwireError::AlreadyRegistered`] if the key already has an
    ///   explicit registration and `allow_override` is false
    pub fn register(&self, registration: Registration, allow_override: bool) -> Result<()> {
        let key = registration.key;
        let state = self.state.read();

        if *state == SealState::Sealed {
            return Err(QuickwireError::ContainerSealed(ContainerSealedError {
                attempted: Some(key),
            }));
        }

        let lifetime = registration.lifetime();
        match self.registrations.entry(key) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get().origin;
                if existing == Origin::Explicit && !allow_override {
                    return Err(QuickwireError::AlreadyRegistered(AlreadyRegisteredError {
                        key,
                    }));
                }
                debug!(key = %key, %lifetime, replaced = ?existing, "Replaced registration");
                occupied.insert(Arc::new(registration));
            }
            Entry::Vacant(vacant) => {
                debug!(key = %key, %lifetime, "Registered type");
                vacant.insert(Arc::new(registration));
            }
        }

        Ok(())
    }

    /// Moves the table to [`SealState::Sealed`] once `validate` accepts it.
    ///
    /// On a validation error the table stays Open.
    pub fn seal<F>(&self, validate: F) -> Result<()>
    where
        F: FnOnce(&HashMap<TypeKey, Arc<Registration>>) -> Result<()>,
    {
        let mut state = self.state.write();

        if *state == SealState::Sealed {
            return Err(QuickwireError::ContainerSealed(ContainerSealedError {
                attempted: None,
            }));
        }

        validate(&self.snapshot())?;
        *state = SealState::Sealed;
        Ok(())
    }

    pub fn state(&self) -> SealState {
        *self.state.read()
    }

    pub fn get(&self, key: &TypeKey) -> Option<Arc<Registration>> {
        self.registrations
            .get(key)
            .map(|registration| Arc::clone(registration.value()))
    }

    /// Returns the registration for `key`, inserting the auto-wired one
    /// built by `factory` if the key is unknown.
    ///
    /// Concurrent callers for the same key observe one registration.
    pub fn get_or_synthesize<F>(&self, key: TypeKey, factory: F) -> Arc<Registration>
    where
        F: FnOnce() -> Arc<dyn Factory>,
    {
        if let Some(existing) = self.get(&key) {
            return existing;
        }

        let entry = self.registrations.entry(key).or_insert_with(|| {
            trace!(key = %key, "Auto-wiring unregistered type");
            Arc::new(Registration::synthesized(key, factory()))
        });
        Arc::clone(entry.value())
    }

    /// Copies the current table, for validation.
    pub fn snapshot(&self) -> HashMap<TypeKey, Arc<Registration>> {
        self.registrations
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    /// Fully qualified names of every registered type (for suggestions).
    pub fn registered_names(&self) -> Vec<&'static str> {
        self.registrations
            .iter()
            .map(|entry| entry.key().type_name())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("registered", &self.len())
            .field("state", &self.state())
            .finish()
    }
}
