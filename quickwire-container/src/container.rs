//! # The Container
//!
//! Owns the registration table and resolves object graphs from it.
//!
//! # Lifecycle
//! ```text
//! Container::new()  ──register_*()──>  Open  ──seal()──>  Sealed
//!                                        │                  │
//!                                        └──── resolve*() ──┘
//! ```
//!
//! Registration is only possible while the container is Open; resolution
//! works in both states. All methods take `&self`, so a container can be
//! shared between threads behind an `Arc`.
//!
//! # Examples
//! ```rust
//! use quickwire_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) { println!("{msg}"); }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! impl Injectable for UserService {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::interface::<dyn Logger>()]
//!     }
//!
//!     fn construct(args: &mut Resolved) -> std::result::Result<Self, BoxError> {
//!         Ok(UserService { logger: args.next()? })
//!     }
//! }
//!
//! let container = Container::new();
//! container
//!     .register_instance::<dyn Logger>(Arc::new(ConsoleLogger))
//!     .expect("Failed to register logger");
//! container.seal().expect("Failed to seal container");
//!
//! let service: Arc<UserService> = container.resolve().expect("Failed to resolve");
//! service.logger.log("ready");
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::engine::{ContextValues, ResolutionEngine};
use crate::error::{QuickwireError, Result};
use crate::factory::{ConstructorFactory, Dependency, Factory, Injectable};
use crate::graph::GraphValidator;
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::lifetime::{
    ContainerControlledLifetimeManager, InstanceLifetimeManager, Lifetime, LifetimeManager,
    UniqueLifetimeManager,
};
use crate::module::Module;
use crate::registry::{Registration, Registry, SealState};

// ============================================================
// ContainerSettings
// ============================================================

/// Behavior switches for a [`Container`].
///
/// ```rust
/// use quickwire_container::container::ContainerSettings;
///
/// let settings = ContainerSettings::default()
///     .with_allow_override(true)
///     .with_validate_on_seal(false);
/// assert!(settings.auto_wire);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSettings {
    /// Replace explicit registrations instead of failing with
    /// [`QuickwireError::AlreadyRegistered`]. Default `false`.
    pub allow_override: bool,

    /// Construct unregistered [`Injectable`] types with a Unique lifetime.
    /// Default `true`.
    pub auto_wire: bool,

    /// Validate the dependency graph in [`Container::seal`]. Default `true`.
    pub validate_on_seal: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            allow_override: false,
            auto_wire: true,
            validate_on_seal: true,
        }
    }
}

impl ContainerSettings {
    pub fn with_allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    pub fn with_auto_wire(mut self, enabled: bool) -> Self {
        self.auto_wire = enabled;
        self
    }

    pub fn with_validate_on_seal(mut self, enabled: bool) -> Self {
        self.validate_on_seal = enabled;
        self
    }
}

// ============================================================
// Container
// ============================================================

/// Thread-safe dependency injection container.
pub struct Container {
    registry: Registry,
    settings: ContainerSettings,
}

impl Container {
    /// Creates an Open container with default settings.
    pub fn new() -> Self {
        Self::with_settings(ContainerSettings::default())
    }

    pub fn with_settings(settings: ContainerSettings) -> Self {
        debug!(?settings, "Creating container");
        Self {
            registry: Registry::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    // ── Registration ──

    /// Registers `T` with an explicit lifetime manager and its constructor.
    pub fn register_type<T: Injectable>(&self, manager: Arc<dyn LifetimeManager>) -> Result<()> {
        self.register(Registration::managed(
            TypeKey::of::<T>(),
            manager,
            Some(ConstructorFactory::<T>::shared()),
        ))
    }

    /// Registers `T` with a lifetime manager and no factory.
    ///
    /// The value must reach the manager some other way, for example through
    /// [`LifetimeManager::set_value`]. Until it does, resolving `T` fails
    /// with [`QuickwireError::Unconstructable`].
    pub fn register_managed<T>(&self, manager: Arc<dyn LifetimeManager>) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(Registration::managed(TypeKey::of::<T>(), manager, None))
    }

    /// Registers a custom factory for `T` with a Unique lifetime.
    pub fn register_factory<T>(&self, factory: impl Factory + 'static) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_with::<T>(Arc::new(UniqueLifetimeManager), factory)
    }

    /// Registers `T` with both an explicit lifetime manager and factory.
    pub fn register_with<T>(
        &self,
        manager: Arc<dyn LifetimeManager>,
        factory: impl Factory + 'static,
    ) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(Registration::managed(
            TypeKey::of::<T>(),
            manager,
            Some(Arc::new(factory)),
        ))
    }

    /// Registers `T` as a container-wide singleton built by its constructor.
    pub fn register_singleton<T: Injectable>(&self) -> Result<()> {
        self.register_type::<T>(Arc::new(ContainerControlledLifetimeManager::new()))
    }

    /// Registers a pre-built value, returned by identity on every resolve.
    ///
    /// ```rust
    /// use quickwire_container::prelude::*;
    /// use std::sync::Arc;
    ///
    /// let container = Container::new();
    /// let config = Arc::new(String::from("postgres://localhost"));
    /// container.register_instance(Arc::clone(&config)).unwrap();
    ///
    /// let resolved: Arc<String> = container.resolve_dyn().unwrap();
    /// assert!(Arc::ptr_eq(&config, &resolved));
    /// ```
    pub fn register_instance<T>(&self, value: Arc<T>) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(Registration::managed(
            TypeKey::of::<T>(),
            Arc::new(InstanceLifetimeManager::new(Instance::new(value))),
            None,
        ))
    }

    /// Registers `T` as supplied by the caller of each top-level resolve.
    ///
    /// See [`Container::resolve_with`].
    pub fn register_resolution_context<T>(&self) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(Registration::resolution_context(TypeKey::of::<T>()))
    }

    /// Runs a [`Module`]'s registrations against this container.
    pub fn install(&self, module: &dyn Module) -> Result<()> {
        debug!(module = module.name(), "Installing module");

        module.register(self).inspect_err(|err| {
            warn!(module = module.name(), error = %err, "Module registration failed");
        })
    }

    fn register(&self, registration: Registration) -> Result<()> {
        self.registry
            .register(registration, self.settings.allow_override)
    }

    // ── Seal ──

    /// Freezes the registration table.
    ///
    /// When `validate_on_seal` is set, the dependency graph is checked first
    /// and the container stays Open if the check fails.
    ///
    /// # Errors
    /// - [`QuickwireError::ContainerSealed`] if already sealed
    /// - [`QuickwireError::CircularDependency`] or
    ///   [`QuickwireError::Unconstructable`] from validation
    #[instrument(skip(self), name = "container_seal")]
    pub fn seal(&self) -> Result<()> {
        info!(registered = self.registry.len(), "Sealing container");

        let ContainerSettings {
            auto_wire,
            validate_on_seal,
            ..
        } = self.settings;

        self.registry.seal(|registrations| {
            if validate_on_seal {
                GraphValidator::new(registrations, auto_wire).validate()
            } else {
                Ok(())
            }
        })?;

        info!("Container sealed");
        Ok(())
    }

    pub fn state(&self) -> SealState {
        self.registry.state()
    }

    pub fn is_sealed(&self) -> bool {
        self.state() == SealState::Sealed
    }

    // ── Introspection ──

    /// Returns `true` if `T` has a registration, explicit or auto-wired.
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.registry.get(&TypeKey::of::<T>()).is_some()
    }

    /// The lifetime `T` is registered with, if any.
    pub fn lifetime_of<T: ?Sized + 'static>(&self) -> Option<Lifetime> {
        self.registry
            .get(&TypeKey::of::<T>())
            .map(|registration| registration.lifetime())
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    // ── Resolution ──

    /// Resolves `T`, auto-wiring it and its dependencies when unregistered.
    ///
    /// ```rust,ignore
    /// let repo: Arc<UserRepository> = container.resolve()?;
    /// ```
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        self.resolve_with(&ContextValues::new())
    }

    /// Resolves `T` with resolution-context values for this call only.
    ///
    /// ```rust,ignore
    /// let context = ContextValues::new().with(Arc::new(RequestId(7)));
    /// let handler: Arc<Handler> = container.resolve_with(&context)?;
    /// ```
    pub fn resolve_with<T: Injectable>(&self, context: &ContextValues) -> Result<Arc<T>> {
        let instance = self.resolve_dependency(&Dependency::of::<T>(), context)?;
        downcast(instance)
    }

    /// Resolves a registered type, which may be a trait object.
    ///
    /// Unlike [`Container::resolve`] this never auto-wires: `T` needs a
    /// registration.
    pub fn resolve_dyn<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_dyn_with(&ContextValues::new())
    }

    pub fn resolve_dyn_with<T>(&self, context: &ContextValues) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let instance = self.resolve_dependency(&Dependency::interface::<T>(), context)?;
        downcast(instance)
    }

    /// Resolves a dependency to its type-erased instance.
    pub fn resolve_dependency(
        &self,
        dependency: &Dependency,
        context: &ContextValues,
    ) -> Result<Instance> {
        ResolutionEngine::new(&self.registry, self.settings.auto_wire)
            .resolve_root(dependency, context)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.registry.len())
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish()
    }
}

fn downcast<T: ?Sized + Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .ok_or_else(|| QuickwireError::ConstructionFailed {
            key: TypeKey::of::<T>(),
            source: format!(
                "Type mismatch: expected {}, found {}",
                type_name::<T>(),
                instance.type_name()
            )
            .into(),
        })
}

// ============================================================
// Prelude
// ============================================================

pub mod prelude {
    pub use super::{Container, ContainerSettings};
    pub use crate::engine::ContextValues;
    pub use crate::error::{BoxError, QuickwireError, Result};
    pub use crate::factory::{
        ClosureFactory, ConstructorFactory, Dependency, Factory, Injectable,
        ParameterizedInjectionFactory, Resolved,
    };
    pub use crate::instance::Instance;
    pub use crate::key::TypeKey;
    pub use crate::lifetime::{
        ContainerControlledLifetimeManager, InstanceLifetimeManager, Lifetime, LifetimeManager,
        UniqueLifetimeManager,
    };
    pub use crate::module::Module;
    pub use crate::registry::SealState;
}

// ============================================================
// Tests
// ============================================================
