//! Construction strategies.
//!
//! A [`Factory`] declares the dependencies it needs and builds an
//! [`Instance`] once the engine has resolved them. Three factories ship
//! with the crate:
//!
//! - [`ConstructorFactory`]: the default strategy for any [`Injectable`]
//!   type, also used when auto-wiring unregistered types;
//! - [`ClosureFactory`]: a caller-supplied closure over declared
//!   dependencies;
//! - [`ParameterizedInjectionFactory`]: resolves a *source* type and
//!   derives the target from it, e.g. a trait object stored inside a
//!   concrete service.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use quickwire_container::factory::{Dependency, Injectable, Resolved};
//! use quickwire_container::error::BoxError;
//!
//! struct Pool;
//!
//! impl Injectable for Pool {
//!     fn construct(_: &mut Resolved) -> Result<Self, BoxError> {
//!         Ok(Pool)
//!     }
//! }
//!
//! struct Repository {
//!     pool: Arc<Pool>,
//! }
//!
//! impl Injectable for Repository {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::of::<Pool>()]
//!     }
//!
//!     fn construct(args: &mut Resolved) -> Result<Self, BoxError> {
//!         Ok(Repository { pool: args.next()? })
//!     }
//! }
//! ```

use std::any::type_name;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{BoxError, QuickwireError, Result};
use crate::instance::Instance;
use crate::key::TypeKey;

/// Produces instances of one type from its resolved dependencies.
///
/// Factories are shared between threads and may be invoked concurrently
/// for types whose lifetime does not serialize construction.
pub trait Factory: Send + Sync {
    /// Dependencies to resolve before [`Factory::create`], in the order
    /// [`Resolved::next`] hands them out.
    fn dependencies(&self) -> &[Dependency];

    /// Builds a new instance.
    ///
    /// # Errors
    /// Any error is reported to the caller wrapped in
    /// [`QuickwireError::ConstructionFailed`].
    fn create(&self, args: &mut Resolved) -> std::result::Result<Instance, BoxError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// A type with a discoverable constructor.
///
/// This is what makes a type auto-wirable: resolving an unregistered
/// `Injectable` type builds it through [`Injectable::construct`] with a
/// unique lifetime.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor parameters, in declaration order.
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn construct(args: &mut Resolved) -> std::result::Result<Self, BoxError>;
}

/// A dependency declared by a factory.
///
/// Besides the [`TypeKey`], a dependency on an [`Injectable`] type carries
/// that type's constructor so the engine can build it without a
/// registration.
#[derive(Clone)]
pub struct Dependency {
    key: TypeKey,
    constructor: Option<fn() -> Arc<dyn Factory>>,
}

impl Dependency {
    /// A dependency on a concrete, constructible type.
    pub fn of<T: Injectable>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            constructor: Some(ConstructorFactory::<T>::shared),
        }
    }

    /// A dependency on an abstract capability (usually `dyn Trait`).
    ///
    /// It resolves only through a registration.
    pub fn interface<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            constructor: None,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Builds the default factory for this type, if it has a constructor.
    pub fn constructor(&self) -> Option<Arc<dyn Factory>> {
        self.constructor.map(|constructor| constructor())
    }

    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("key", &self.key)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// Resolved dependencies handed to [`Factory::create`].
///
/// Values come out in the order the factory declared them.
pub struct Resolved {
    owner: TypeKey,
    values: VecDeque<(TypeKey, Instance)>,
}

impl Resolved {
    pub(crate) fn new(owner: TypeKey, values: Vec<(TypeKey, Instance)>) -> Self {
        Self {
            owner,
            values: values.into(),
        }
    }

    /// Takes the next dependency as `Arc<T>`.
    ///
    /// # Errors
    /// [`QuickwireError::ConstructionFailed`] if every declared dependency
    /// was already taken or the next one is not a `T`.
    pub fn next<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        let (key, instance) =
            self.values
                .pop_front()
                .ok_or_else(|| QuickwireError::ConstructionFailed {
                    key: self.owner,
                    source: format!(
                        "requested {} but every declared dependency was already taken",
                        type_name::<T>()
                    )
                    .into(),
                })?;

        instance
            .downcast::<T>()
            .ok_or_else(|| QuickwireError::ConstructionFailed {
                key: self.owner,
                source: format!(
                    "Type mismatch: dependency {key} holds {}, expected {}",
                    instance.type_name(),
                    type_name::<T>()
                )
                .into(),
            })
    }

    /// The type being constructed.
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Number of dependencies not taken yet.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("owner", &self.owner)
            .field("remaining", &self.values.len())
            .finish()
    }
}

// ============================================================
// ConstructorFactory
// ============================================================

/// Builds an [`Injectable`] type through its constructor.
pub struct ConstructorFactory<T: Injectable> {
    dependencies: Vec<Dependency>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> ConstructorFactory<T> {
    pub fn new() -> Self {
        Self {
            dependencies: T::dependencies(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn shared() -> Arc<dyn Factory> {
        Arc::new(Self::new())
    }
}

impl<T: Injectable> Default for ConstructorFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Injectable> Factory for ConstructorFactory<T> {
    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn create(&self, args: &mut Resolved) -> std::result::Result<Instance, BoxError> {
        T::construct(args).map(Instance::from_value)
    }

    fn name(&self) -> &str {
        type_name::<T>()
    }
}

// ============================================================
// ClosureFactory
// ============================================================

type Builder<T> = Box<dyn Fn(&mut Resolved) -> std::result::Result<Arc<T>, BoxError> + Send + Sync>;

/// Builds `T` with a closure over declared dependencies.
///
/// Typical use is binding an abstract capability to an implementation:
///
/// ```
/// use std::sync::Arc;
/// use quickwire_container::factory::{ClosureFactory, Dependency};
///
/// trait Clock: Send + Sync {}
/// struct SystemClock;
/// impl Clock for SystemClock {}
///
/// let factory = ClosureFactory::<dyn Clock>::new(vec![], |_| {
///     Ok(Arc::new(SystemClock) as Arc<dyn Clock>)
/// });
/// ```
pub struct ClosureFactory<T: ?Sized + Send + Sync + 'static> {
    dependencies: Vec<Dependency>,
    build: Builder<T>,
}

impl<T: ?Sized + Send + Sync + 'static> ClosureFactory<T> {
    pub fn new<F>(dependencies: Vec<Dependency>, build: F) -> Self
    where
        F: Fn(&mut Resolved) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        Self {
            dependencies,
            build: Box::new(build),
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Factory for ClosureFactory<T> {
    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn create(&self, args: &mut Resolved) -> std::result::Result<Instance, BoxError> {
        (self.build)(args).map(Instance::new)
    }

    fn name(&self) -> &str {
        type_name::<T>()
    }
}

// ============================================================
// ParameterizedInjectionFactory
// ============================================================

type Extractor<S, T> = Box<dyn Fn(&S) -> std::result::Result<Arc<T>, BoxError> + Send + Sync>;

/// Resolves a source `S`, then derives the target `T` from it.
///
/// The source goes through the full resolution algorithm, so its own
/// lifetime manager still applies; the target's lifetime manager caches
/// the derived value like any other constructed value.
///
/// ```
/// use std::sync::Arc;
/// use quickwire_container::error::BoxError;
/// use quickwire_container::factory::{Injectable, ParameterizedInjectionFactory, Resolved};
///
/// trait Transport: Send + Sync {}
/// struct Smtp;
/// impl Transport for Smtp {}
///
/// struct Mailer {
///     transport: Arc<dyn Transport>,
/// }
///
/// impl Injectable for Mailer {
///     fn construct(_: &mut Resolved) -> Result<Self, BoxError> {
///         Ok(Mailer { transport: Arc::new(Smtp) })
///     }
/// }
///
/// let factory = ParameterizedInjectionFactory::<Mailer, dyn Transport>::new(|mailer| {
///     Ok(Arc::clone(&mailer.transport))
/// });
/// ```
pub struct ParameterizedInjectionFactory<S, T>
where
    S: ?Sized + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    source: Vec<Dependency>,
    extract: Extractor<S, T>,
}

impl<S, T> ParameterizedInjectionFactory<S, T>
where
    S: Injectable,
    T: ?Sized + Send + Sync + 'static,
{
    /// Derives `T` from a constructible source, which is auto-wired when it
    /// has no registration.
    pub fn new<F>(extract: F) -> Self
    where
        F: Fn(&S) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        Self::with_source(Dependency::of::<S>(), extract)
    }
}

impl<S, T> ParameterizedInjectionFactory<S, T>
where
    S: ?Sized + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    /// Derives `T` from a source that resolves only through a registration.
    pub fn from_registered<F>(extract: F) -> Self
    where
        F: Fn(&S) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        Self::with_source(Dependency::interface::<S>(), extract)
    }

    fn with_source<F>(source: Dependency, extract: F) -> Self
    where
        F: Fn(&S) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        Self {
            source: vec![source],
            extract: Box::new(extract),
        }
    }

    pub fn source(&self) -> TypeKey {
        self.source[0].key()
    }
}

impl<S, T> Factory for ParameterizedInjectionFactory<S, T>
where
    S: ?Sized + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    fn dependencies(&self) -> &[Dependency] {
        &self.source
    }

    fn create(&self, args: &mut Resolved) -> std::result::Result<Instance, BoxError> {
        let source = args.next::<S>()?;
        let target = (self.extract)(&*source)?;
        Ok(Instance::new(target))
    }

    fn name(&self) -> &str {
        type_name::<Self>()
    }
}
