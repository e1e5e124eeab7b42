//! Recursive graph resolution.
//!
//! The engine walks one requested [`Dependency`] down to its leaves:
//!
//! ```text
//! resolve(dep) ─ cycle? ─> CircularDependency
//!     │
//!     ├─ lookup / auto-wire ─ none ─> Unconstructable
//!     │
//!     ├─ ResolutionContext ─> value supplied for this call
//!     │
//!     └─ Managed ─ get_value hit ─> cached instance
//!                     │ miss (guard armed)
//!                     ├─ resolve each declared dependency
//!                     ├─ factory.create
//!                     └─ set_value ─> instance
//! ```
//!
//! Every frame of one top-level call shares the caller's [`ContextValues`]
//! and knows the keys under construction above it, which is how cycles are
//! reported instead of recursing forever.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use quickwire_support::rendering::suggest_similar;
use tracing::{trace, warn};

use crate::error::{
    BoxError, CircularDependencyError, MissingContextValueError, QuickwireError, Result,
    UnconstructableTypeError,
};
use crate::factory::{Dependency, Factory, Resolved};
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::lifetime::LifetimeManager;
use crate::recovery::RecoveryGuard;
use crate::registry::{Binding, Registration, Registry};

const MAX_SUGGESTIONS: usize = 3;

/// Values supplied for resolution-context types during one resolve call.
///
/// Every reference to a context type within the call receives the same
/// instance. Values for types that are not registered as resolution
/// context are never consulted.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use quickwire_container::engine::ContextValues;
///
/// struct RequestId(u64);
///
/// let context = ContextValues::new().with(Arc::new(RequestId(7)));
/// assert_eq!(context.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct ContextValues {
    values: HashMap<TypeKey, Instance>,
}

impl ContextValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the value for `T`, builder style.
    pub fn with<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.insert(value);
        self
    }

    /// Sets the value for `T`, replacing any previous one.
    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.values.insert(TypeKey::of::<T>(), Instance::new(value));
    }

    pub fn get(&self, key: &TypeKey) -> Option<&Instance> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ContextValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// One frame of a resolve call: the type being constructed and its parent.
///
/// Frames live on the stack of the resolving thread, so nothing about a
/// call outlives it or is visible to other calls.
pub(crate) struct ResolutionCall<'a> {
    context: &'a ContextValues,
    key: Option<TypeKey>,
    parent: Option<&'a ResolutionCall<'a>>,
}

impl<'a> ResolutionCall<'a> {
    pub fn root(context: &'a ContextValues) -> Self {
        Self {
            context,
            key: None,
            parent: None,
        }
    }

    /// A child frame constructing `key`.
    pub fn enter(&self, key: TypeKey) -> ResolutionCall<'_> {
        ResolutionCall {
            context: self.context,
            key: Some(key),
            parent: Some(self),
        }
    }

    /// The type whose construction requested the current dependency.
    pub fn requester(&self) -> Option<TypeKey> {
        self.key
    }

    pub fn is_constructing(&self, key: TypeKey) -> bool {
        self.frames().any(|frame| frame == key)
    }

    /// The keys from the outermost occurrence of `key` down to this frame,
    /// closed with `key` again: `[A, B, C, A]`.
    pub fn chain_to(&self, key: TypeKey) -> Vec<TypeKey> {
        let mut path: Vec<TypeKey> = self.frames().collect();
        path.reverse();

        let start = path.iter().position(|k| *k == key).unwrap_or(0);
        let mut chain = path.split_off(start);
        chain.push(key);
        chain
    }

    fn frames(&self) -> impl Iterator<Item = TypeKey> + '_ {
        std::iter::successors(Some(self), |frame| frame.parent).filter_map(|frame| frame.key)
    }
}

/// Resolves dependencies against a registration table.
pub(crate) struct ResolutionEngine<'c> {
    registry: &'c Registry,
    auto_wire: bool,
}

impl<'c> ResolutionEngine<'c> {
    pub fn new(registry: &'c Registry, auto_wire: bool) -> Self {
        Self {
            registry,
            auto_wire,
        }
    }

    /// Resolves a top-level request.
    pub fn resolve_root(&self, dependency: &Dependency, context: &ContextValues) -> Result<Instance> {
        trace!(key = %dependency.key(), context_values = context.len(), "Resolving");
        let call = ResolutionCall::root(context);
        self.resolve(dependency, &call)
    }

    fn resolve(&self, dependency: &Dependency, call: &ResolutionCall<'_>) -> Result<Instance> {
        let key = dependency.key();

        if call.is_constructing(key) {
            let chain = call.chain_to(key);
            warn!(cycle = ?chain, "Circular dependency detected while resolving");
            return Err(QuickwireError::CircularDependency(CircularDependencyError { chain }));
        }

        let registration = self.lookup(dependency, call)?;

        match registration.binding() {
            Binding::ResolutionContext => call.context.get(&key).cloned().ok_or_else(|| {
                QuickwireError::MissingContextValue(MissingContextValueError {
                    key,
                    required_by: call.requester(),
                })
            }),
            Binding::Managed { manager, factory } => {
                self.construct(key, manager.as_ref(), factory.as_deref(), call)
            }
        }
    }

    fn lookup(&self, dependency: &Dependency, call: &ResolutionCall<'_>) -> Result<Arc<Registration>> {
        let key = dependency.key();

        if let Some(registration) = self.registry.get(&key) {
            return Ok(registration);
        }

        match dependency.constructor() {
            Some(factory) if self.auto_wire => {
                Ok(self.registry.get_or_synthesize(key, move || factory))
            }
            _ => Err(self.unconstructable(key, call.requester())),
        }
    }

    fn construct(
        &self,
        key: TypeKey,
        manager: &dyn LifetimeManager,
        factory: Option<&dyn Factory>,
        call: &ResolutionCall<'_>,
    ) -> Result<Instance> {
        if let Some(value) = manager.get_value() {
            trace!(key = %key, lifetime = %manager.lifetime(), "Using cached instance");
            return Ok(value);
        }

        let guard = RecoveryGuard::new(manager, key);

        let factory = factory.ok_or_else(|| self.unconstructable(key, call.requester()))?;

        let frame = call.enter(key);
        let dependencies = factory.dependencies();
        let mut values = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            values.push((dependency.key(), self.resolve(dependency, &frame)?));
        }

        trace!(key = %key, factory = factory.name(), "Invoking factory");
        let mut args = Resolved::new(key, values);
        let instance = factory
            .create(&mut args)
            .map_err(|source| construction_failed(key, source))?;

        Ok(guard.complete(instance))
    }

    fn unconstructable(&self, key: TypeKey, required_by: Option<TypeKey>) -> QuickwireError {
        let names = self.registry.registered_names();

        QuickwireError::Unconstructable(UnconstructableTypeError {
            requested: key,
            required_by,
            suggestions: suggest_similar(key.type_name(), &names, MAX_SUGGESTIONS),
        })
    }
}

/// Wraps a factory error for `key`, passing through a `ConstructionFailed`
/// the factory already received from [`Resolved::next`].
fn construction_failed(key: TypeKey, source: BoxError) -> QuickwireError {
    match source.downcast::<QuickwireError>() {
        Ok(err) => match *err {
            err @ QuickwireError::ConstructionFailed { .. } => err,
            other => QuickwireError::ConstructionFailed {
                key,
                source: Box::new(other),
            },
        },
        Err(source) => QuickwireError::ConstructionFailed { key, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct C;

    #[test]
    fn context_values_builder() {
        let value = Arc::new(5u32);
        let context = ContextValues::new().with(Arc::clone(&value)).with(Arc::new(A));

        assert_eq!(context.len(), 2);
        assert!(context.contains(&TypeKey::of::<A>()));

        let stored: Arc<u32> = context.get(&TypeKey::of::<u32>()).unwrap().downcast().unwrap();
        assert!(Arc::ptr_eq(&value, &stored));
    }

    #[test]
    fn root_frame_constructs_nothing() {
        let context = ContextValues::new();
        let root = ResolutionCall::root(&context);

        assert_eq!(root.requester(), None);
        assert!(!root.is_constructing(TypeKey::of::<A>()));
    }

    #[test]
    fn nested_frames_track_path() {
        let context = ContextValues::new();
        let root = ResolutionCall::root(&context);
        let a = root.enter(TypeKey::of::<A>());
        let b = a.enter(TypeKey::of::<B>());

        assert_eq!(b.requester(), Some(TypeKey::of::<B>()));
        assert!(b.is_constructing(TypeKey::of::<A>()));
        assert!(!a.is_constructing(TypeKey::of::<B>()));
    }

    #[test]
    fn chain_starts_at_repeated_key() {
        let context = ContextValues::new();
        let root = ResolutionCall::root(&context);
        let c = root.enter(TypeKey::of::<C>());
        let a = c.enter(TypeKey::of::<A>());
        let b = a.enter(TypeKey::of::<B>());

        assert_eq!(
            b.chain_to(TypeKey::of::<A>()),
            vec![TypeKey::of::<A>(), TypeKey::of::<B>(), TypeKey::of::<A>()]
        );
    }

    #[test]
    fn factory_error_is_wrapped_once() {
        let key = TypeKey::of::<A>();

        let nested = QuickwireError::ConstructionFailed {
            key,
            source: "Type mismatch".into(),
        };
        match construction_failed(key, Box::new(nested)) {
            QuickwireError::ConstructionFailed { key: failed, source } => {
                assert_eq!(failed, key);
                assert_eq!(source.to_string(), "Type mismatch");
            }
            other => panic!("Expected ConstructionFailed, got: {other:?}"),
        }

        match construction_failed(key, "disk full".into()) {
            QuickwireError::ConstructionFailed { source, .. } => {
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("Expected ConstructionFailed, got: {other:?}"),
        }
    }
}
