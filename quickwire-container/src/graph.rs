//! Dependency graph validation.
//!
//! Validates the registration table when the container is sealed:
//! - every dependency is registered or auto-wirable
//! - the dependency relation has no cycles
//! - cached types capturing a resolution-context value are reported
//!
//! All of this runs during [`Container::seal()`](crate::Container::seal),
//! before anything is constructed. Types reached only at resolve time are
//! checked again by the engine as it walks them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use quickwire_support::rendering::suggest_similar;
use tracing::{debug, instrument, warn};

use crate::error::{
    CircularDependencyError, QuickwireError, Result, UnconstructableTypeError,
};
use crate::factory::Dependency;
use crate::key::TypeKey;
use crate::lifetime::Lifetime;
use crate::registry::Registration;

const MAX_SUGGESTIONS: usize = 3;

/// Validates the dependency graph for correctness.
///
/// # Algorithm
/// Depth-first search from every registration. A `visiting` set plus the
/// current `path` detect cycles; `validated` skips subgraphs already known
/// to be sound. Unregistered dependencies that carry a constructor are
/// walked through that constructor's declared dependencies, as the engine
/// would auto-wire them.
pub(crate) struct GraphValidator<'a> {
    registrations: &'a HashMap<TypeKey, Arc<Registration>>,
    auto_wire: bool,
    visiting: HashSet<TypeKey>,
    validated: HashSet<TypeKey>,
    path: Vec<TypeKey>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(registrations: &'a HashMap<TypeKey, Arc<Registration>>, auto_wire: bool) -> Self {
        Self {
            registrations,
            auto_wire,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates the entire graph.
    ///
    /// # Errors
    /// - [`QuickwireError::CircularDependency`] if a cycle is found
    /// - [`QuickwireError::Unconstructable`] if a dependency can be neither
    ///   found nor auto-wired
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<()> {
        let registrations = self.registrations;
        let mut roots: Vec<&Arc<Registration>> = registrations.values().collect();
        roots.sort_by_key(|registration| registration.key().type_name());

        debug!(registration_count = roots.len(), "Starting dependency graph validation");

        for registration in roots {
            let key = registration.key();
            if !self.validated.contains(&key) {
                self.walk(key, Some(registration.lifetime()), registration.dependencies())?;
            }
        }

        debug!("Dependency graph validation passed");
        Ok(())
    }

    fn visit(&mut self, dependency: &Dependency) -> Result<()> {
        let key = dependency.key();

        if self.validated.contains(&key) {
            return Ok(());
        }

        if self.visiting.contains(&key) {
            let start = self.path.iter().position(|k| *k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(key);

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(QuickwireError::CircularDependency(CircularDependencyError { chain }));
        }

        if let Some(registration) = self.registrations.get(&key) {
            let registration = Arc::clone(registration);
            return self.walk(key, Some(registration.lifetime()), registration.dependencies());
        }

        match dependency.constructor() {
            Some(factory) if self.auto_wire => self.walk(key, None, factory.dependencies()),
            _ => Err(self.unconstructable(key)),
        }
    }

    fn walk(
        &mut self,
        key: TypeKey,
        lifetime: Option<Lifetime>,
        dependencies: &[Dependency],
    ) -> Result<()> {
        if let Some(lifetime) = lifetime {
            for captured in self.captured_context(lifetime, dependencies) {
                warn!(
                    consumer = %key,
                    lifetime = %lifetime,
                    dependency = %captured,
                    "Cached type depends on a resolution-context value; \
                     the first resolving call's value will be captured"
                );
            }
        }

        self.visiting.insert(key);
        self.path.push(key);

        for dependency in dependencies {
            self.visit(dependency)?;
        }

        self.path.pop();
        self.visiting.remove(&key);
        self.validated.insert(key);

        Ok(())
    }

    /// Dependencies whose resolution-context value would be kept alive by a
    /// consumer with a longer `lifetime`, such as a singleton holding the
    /// value of whichever call constructed it first.
    fn captured_context(&self, lifetime: Lifetime, dependencies: &[Dependency]) -> Vec<TypeKey> {
        dependencies
            .iter()
            .map(Dependency::key)
            .filter(|key| {
                self.registrations.get(key).is_some_and(|r| {
                    r.lifetime() == Lifetime::ResolutionContext && lifetime.outlives(r.lifetime())
                })
            })
            .collect()
    }

    fn unconstructable(&self, key: TypeKey) -> QuickwireError {
        let names: Vec<&str> = self.registrations.keys().map(TypeKey::type_name).collect();

        QuickwireError::Unconstructable(UnconstructableTypeError {
            requested: key,
            required_by: self.path.last().copied(),
            suggestions: suggest_similar(key.type_name(), &names, MAX_SUGGESTIONS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::factory::{ClosureFactory, Injectable, Resolved};
    use crate::lifetime::{ContainerControlledLifetimeManager, UniqueLifetimeManager};

    trait Store: Send + Sync {}

    struct Database;
    struct UserRepo;

    impl Injectable for Database {
        fn construct(_: &mut Resolved) -> std::result::Result<Self, BoxError> {
            Ok(Database)
        }
    }

    impl Injectable for UserRepo {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::of::<Database>()]
        }

        fn construct(args: &mut Resolved) -> std::result::Result<Self, BoxError> {
            args.next::<Database>()?;
            Ok(UserRepo)
        }
    }

    fn unique<T: Send + Sync + 'static>(dependencies: Vec<Dependency>) -> Registration {
        Registration::managed(
            TypeKey::of::<T>(),
            Arc::new(UniqueLifetimeManager),
            Some(Arc::new(ClosureFactory::<T>::new(dependencies, |_| {
                Err("not constructed during validation".into())
            }))),
        )
    }

    fn make_graph(registrations: Vec<Registration>) -> HashMap<TypeKey, Arc<Registration>> {
        registrations
            .into_iter()
            .map(|r| (r.key(), Arc::new(r)))
            .collect()
    }

    #[test]
    fn valid_graph_with_auto_wired_dependency() {
        struct Service;
        let graph = make_graph(vec![unique::<Service>(vec![Dependency::of::<UserRepo>()])]);

        let mut validator = GraphValidator::new(&graph, true);
        assert!(validator.validate().is_ok());
    }

    #[test]
    fn auto_wire_disabled_rejects_unregistered_dependency() {
        struct Service;
        let graph = make_graph(vec![unique::<Service>(vec![Dependency::of::<UserRepo>()])]);

        let mut validator = GraphValidator::new(&graph, false);
        match validator.validate().unwrap_err() {
            QuickwireError::Unconstructable(err) => {
                assert_eq!(err.requested, TypeKey::of::<UserRepo>());
                assert_eq!(err.required_by, Some(TypeKey::of::<Service>()));
            }
            other => panic!("Expected Unconstructable, got: {other:?}"),
        }
    }

    #[test]
    fn detect_circular_dependency() {
        // A → B → C → A
        struct A;
        struct B;
        struct C;

        let graph = make_graph(vec![
            unique::<A>(vec![Dependency::interface::<B>()]),
            unique::<B>(vec![Dependency::interface::<C>()]),
            unique::<C>(vec![Dependency::interface::<A>()]),
        ]);

        let mut validator = GraphValidator::new(&graph, true);
        match validator.validate().unwrap_err() {
            QuickwireError::CircularDependency(err) => {
                assert_eq!(err.chain.len(), 4);
                assert_eq!(err.chain.first(), err.chain.last());
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn detect_self_dependency() {
        struct A;
        let graph = make_graph(vec![unique::<A>(vec![Dependency::interface::<A>()])]);

        let mut validator = GraphValidator::new(&graph, true);
        assert!(matches!(
            validator.validate(),
            Err(QuickwireError::CircularDependency(_))
        ));
    }

    #[test]
    fn detect_missing_interface() {
        struct Service;
        let graph = make_graph(vec![
            unique::<Database>(vec![]),
            unique::<Service>(vec![Dependency::interface::<dyn Store>()]),
        ]);

        let mut validator = GraphValidator::new(&graph, true);
        match validator.validate().unwrap_err() {
            QuickwireError::Unconstructable(err) => {
                assert!(err.requested.type_name().contains("Store"));
                assert_eq!(err.required_by, Some(TypeKey::of::<Service>()));
            }
            other => panic!("Expected Unconstructable, got: {other:?}"),
        }
    }

    #[test]
    fn captured_context_is_legal() {
        struct Request;
        struct Handler;

        let graph = make_graph(vec![
            Registration::resolution_context(TypeKey::of::<Request>()),
            Registration::managed(
                TypeKey::of::<Handler>(),
                Arc::new(ContainerControlledLifetimeManager::new()),
                Some(Arc::new(ClosureFactory::<Handler>::new(
                    vec![Dependency::interface::<Request>()],
                    |_| Ok(Arc::new(Handler)),
                ))),
            ),
        ]);

        let mut validator = GraphValidator::new(&graph, true);
        assert!(validator.validate().is_ok());
    }

    #[test]
    fn captured_context_reported_for_longer_lifetimes_only() {
        struct Request;

        let graph = make_graph(vec![Registration::resolution_context(TypeKey::of::<Request>())]);
        let validator = GraphValidator::new(&graph, true);
        let dependencies = [Dependency::interface::<Request>(), Dependency::of::<Database>()];

        assert_eq!(
            validator.captured_context(Lifetime::ContainerControlled, &dependencies),
            vec![TypeKey::of::<Request>()]
        );
        assert_eq!(
            validator.captured_context(Lifetime::Custom, &dependencies),
            vec![TypeKey::of::<Request>()]
        );
        assert!(validator.captured_context(Lifetime::Unique, &dependencies).is_empty());
        assert!(
            validator
                .captured_context(Lifetime::ResolutionContext, &dependencies)
                .is_empty()
        );
    }

    #[test]
    fn diamond_dependency_ok() {
        //     A
        //    / \
        //   B   C
        //    \ /
        //     D
        struct A;
        struct B;
        struct C;
        struct D;

        let graph = make_graph(vec![
            unique::<D>(vec![]),
            unique::<B>(vec![Dependency::interface::<D>()]),
            unique::<C>(vec![Dependency::interface::<D>()]),
            unique::<A>(vec![Dependency::interface::<B>(), Dependency::interface::<C>()]),
        ]);

        let mut validator = GraphValidator::new(&graph, true);
        assert!(validator.validate().is_ok());
    }
}
