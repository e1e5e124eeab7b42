//! Core container implementation for quickwire.
//!
//! Registrations map a [`TypeKey`] to a lifetime manager and an optional
//! factory; the engine resolves requests against them, constructing
//! dependencies recursively and caching per lifetime.

pub mod container;
pub mod engine;
pub mod error;
pub mod factory;
mod graph;
pub mod instance;
pub mod key;
pub mod lifetime;
pub mod module;
mod recovery;
pub mod registry;

pub use container::{Container, ContainerSettings, prelude};
pub use engine::ContextValues;
pub use error::{BoxError, QuickwireError, Result};
pub use factory::{Dependency, Factory, Injectable, Resolved};
pub use instance::Instance;
pub use key::TypeKey;
pub use lifetime::{Lifetime, LifetimeManager};
pub use module::Module;
pub use registry::SealState;
