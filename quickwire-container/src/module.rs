//! Modules: groups of related registrations installed together.
//!
//! # Examples
//! ```rust
//! use quickwire_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {}
//! struct SystemClock;
//! impl Clock for SystemClock {}
//!
//! struct TimeModule;
//!
//! impl Module for TimeModule {
//!     fn register(&self, container: &Container) -> Result<()> {
//!         container.register_instance::<dyn Clock>(Arc::new(SystemClock))
//!     }
//! }
//!
//! let container = Container::new();
//! container.install(&TimeModule).unwrap();
//! assert!(container.is_registered::<dyn Clock>());
//! ```

use crate::container::Container;
use crate::error::Result;

/// A set of registrations that belong together.
///
/// Split registrations by concern, one module per subsystem, and install
/// each with [`Container::install`] before sealing.
pub trait Module: Send + Sync {
    /// Registers this module's types into `container`.
    ///
    /// Stops at the first failing registration; earlier ones stay in place.
    fn register(&self, container: &Container) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
