//! # quickwire
//!
//! A dependency injection runtime: register types with a lifetime policy,
//! seal the container, then resolve fully constructed object graphs from
//! any thread.
//!
//! ```rust
//! use quickwire::prelude::*;
//! use std::sync::Arc;
//!
//! struct Config {
//!     url: String,
//! }
//!
//! impl Injectable for Config {
//!     fn construct(_: &mut Resolved) -> std::result::Result<Self, BoxError> {
//!         Ok(Config { url: "postgres://localhost".into() })
//!     }
//! }
//!
//! struct Database {
//!     config: Arc<Config>,
//! }
//!
//! impl Injectable for Database {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::of::<Config>()]
//!     }
//!
//!     fn construct(args: &mut Resolved) -> std::result::Result<Self, BoxError> {
//!         Ok(Database { config: args.next()? })
//!     }
//! }
//!
//! let container = Container::new();
//! container.register_singleton::<Config>()?;
//! container.seal()?;
//!
//! let db: Arc<Database> = container.resolve()?;
//! assert_eq!(db.config.url, "postgres://localhost");
//! # Ok::<(), QuickwireError>(())
//! ```

pub use quickwire_container::*;
pub use quickwire_support::*;
