//! `tracing` subscriber setup.
//!
//! The container only emits events through `tracing`; installing a
//! subscriber is left to the application. These helpers cover the common
//! cases (binaries and tests) with an `EnvFilter` driven by `RUST_LOG`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "quickwire=info,quickwire_container=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    fmt().with_env_filter(env_filter()).try_init().is_ok()
}

/// Installs a subscriber that writes through the test harness capture.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_for_tests() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_test_init_does_not_panic() {
        init_for_tests();
        init_for_tests();
        tracing::debug!("subscriber installed");
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
