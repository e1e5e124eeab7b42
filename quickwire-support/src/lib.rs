//! # Quickwire Support
//!
//! Shared utilities for the quickwire crates:
//! - Text rendering for error messages
//! - `tracing` subscriber setup for binaries and tests

pub mod logging;
pub mod rendering;
