//! # Relay Testkit
//!
//! Test utilities for the session relay.
//!
//! This crate provides:
//! - Session fixtures and hand-built store records, including broken ones
//! - Property-based test generators using proptest
//! - Golden session payload vectors
//! - Stream helpers with timeouts
//! - Tracing setup for tests

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod vectors;

pub use fixtures::*;
pub use generators::*;
pub use logging::init_test_tracing;
pub use vectors::*;
