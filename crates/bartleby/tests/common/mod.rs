//! Shared test utilities for bartleby integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring every component against one mock backend
//! - Builders for configurations and file batches

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
