//! Shared test utilities for worksheetgen integration tests.
//!
//! This module provides:
//! - Fakes for every external collaborator of the orchestrator
//! - `TestHarness` wiring the fakes to an in-memory job store
//! - Builders for requests and worksheet specifications

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
