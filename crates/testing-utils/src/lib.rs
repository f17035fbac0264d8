//! # Orchestrator Testing Utils
//!
//! Shared testing utilities for the scenario orchestration workspace:
//! failure-injecting store wrappers, task/scenario builders and template
//! fixtures used across the other crates' tests.
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! orchestrator-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use mocks::*;
