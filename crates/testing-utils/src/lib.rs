//! # Routing Testing Utils
//!
//! Shared testing utilities for the dispatch router workspace.
//!
//! - **Mock Repositories**: in-memory `OrderRepository` and `BranchDirectory`
//!   with failure and conflict injection
//! - **Mock Notifier**: records every published branch event
//! - **Mock Message Queue**: records acks/nacks, publish failure injection
//! - **Test Data Builders**: orders and branches with sensible defaults
//! - **Helpers**: polling waits and geo fixtures
//!
//! ```toml
//! [dev-dependencies]
//! routing-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
