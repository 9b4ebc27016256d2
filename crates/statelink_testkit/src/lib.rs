//! # statelink testkit
//!
//! Test utilities for statelink.
//!
//! This crate provides:
//! - Fixture reducers and primary store helpers
//! - An in-memory hub linking a primary to replica sessions
//! - Property-based test generators for state trees using proptest
//! - Wire-compatibility test vectors
//! - Stress helpers for concurrent dispatch and reconnect churn
//!
//! ## Usage
//!
//! ```rust,ignore
//! use statelink_testkit::prelude::*;
//!
//! #[test]
//! fn replica_follows_primary() {
//!     let primary = counter_primary();
//!     let hub = MemoryHub::new(primary.clone());
//!     let mut replicas = vec![TestReplica::start(&hub)];
//!     settle(&hub, &mut replicas);
//!     // ... dispatch on the primary, settle again, compare trees
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod memory;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::memory::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use memory::*;
pub use stress::*;
pub use vectors::*;
