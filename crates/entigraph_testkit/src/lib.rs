//! # Entigraph Testkit
//!
//! Test utilities for entigraph.
//!
//! This crate provides:
//! - A mapped order domain with a seeded in-memory persistence source
//! - Recording listeners and counting or failing lazy loaders
//! - Property-based generators for relation operations
//! - Scenario helpers checking the bidirectional invariant
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entigraph_testkit::prelude::*;
//!
//! #[test]
//! fn orders_of_customer() {
//!     let domain = TestDomain::seeded();
//!     let mut tx = domain.transaction();
//!     let orders = tx.related_objects(&domain.customer1, "Orders").unwrap();
//!     assert_eq!(orders.len(), 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod listeners;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::listeners::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use listeners::*;
pub use logging::init_test_tracing;
