//! Shared test utilities for sitewise-sweep
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection and unique test name prefixes
//! - [`db`]: In-memory SQLite pools

pub mod aws;
pub mod db;

pub use aws::{get_test_region, test_name_prefix};
pub use db::open_test_db;
