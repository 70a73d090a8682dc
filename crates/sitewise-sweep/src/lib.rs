//! sitewise-sweep - dependency-ordered AWS IoT SiteWise cleanup
//!
//! Enumerates SiteWise resources, orders them so nothing is deleted while
//! another resource still depends on it, and drives each deletion until the
//! service reports it gone.

pub mod api;
pub mod associations;
pub mod aws;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod rate_limit;
pub mod scanner;
pub mod schedule;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wait;

pub use cleanup::{CleanupReport, FailureReason, ResourceFailure, SweepOptions, Sweeper};
pub use error::{ApiError, CleanupError};
pub use scanner::CleanupScope;
