//! sitewise-sweep-common - Shared types and defaults
//!
//! SDK-free types shared by the cleanup library, its binary and its tests.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`resource_kind`]: Resource kinds and per-kind deletion poll budgets

pub mod defaults;
pub mod resource_kind;

pub use resource_kind::{ResourceKind, UnknownResourceKind};
