//! Default configuration values shared across sitewise-sweep components

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default interval between describe polls while waiting for a deletion
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default number of resources deleted concurrently within one batch
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default read (list/describe) calls per second
pub const DEFAULT_READ_TPS: u32 = 3;

/// Default write (delete/disassociate) calls per second
pub const DEFAULT_WRITE_TPS: u32 = 2;

/// Application name used for the state directory
pub const APP_NAME: &str = "sitewise-sweep";
