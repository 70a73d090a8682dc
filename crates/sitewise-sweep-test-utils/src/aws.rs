//! AWS test utilities
//!
//! Region detection and unique name prefixes for live SiteWise tests.

use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Get the AWS region for live tests.
///
/// Checks `AWS_REGION`, then `AWS_DEFAULT_REGION`, then falls back to
/// `us-east-1`.
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Generate a unique name prefix for resources created by a test.
///
/// Format: `sweep-test-{timestamp_ms}-{counter}-`. Cleanup runs scoped to this
/// prefix only touch what the test created.
pub fn test_name_prefix() -> String {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("sweep-test-{ts}-{counter}-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_prefix_format() {
        let prefix = test_name_prefix();
        let body = prefix
            .strip_prefix("sweep-test-")
            .and_then(|s| s.strip_suffix('-'))
            .unwrap();
        let parts: Vec<&str> = body.split('-').collect();
        assert_eq!(parts.len(), 2);
        parts[0].parse::<i64>().expect("Should be valid timestamp");
        parts[1].parse::<u32>().expect("Should be valid counter");
    }

    #[test]
    fn test_name_prefix_unique() {
        assert_ne!(test_name_prefix(), test_name_prefix());
    }

    #[test]
    fn test_region_is_never_empty() {
        assert!(!get_test_region().is_empty());
    }
}
