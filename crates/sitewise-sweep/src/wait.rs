//! Poll pacing for asynchronous deletions.
//!
//! SiteWise offers no completion callback for deletes, so the executor polls
//! describe on a fixed interval. The delay schedule comes from
//! `backon::ConstantBuilder`; the actual waiting goes through a [`Sleeper`] so
//! tests can run the bounded-retry logic without wall-clock delays.

use backon::{BackoffBuilder, ConstantBuilder};
use sitewise_sweep_common::ResourceKind;
use sitewise_sweep_common::defaults::DEFAULT_POLL_INTERVAL_MS;
use std::future::Future;
use std::time::Duration;

/// Something that can suspend the current task for a while.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<S: Sleeper> Sleeper for &S {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Production sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Configuration for deletion polling.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between describe calls
    pub interval: Duration,
    /// Overrides every per-kind attempt budget when set
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    /// Attempt budget for a resource kind
    pub fn attempts_for(&self, kind: ResourceKind) -> u32 {
        self.max_attempts.unwrap_or_else(|| kind.poll_attempts())
    }

    /// Delays to sleep between attempts for `kind`.
    ///
    /// Yields one delay fewer than the attempt budget: there is no sleep after
    /// the final attempt.
    pub fn delays(&self, kind: ResourceKind) -> impl Iterator<Item = Duration> + Send + use<> {
        let retries = self.attempts_for(kind).saturating_sub(1) as usize;
        ConstantBuilder::default()
            .with_delay(self.interval)
            .with_max_times(retries)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_match_attempt_budget() {
        let config = PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: Some(4),
        };
        let delays: Vec<_> = config.delays(ResourceKind::Asset).collect();
        assert_eq!(delays, vec![Duration::from_millis(10); 3]);
    }

    #[test]
    fn per_kind_budget_used_without_override() {
        let config = PollConfig::default();
        assert_eq!(config.attempts_for(ResourceKind::Portal), 300);
        assert_eq!(
            config.delays(ResourceKind::Dashboard).count(),
            ResourceKind::Dashboard.poll_attempts() as usize - 1
        );
    }

    #[test]
    fn zero_budget_yields_no_delays() {
        let config = PollConfig {
            interval: Duration::from_secs(1),
            max_attempts: Some(0),
        };
        assert_eq!(config.delays(ResourceKind::Asset).count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_advances_paused_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
