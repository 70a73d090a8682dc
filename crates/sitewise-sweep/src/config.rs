//! Configuration types for a cleanup run

use crate::cleanup::SweepOptions;
use crate::rate_limit::RateLimitConfig;
use crate::scanner::CleanupScope;
use crate::wait::PollConfig;
use sitewise_sweep_common::defaults::{DEFAULT_CONCURRENCY, DEFAULT_REGION};
use std::path::PathBuf;

/// AWS connection settings
#[derive(Debug, Clone)]
pub struct AwsConfig {
    /// AWS region
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            aws_profile: None,
        }
    }
}

/// Runtime behavior flags
#[derive(Debug, Clone)]
pub struct RuntimeFlags {
    /// Plan only, delete nothing
    pub dry_run: bool,
    /// Deletions in flight at once within a batch
    pub concurrency: usize,
    /// Output JSON file path for the run report
    pub output: Option<PathBuf>,
    /// State database path (default under the user data directory)
    pub state_db: Option<PathBuf>,
    /// Keep records in memory only
    pub no_state: bool,
}

impl Default for RuntimeFlags {
    fn default() -> Self {
        Self {
            dry_run: true,
            concurrency: DEFAULT_CONCURRENCY,
            output: None,
            state_db: None,
            no_state: false,
        }
    }
}

/// Configuration for a cleanup run
///
/// Composed of focused sub-configs.
#[derive(Debug, Clone, Default)]
pub struct SweepConfig {
    pub aws: AwsConfig,
    pub scope: CleanupScope,
    pub poll: PollConfig,
    pub rate: RateLimitConfig,
    pub flags: RuntimeFlags,
}

impl SweepConfig {
    pub fn region(&self) -> &str {
        &self.aws.region
    }
    pub fn aws_profile(&self) -> Option<&str> {
        self.aws.aws_profile.as_deref()
    }
    pub fn dry_run(&self) -> bool {
        self.flags.dry_run
    }

    /// Options for the [`Sweeper`](crate::cleanup::Sweeper)
    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            poll: self.poll.clone(),
            concurrency: self.flags.concurrency.max(1),
            dry_run: self.flags.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_a_sequential_dry_run() {
        let config = SweepConfig::default();
        assert!(config.dry_run());
        assert_eq!(config.region(), DEFAULT_REGION);

        let options = config.sweep_options();
        assert!(options.dry_run);
        assert_eq!(options.concurrency, 1);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let mut config = SweepConfig::default();
        config.flags.concurrency = 0;
        assert_eq!(config.sweep_options().concurrency, 1);
    }
}
