//! Client-side rate limiting for SiteWise calls
//!
//! SiteWise control-plane APIs have low per-account TPS limits. Reads
//! (list/describe) and writes (delete/disassociate) draw from separate
//! `governor` buckets.

use crate::api::{AssociationRecord, Descriptor, Listing, Page, ResourceApi};
use crate::error::ApiError;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use sitewise_sweep_common::ResourceKind;
use sitewise_sweep_common::defaults::{DEFAULT_READ_TPS, DEFAULT_WRITE_TPS};
use std::num::NonZeroU32;
use std::sync::Arc;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Requests per second for each bucket. Zero disables that bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub read_tps: u32,
    pub write_tps: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_tps: DEFAULT_READ_TPS,
            write_tps: DEFAULT_WRITE_TPS,
        }
    }
}

fn limiter(tps: u32) -> Option<Arc<Limiter>> {
    NonZeroU32::new(tps).map(|tps| Arc::new(RateLimiter::direct(Quota::per_second(tps))))
}

/// [`ResourceApi`] wrapper that waits for a rate-limit permit before each call
pub struct RateLimitedApi<A> {
    inner: A,
    reads: Option<Arc<Limiter>>,
    writes: Option<Arc<Limiter>>,
}

impl<A> RateLimitedApi<A> {
    pub fn new(inner: A, config: RateLimitConfig) -> Self {
        Self {
            inner,
            reads: limiter(config.read_tps),
            writes: limiter(config.write_tps),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

async fn acquire(limiter: &Option<Arc<Limiter>>) {
    if let Some(limiter) = limiter {
        limiter.until_ready().await;
    }
}

impl<A: ResourceApi> ResourceApi for RateLimitedApi<A> {
    async fn list(&self, listing: &Listing, next_token: Option<&str>) -> Result<Page, ApiError> {
        acquire(&self.reads).await;
        self.inner.list(listing, next_token).await
    }

    async fn describe(&self, kind: ResourceKind, id: &str) -> Result<Descriptor, ApiError> {
        acquire(&self.reads).await;
        self.inner.describe(kind, id).await
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        acquire(&self.writes).await;
        self.inner.delete(kind, id).await
    }

    async fn disassociate(&self, record: &AssociationRecord) -> Result<(), ApiError> {
        acquire(&self.writes).await;
        self.inner.disassociate(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tps_disables_bucket() {
        assert!(limiter(0).is_none());
        assert!(limiter(3).is_some());
    }

    #[test]
    fn buckets_are_independent() {
        let api = RateLimitedApi::new(
            (),
            RateLimitConfig {
                read_tps: 1,
                write_tps: 1,
            },
        );
        let (Some(reads), Some(writes)) = (&api.reads, &api.writes) else {
            panic!("both buckets configured");
        };
        assert!(reads.check().is_ok());
        assert!(reads.check().is_err());
        assert!(writes.check().is_ok());
    }
}
