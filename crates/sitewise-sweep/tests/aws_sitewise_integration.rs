//! SiteWise integration tests - actually call AWS APIs
//!
//! These tests are marked `#[ignore]` and only run with:
//! ```
//! AWS_PROFILE=your_profile cargo test --test aws_sitewise_integration -- --ignored
//! ```
//!
//! They scope every run to a fresh name prefix, so nothing outside the test is
//! touched.

use sitewise_sweep::api::{Listing, ResourceApi};
use sitewise_sweep::aws::{AwsContext, FromAwsContext, SiteWiseClient};
use sitewise_sweep::rate_limit::{RateLimitConfig, RateLimitedApi};
use sitewise_sweep::state::MemoryRecordStore;
use sitewise_sweep::wait::TokioSleeper;
use sitewise_sweep::{CleanupScope, SweepOptions, Sweeper};
use sitewise_sweep_common::ResourceKind;
use sitewise_sweep_test_utils::{get_test_region, test_name_prefix};

/// A unique prefix matches nothing, so the plan is empty
#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_plan_for_unused_prefix_is_empty() {
    let region = get_test_region();
    let client = SiteWiseClient::new(&region, None).await;
    let api = RateLimitedApi::new(client, RateLimitConfig::default());
    let sweeper = Sweeper::new(
        api,
        TokioSleeper,
        MemoryRecordStore::new(),
        SweepOptions::default(),
    );
    let scope = CleanupScope {
        name_prefix: Some(test_name_prefix()),
        ..CleanupScope::default()
    };

    let plan = sweeper.plan(&scope).await.expect("AWS credentials required");

    assert!(plan.inventory.is_empty());
    assert!(plan.batches.is_empty());
}

/// Deleting and describing a resource that never existed both say not-found
#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_missing_resource_is_not_found() {
    let ctx = AwsContext::new(&get_test_region()).await;
    let client = SiteWiseClient::from_context(&ctx);
    let missing = "00000000-0000-0000-0000-000000000000";

    let err = client
        .describe(ResourceKind::Portal, missing)
        .await
        .expect_err("portal should not exist");
    assert!(err.is_not_found(), "unexpected error: {err}");

    let err = client
        .delete(ResourceKind::Dashboard, missing)
        .await
        .expect_err("dashboard should not exist");
    assert!(err.is_not_found(), "unexpected error: {err}");
}

/// Listing models pages through the real API without error
#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_list_asset_models() {
    let client = SiteWiseClient::new(&get_test_region(), None).await;

    let page = client
        .list(&Listing::AssetModels, None)
        .await
        .expect("list asset models");
    assert!(page.next_token.as_deref() != Some(""));
}
