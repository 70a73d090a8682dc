//! Shared fixtures for integration tests
//!
//! Builds [`FakeSiteWise`] scenarios and fast-polling sweep options.

#![allow(dead_code)]

use sitewise_sweep::api::{ModelType, PolicyTarget};
use sitewise_sweep::testing::FakeSiteWise;
use sitewise_sweep::wait::PollConfig;
use sitewise_sweep::SweepOptions;
use std::time::Duration;

/// Poll interval used by tests; sleeps are recorded, never waited on
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sequential, executing options with a short poll interval
pub fn fast_options() -> SweepOptions {
    SweepOptions {
        poll: PollConfig {
            interval: TEST_POLL_INTERVAL,
            max_attempts: None,
        },
        concurrency: 1,
        dry_run: false,
    }
}

/// Same as [`fast_options`] with every poll budget set to `attempts`
pub fn options_with_attempts(attempts: u32) -> SweepOptions {
    let mut options = fast_options();
    options.poll.max_attempts = Some(attempts);
    options
}

/// A small plant: a line model whose hierarchy holds station assets, an
/// interface applied to the line model, a portal with one project, and two
/// time series.
///
/// ```text
/// line (model, applies iface) --h-line-station--> station (model)
///   line-1 --h-line-station--> station-1, station-2
/// portal-1 -> project-1 -> dash-1
///          -> policy-portal   project-1 -> policy-project
/// /plant/line-1/temp (owned by line-1), /plant/orphan
/// ```
pub fn plant() -> FakeSiteWise {
    let fake = FakeSiteWise::new();
    fake.add_model("line", "line", ModelType::AssetModel)
        .add_model("station", "station", ModelType::AssetModel)
        .add_model("iface", "iface", ModelType::Interface)
        .add_hierarchy("line", "h-line-station", "station")
        .apply_interface("line", "iface")
        .add_asset("line-1", "Line 1", "line")
        .add_asset("station-1", "Station 1", "station")
        .add_asset("station-2", "Station 2", "station")
        .associate("line-1", "h-line-station", "station-1")
        .associate("line-1", "h-line-station", "station-2")
        .add_portal("portal-1", "Plant portal")
        .add_project("project-1", "Plant project", "portal-1")
        .add_dashboard("dash-1", "Overview", "project-1")
        .add_access_policy("policy-portal", PolicyTarget::Portal("portal-1".into()))
        .add_access_policy("policy-project", PolicyTarget::Project("project-1".into()))
        .add_time_series("/plant/line-1/temp", Some("line-1"))
        .add_time_series("/plant/orphan", None);
    fake
}

/// Every resource id in [`plant`]
pub const PLANT_IDS: &[&str] = &[
    "line",
    "station",
    "iface",
    "line-1",
    "station-1",
    "station-2",
    "portal-1",
    "project-1",
    "dash-1",
    "policy-portal",
    "policy-project",
    "/plant/line-1/temp",
    "/plant/orphan",
];

/// Position of `id` in the deletion order, panicking if it was never deleted
pub fn position(deleted: &[String], id: &str) -> usize {
    deleted
        .iter()
        .position(|d| d == id)
        .unwrap_or_else(|| panic!("{id} was not deleted; deleted: {deleted:?}"))
}
