//! In-memory SiteWise stand-in for tests
//!
//! [`FakeSiteWise`] keeps resources, listings and hierarchy links in memory and
//! mimics the service's asynchronous deletion: a deleted resource keeps
//! describing as `DELETING` for a configurable number of polls. It refuses to
//! delete resources that still have dependents, so an out-of-order cleanup
//! shows up as failures.

use crate::api::{
    AssetModelDescriptor, AssociationRecord, Descriptor, Listing, ModelHierarchy, ModelType, Page,
    PolicyTarget, ResourceApi, STATUS_FAILED, Summary,
};
use crate::error::ApiError;
use crate::wait::Sleeper;
use sitewise_sweep_common::ResourceKind;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Status a fake resource reports while its deletion is in progress
pub const STATUS_DELETING: &str = "DELETING";

/// Which API operation an injected error applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    List,
    Describe,
    Delete,
    Disassociate,
}

/// One recorded API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    List(Listing, Option<String>),
    Describe(ResourceKind, String),
    Delete(ResourceKind, String),
    Disassociate(AssociationRecord),
}

#[derive(Debug)]
struct FakeEntry {
    descriptor: Descriptor,
    /// Resource that cannot be deleted while this one exists
    parent: Option<String>,
    listed_in: Vec<Listing>,
    /// Remaining `DELETING` describes once deletion was accepted
    deleting: Option<u32>,
}

#[derive(Debug, Default)]
struct FakeState {
    resources: BTreeMap<String, FakeEntry>,
    listings: HashMap<Listing, Vec<Summary>>,
    associations: BTreeSet<AssociationRecord>,
    latency: HashMap<String, u32>,
    stuck: HashSet<String>,
    failing: HashSet<String>,
    errors: HashMap<(FakeOp, String), VecDeque<ApiError>>,
    calls: Vec<FakeCall>,
    deleted: Vec<String>,
    active_deletes: usize,
    max_active_deletes: usize,
    page_size: usize,
}

impl FakeState {
    fn take_error(&mut self, op: FakeOp, target: &str) -> Option<ApiError> {
        self.errors
            .get_mut(&(op, target.to_string()))
            .and_then(VecDeque::pop_front)
    }

    fn insert(&mut self, id: &str, name: &str, descriptor: Descriptor, parent: Option<&str>, listing: Option<Listing>) {
        let mut listed_in = Vec::new();
        if let Some(listing) = listing {
            self.list_under(listing.clone(), Summary::new(id, name));
            listed_in.push(listing);
        }
        self.resources.insert(
            id.to_string(),
            FakeEntry {
                descriptor,
                parent: parent.map(str::to_string),
                listed_in,
                deleting: None,
            },
        );
    }

    fn list_under(&mut self, listing: Listing, summary: Summary) {
        self.listings.entry(listing).or_default().push(summary);
    }

    fn blocker_of(&self, id: &str) -> Option<String> {
        if let Some(record) = self.associations.iter().find(|r| r.involves(id)) {
            return Some(format!("association {record}"));
        }
        self.resources
            .iter()
            .find(|(_, entry)| entry.parent.as_deref() == Some(id))
            .map(|(dependent, _)| dependent.clone())
    }

    fn finish_delete(&mut self, id: &str) {
        if let Some(entry) = self.resources.remove(id) {
            for listing in entry.listed_in {
                if let Some(items) = self.listings.get_mut(&listing) {
                    items.retain(|s| s.id != id);
                }
            }
            self.deleted.push(id.to_string());
            self.active_deletes = self.active_deletes.saturating_sub(1);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_status(descriptor: &Descriptor, new_status: &str) -> Descriptor {
    let mut descriptor = descriptor.clone();
    match &mut descriptor {
        Descriptor::AssetModel(model) => model.status = new_status.to_string(),
        Descriptor::Asset { status, .. } | Descriptor::Portal { status, .. } => {
            *status = new_status.to_string()
        }
        _ => {}
    }
    descriptor
}

/// In-memory [`ResourceApi`]
#[derive(Debug)]
pub struct FakeSiteWise {
    state: Mutex<FakeState>,
}

impl Default for FakeSiteWise {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSiteWise {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                page_size: 100,
                ..FakeState::default()
            }),
        }
    }

    /// Maximum items per listing page
    pub fn with_page_size(self, page_size: usize) -> Self {
        lock(&self.state).page_size = page_size.max(1);
        self
    }

    /// Add an asset, component or interface model
    pub fn add_model(&self, id: &str, name: &str, model_type: ModelType) -> &Self {
        let descriptor = Descriptor::AssetModel(AssetModelDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            model_type,
            status: "ACTIVE".to_string(),
            hierarchies: Vec::new(),
            interface_ids: Vec::new(),
        });
        lock(&self.state).insert(id, name, descriptor, None, Some(Listing::AssetModels));
        self
    }

    /// Declare a hierarchy slot on `model_id` holding `child_model_id` assets
    pub fn add_hierarchy(&self, model_id: &str, hierarchy_id: &str, child_model_id: &str) -> &Self {
        let mut state = lock(&self.state);
        if let Some(FakeEntry {
            descriptor: Descriptor::AssetModel(model),
            ..
        }) = state.resources.get_mut(model_id)
        {
            model.hierarchies.push(ModelHierarchy {
                id: hierarchy_id.to_string(),
                name: hierarchy_id.to_string(),
                child_model_id: child_model_id.to_string(),
            });
        }
        drop(state);
        self
    }

    /// Apply interface model `interface_id` to `model_id`
    pub fn apply_interface(&self, model_id: &str, interface_id: &str) -> &Self {
        let mut state = lock(&self.state);
        if let Some(FakeEntry {
            descriptor: Descriptor::AssetModel(model),
            ..
        }) = state.resources.get_mut(model_id)
        {
            model.interface_ids.push(interface_id.to_string());
        }
        drop(state);
        self
    }

    pub fn add_asset(&self, id: &str, name: &str, model_id: &str) -> &Self {
        let descriptor = Descriptor::Asset {
            id: id.to_string(),
            name: name.to_string(),
            model_id: model_id.to_string(),
            status: "ACTIVE".to_string(),
        };
        let listing = Listing::Assets {
            asset_model_id: model_id.to_string(),
        };
        lock(&self.state).insert(id, name, descriptor, Some(model_id), Some(listing));
        self
    }

    /// Link `child_id` under `parent_id` through `hierarchy_id`
    pub fn associate(&self, parent_id: &str, hierarchy_id: &str, child_id: &str) -> &Self {
        let mut state = lock(&self.state);
        state.list_under(
            Listing::ChildAssets {
                asset_id: parent_id.to_string(),
                hierarchy_id: hierarchy_id.to_string(),
            },
            Summary::new(child_id, child_id),
        );
        state.list_under(
            Listing::ParentAssets {
                asset_id: child_id.to_string(),
            },
            Summary::new(parent_id, parent_id),
        );
        state
            .associations
            .insert(AssociationRecord::new(parent_id, hierarchy_id, child_id));
        drop(state);
        self
    }

    /// Drop a link on the service side while listings still report it
    pub fn expire_association(&self, record: &AssociationRecord) -> &Self {
        lock(&self.state).associations.remove(record);
        self
    }

    pub fn add_portal(&self, id: &str, name: &str) -> &Self {
        let descriptor = Descriptor::Portal {
            id: id.to_string(),
            name: name.to_string(),
            status: "ACTIVE".to_string(),
        };
        lock(&self.state).insert(id, name, descriptor, None, Some(Listing::Portals));
        self
    }

    pub fn add_project(&self, id: &str, name: &str, portal_id: &str) -> &Self {
        let descriptor = Descriptor::Project {
            id: id.to_string(),
            name: name.to_string(),
            portal_id: portal_id.to_string(),
        };
        let listing = Listing::Projects {
            portal_id: portal_id.to_string(),
        };
        lock(&self.state).insert(id, name, descriptor, Some(portal_id), Some(listing));
        self
    }

    pub fn add_dashboard(&self, id: &str, name: &str, project_id: &str) -> &Self {
        let descriptor = Descriptor::Dashboard {
            id: id.to_string(),
            name: name.to_string(),
            project_id: project_id.to_string(),
        };
        let listing = Listing::Dashboards {
            project_id: project_id.to_string(),
        };
        lock(&self.state).insert(id, name, descriptor, Some(project_id), Some(listing));
        self
    }

    pub fn add_access_policy(&self, id: &str, target: PolicyTarget) -> &Self {
        let parent = match &target {
            PolicyTarget::Portal(id) | PolicyTarget::Project(id) => id.clone(),
        };
        let descriptor = Descriptor::AccessPolicy { id: id.to_string() };
        let listing = Listing::AccessPolicies { target };
        lock(&self.state).insert(id, id, descriptor, Some(&parent), Some(listing));
        self
    }

    /// Add a time series addressed by `alias`, optionally bound to an asset
    pub fn add_time_series(&self, alias: &str, asset_id: Option<&str>) -> &Self {
        let descriptor = Descriptor::TimeSeries {
            alias: alias.to_string(),
            asset_id: asset_id.map(str::to_string),
        };
        let mut state = lock(&self.state);
        state.insert(alias, alias, descriptor, None, None);
        let summary = match asset_id {
            Some(asset_id) => Summary::new(alias, alias).with_owner(asset_id),
            None => Summary::new(alias, alias),
        };
        state.list_under(Listing::TimeSeries, summary);
        if let Some(entry) = state.resources.get_mut(alias) {
            entry.listed_in.push(Listing::TimeSeries);
        }
        drop(state);
        self
    }

    /// Keep `id` describing as `DELETING` for `polls` describes after deletion
    pub fn set_latency(&self, id: &str, polls: u32) -> &Self {
        lock(&self.state).latency.insert(id.to_string(), polls);
        self
    }

    /// Never finish deleting `id`
    pub fn set_stuck(&self, id: &str) -> &Self {
        lock(&self.state).stuck.insert(id.to_string());
        self
    }

    /// Report `FAILED` instead of finishing once deletion of `id` starts
    pub fn set_deletion_failed(&self, id: &str) -> &Self {
        lock(&self.state).failing.insert(id.to_string());
        self
    }

    /// Fail the next `op` on `target` with `error`.
    ///
    /// `target` is the resource id, the association's store key, or for
    /// listings the `Debug` rendering of the [`Listing`].
    pub fn fail_next(&self, op: FakeOp, target: &str, error: ApiError) -> &Self {
        lock(&self.state)
            .errors
            .entry((op, target.to_string()))
            .or_default()
            .push_back(error);
        self
    }

    /// Fail the next page request of `listing` with `error`
    pub fn fail_listing(&self, listing: &Listing, error: ApiError) -> &Self {
        self.fail_next(FakeOp::List, &format!("{listing:?}"), error)
    }

    pub fn exists(&self, id: &str) -> bool {
        lock(&self.state).resources.contains_key(id)
    }

    pub fn is_associated(&self, record: &AssociationRecord) -> bool {
        lock(&self.state).associations.contains(record)
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        lock(&self.state).calls.clone()
    }

    /// Ids in the order their deletion completed
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.state).deleted.clone()
    }

    /// Delete calls issued, by id
    pub fn delete_calls(&self) -> Vec<String> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                FakeCall::Delete(_, id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Highest number of deletions in progress at the same time
    pub fn max_concurrent_deletes(&self) -> usize {
        lock(&self.state).max_active_deletes
    }

    fn record(&self, call: FakeCall) {
        lock(&self.state).calls.push(call);
    }

    fn list_now(&self, listing: &Listing, next_token: Option<&str>) -> Result<Page, ApiError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.take_error(FakeOp::List, &format!("{listing:?}")) {
            return Err(err);
        }

        let items = state.listings.get(listing).cloned().unwrap_or_default();
        let offset = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| ApiError::Service {
                code: "InvalidRequestException".to_string(),
                message: format!("bad next token {token}"),
            })?,
            None => 0,
        };
        let end = (offset + state.page_size).min(items.len());
        let page_items = items.get(offset..end).map(<[Summary]>::to_vec).unwrap_or_default();
        let next_token = (end < items.len()).then(|| end.to_string());

        Ok(Page {
            items: page_items,
            next_token,
        })
    }

    fn describe_now(&self, kind: ResourceKind, id: &str) -> Result<Descriptor, ApiError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.take_error(FakeOp::Describe, id) {
            return Err(err);
        }

        let stuck = state.stuck.contains(id);
        let failing = state.failing.contains(id);
        let Some(entry) = state.resources.get_mut(id) else {
            return Err(ApiError::not_found(format!("{kind} {id}")));
        };
        let deleting = entry.deleting;
        match deleting {
            None => Ok(entry.descriptor.clone()),
            Some(_) if failing => Ok(with_status(&entry.descriptor, STATUS_FAILED)),
            Some(_) if stuck => Ok(with_status(&entry.descriptor, STATUS_DELETING)),
            Some(0) => {
                state.finish_delete(id);
                Err(ApiError::not_found(format!("{kind} {id}")))
            }
            Some(remaining) => {
                entry.deleting = Some(remaining - 1);
                Ok(with_status(&entry.descriptor, STATUS_DELETING))
            }
        }
    }

    fn delete_now(&self, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.take_error(FakeOp::Delete, id) {
            return Err(err);
        }

        if !state.resources.contains_key(id) {
            return Err(ApiError::not_found(format!("{kind} {id}")));
        }
        if let Some(blocker) = state.blocker_of(id) {
            return Err(ApiError::Service {
                code: "InvalidRequestException".to_string(),
                message: format!("{kind} {id} is still referenced by {blocker}"),
            });
        }

        let latency = state.latency.get(id).copied().unwrap_or(0);
        let newly_deleting = match state.resources.get_mut(id) {
            Some(entry) if entry.deleting.is_none() => {
                entry.deleting = Some(latency);
                true
            }
            _ => false,
        };
        if newly_deleting {
            state.active_deletes += 1;
            state.max_active_deletes = state.max_active_deletes.max(state.active_deletes);
        }
        Ok(())
    }

    fn disassociate_now(&self, record: &AssociationRecord) -> Result<(), ApiError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.take_error(FakeOp::Disassociate, &record.store_key()) {
            return Err(err);
        }

        if !state.associations.remove(record) {
            return Err(ApiError::not_found(format!("association {record}")));
        }
        let listing = Listing::ChildAssets {
            asset_id: record.parent_id.clone(),
            hierarchy_id: record.hierarchy_id.clone(),
        };
        if let Some(items) = state.listings.get_mut(&listing) {
            items.retain(|s| s.id != record.child_id);
        }
        let listing = Listing::ParentAssets {
            asset_id: record.child_id.clone(),
        };
        if let Some(items) = state.listings.get_mut(&listing) {
            items.retain(|s| s.id != record.parent_id);
        }
        Ok(())
    }
}

impl ResourceApi for FakeSiteWise {
    async fn list(&self, listing: &Listing, next_token: Option<&str>) -> Result<Page, ApiError> {
        self.record(FakeCall::List(listing.clone(), next_token.map(str::to_string)));
        tokio::task::yield_now().await;
        self.list_now(listing, next_token)
    }

    async fn describe(&self, kind: ResourceKind, id: &str) -> Result<Descriptor, ApiError> {
        self.record(FakeCall::Describe(kind, id.to_string()));
        tokio::task::yield_now().await;
        self.describe_now(kind, id)
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        self.record(FakeCall::Delete(kind, id.to_string()));
        tokio::task::yield_now().await;
        self.delete_now(kind, id)
    }

    async fn disassociate(&self, record: &AssociationRecord) -> Result<(), ApiError> {
        self.record(FakeCall::Disassociate(record.clone()));
        tokio::task::yield_now().await;
        self.disassociate_now(record)
    }
}

/// Sleeper that returns immediately and records requested delays
#[derive(Debug, Default)]
pub struct InstantSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        tokio::task::yield_now().await;
    }
}
