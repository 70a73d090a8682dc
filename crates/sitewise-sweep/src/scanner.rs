//! Resource enumeration
//!
//! Walks the SiteWise resource tree (models, assets, hierarchy links, portals,
//! projects, dashboards, access policies, time series) and collects an
//! [`Inventory`] for the graph builder. Read-only.

use crate::api::{
    AssetModelDescriptor, AssociationRecord, Descriptor, Listing, PolicyTarget, ResourceApi,
    ResourceNode, Summary,
};
use crate::error::ApiError;
use futures::stream::{self, Stream, TryStreamExt};
use serde::Serialize;
use sitewise_sweep_common::ResourceKind;
use std::collections::HashSet;
use tracing::{debug, info};

/// Which resource families a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupScope {
    pub asset_models: bool,
    pub portals: bool,
    pub time_series: bool,
    /// Only root resources whose name (alias for time series) starts with this
    pub name_prefix: Option<String>,
}

impl Default for CleanupScope {
    fn default() -> Self {
        Self {
            asset_models: true,
            portals: true,
            time_series: true,
            name_prefix: None,
        }
    }
}

impl CleanupScope {
    fn matches(&self, name: &str) -> bool {
        self.name_prefix
            .as_deref()
            .is_none_or(|prefix| name.starts_with(prefix))
    }
}

/// A node and the resource it hangs off, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub node: ResourceNode,
    /// Model of an asset, portal of a project, project of a dashboard,
    /// portal or project of an access policy, asset of a time series
    pub parent: Option<String>,
}

impl InventoryEntry {
    pub fn root(node: ResourceNode) -> Self {
        Self { node, parent: None }
    }

    pub fn owned(node: ResourceNode, parent: impl Into<String>) -> Self {
        Self {
            node,
            parent: Some(parent.into()),
        }
    }
}

/// Everything found by one scan
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub models: Vec<AssetModelDescriptor>,
    pub assets: Vec<InventoryEntry>,
    pub portals: Vec<InventoryEntry>,
    pub projects: Vec<InventoryEntry>,
    pub dashboards: Vec<InventoryEntry>,
    pub access_policies: Vec<InventoryEntry>,
    pub time_series: Vec<InventoryEntry>,
    pub associations: Vec<AssociationRecord>,
}

impl Inventory {
    /// Every resource node, models first
    pub fn nodes(&self) -> impl Iterator<Item = ResourceNode> + '_ {
        let models = self
            .models
            .iter()
            .map(|m| ResourceNode::new(&m.id, &m.name, m.kind()));
        let owned = self
            .assets
            .iter()
            .chain(&self.portals)
            .chain(&self.projects)
            .chain(&self.dashboards)
            .chain(&self.access_policies)
            .chain(&self.time_series)
            .map(|e| e.node.clone());
        models.chain(owned)
    }

    pub fn len(&self) -> usize {
        self.models.len()
            + self.assets.len()
            + self.portals.len()
            + self.projects.len()
            + self.dashboards.len()
            + self.access_policies.len()
            + self.time_series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Node counts per kind, in kind order
    pub fn counts(&self) -> Vec<(ResourceKind, usize)> {
        ResourceKind::ALL
            .iter()
            .map(|&kind| (kind, self.nodes().filter(|n| n.kind == kind).count()))
            .collect()
    }
}

/// Lazily follow continuation tokens for `listing`.
///
/// A not-found response ends the stream: the parent vanished while we walked
/// it, so it has no children left.
pub fn paginate<'a, A: ResourceApi>(
    api: &'a A,
    listing: Listing,
) -> impl Stream<Item = Result<Summary, ApiError>> + Send + 'a {
    stream::try_unfold(Some(None::<String>), move |token| {
        let listing = listing.clone();
        async move {
            let Some(token) = token else {
                return Ok(None);
            };
            match api.list(&listing, token.as_deref()).await {
                Ok(page) => {
                    let next = page.next_token.filter(|t| !t.is_empty()).map(Some);
                    Ok(Some((page.items, next)))
                }
                Err(e) if e.is_not_found() => {
                    debug!(?listing, "Listing parent no longer exists");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
}

/// Collects an [`Inventory`] through a [`ResourceApi`]
pub struct ResourceScanner<A> {
    api: A,
}

impl<A: ResourceApi> ResourceScanner<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    async fn collect(&self, listing: Listing) -> Result<Vec<Summary>, ApiError> {
        paginate(&self.api, listing).try_collect().await
    }

    /// Enumerate every in-scope resource
    pub async fn scan(&self, scope: &CleanupScope) -> Result<Inventory, ApiError> {
        let mut inventory = Inventory::default();

        if scope.asset_models {
            self.scan_models(scope, &mut inventory).await?;
        }
        if scope.portals {
            self.scan_portals(scope, &mut inventory).await?;
        }
        if scope.time_series {
            self.scan_time_series(scope, &mut inventory).await?;
        }

        info!(
            models = inventory.models.len(),
            assets = inventory.assets.len(),
            associations = inventory.associations.len(),
            portals = inventory.portals.len(),
            projects = inventory.projects.len(),
            dashboards = inventory.dashboards.len(),
            access_policies = inventory.access_policies.len(),
            time_series = inventory.time_series.len(),
            "Scan complete"
        );
        Ok(inventory)
    }

    async fn scan_models(&self, scope: &CleanupScope, inventory: &mut Inventory) -> Result<(), ApiError> {
        for summary in self.collect(Listing::AssetModels).await? {
            if !scope.matches(&summary.name) {
                continue;
            }
            let model = match self.api.describe(ResourceKind::AssetModel, &summary.id).await {
                Ok(Descriptor::AssetModel(model)) => model,
                Ok(other) => return Err(unexpected(ResourceKind::AssetModel, &summary.id, &other)),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            debug!(id = %model.id, kind = %model.kind(), hierarchies = model.hierarchies.len(), "Found model");
            inventory.models.push(model);
        }

        for model in &inventory.models {
            if model.kind() == ResourceKind::InterfaceModel {
                continue;
            }
            let assets = self
                .collect(Listing::Assets {
                    asset_model_id: model.id.clone(),
                })
                .await?;

            for asset in assets {
                for hierarchy in &model.hierarchies {
                    let children = self
                        .collect(Listing::ChildAssets {
                            asset_id: asset.id.clone(),
                            hierarchy_id: hierarchy.id.clone(),
                        })
                        .await?;
                    inventory.associations.extend(
                        children
                            .into_iter()
                            .map(|child| AssociationRecord::new(&asset.id, &hierarchy.id, child.id)),
                    );
                }
                inventory.assets.push(InventoryEntry::owned(
                    ResourceNode::new(asset.id, asset.name, ResourceKind::Asset),
                    &model.id,
                ));
            }
        }

        // Without a prefix every parent asset was walked above
        if scope.name_prefix.is_some() {
            self.scan_outside_parents(inventory).await?;
        }
        Ok(())
    }

    /// Find links from parent assets outside the scan to scanned assets.
    async fn scan_outside_parents(&self, inventory: &mut Inventory) -> Result<(), ApiError> {
        let scanned: HashSet<String> = inventory.assets.iter().map(|e| e.node.id.clone()).collect();
        let mut found = Vec::new();

        for entry in &inventory.assets {
            let Some(child_model) = entry.parent.as_deref() else {
                continue;
            };
            let parents = self
                .collect(Listing::ParentAssets {
                    asset_id: entry.node.id.clone(),
                })
                .await?;
            for parent in parents.into_iter().filter(|p| !scanned.contains(&p.id)) {
                for hierarchy_id in self.linking_hierarchies(&parent.id, child_model).await? {
                    let children = self
                        .collect(Listing::ChildAssets {
                            asset_id: parent.id.clone(),
                            hierarchy_id: hierarchy_id.clone(),
                        })
                        .await?;
                    if children.iter().any(|c| c.id == entry.node.id) {
                        debug!(parent = %parent.id, child = %entry.node.id, "Found link from unscanned parent");
                        found.push(AssociationRecord::new(&parent.id, hierarchy_id, &entry.node.id));
                    }
                }
            }
        }

        inventory.associations.extend(found);
        Ok(())
    }

    /// Hierarchies of `parent_id`'s model that hold assets of `child_model`
    async fn linking_hierarchies(&self, parent_id: &str, child_model: &str) -> Result<Vec<String>, ApiError> {
        let model_id = match self.api.describe(ResourceKind::Asset, parent_id).await {
            Ok(Descriptor::Asset { model_id, .. }) => model_id,
            Ok(other) => return Err(unexpected(ResourceKind::Asset, parent_id, &other)),
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let model = match self.api.describe(ResourceKind::AssetModel, &model_id).await {
            Ok(Descriptor::AssetModel(model)) => model,
            Ok(other) => return Err(unexpected(ResourceKind::AssetModel, &model_id, &other)),
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(model
            .hierarchies
            .into_iter()
            .filter(|h| h.child_model_id == child_model)
            .map(|h| h.id)
            .collect())
    }

    async fn scan_portals(&self, scope: &CleanupScope, inventory: &mut Inventory) -> Result<(), ApiError> {
        for portal in self.collect(Listing::Portals).await? {
            if !scope.matches(&portal.name) {
                continue;
            }

            for project in self
                .collect(Listing::Projects {
                    portal_id: portal.id.clone(),
                })
                .await?
            {
                for dashboard in self
                    .collect(Listing::Dashboards {
                        project_id: project.id.clone(),
                    })
                    .await?
                {
                    inventory.dashboards.push(InventoryEntry::owned(
                        ResourceNode::new(dashboard.id, dashboard.name, ResourceKind::Dashboard),
                        &project.id,
                    ));
                }
                self.scan_policies(PolicyTarget::Project(project.id.clone()), inventory)
                    .await?;
                inventory.projects.push(InventoryEntry::owned(
                    ResourceNode::new(project.id, project.name, ResourceKind::Project),
                    &portal.id,
                ));
            }

            self.scan_policies(PolicyTarget::Portal(portal.id.clone()), inventory)
                .await?;
            inventory.portals.push(InventoryEntry::root(ResourceNode::new(
                portal.id,
                portal.name,
                ResourceKind::Portal,
            )));
        }
        Ok(())
    }

    async fn scan_policies(&self, target: PolicyTarget, inventory: &mut Inventory) -> Result<(), ApiError> {
        let parent = match &target {
            PolicyTarget::Portal(id) | PolicyTarget::Project(id) => id.clone(),
        };
        for policy in self.collect(Listing::AccessPolicies { target }).await? {
            inventory.access_policies.push(InventoryEntry::owned(
                ResourceNode::new(policy.id, policy.name, ResourceKind::AccessPolicy),
                &parent,
            ));
        }
        Ok(())
    }

    async fn scan_time_series(&self, scope: &CleanupScope, inventory: &mut Inventory) -> Result<(), ApiError> {
        for series in self.collect(Listing::TimeSeries).await? {
            if !scope.matches(&series.id) {
                continue;
            }
            let node = ResourceNode::new(&series.id, series.name, ResourceKind::TimeSeries);
            inventory.time_series.push(InventoryEntry {
                node,
                parent: series.owner,
            });
        }
        Ok(())
    }
}

fn unexpected(kind: ResourceKind, id: &str, descriptor: &Descriptor) -> ApiError {
    ApiError::Service {
        code: "UnexpectedDescriptor".to_string(),
        message: format!("describe {kind} {id} returned {descriptor:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_filters_roots() {
        let scope = CleanupScope {
            name_prefix: Some("test-".into()),
            ..CleanupScope::default()
        };
        assert!(scope.matches("test-model"));
        assert!(!scope.matches("prod-model"));
        assert!(CleanupScope::default().matches("anything"));
    }

    #[test]
    fn inventory_counts_by_kind() {
        let inventory = Inventory {
            assets: vec![
                InventoryEntry::owned(ResourceNode::new("a1", "a1", ResourceKind::Asset), "m"),
                InventoryEntry::owned(ResourceNode::new("a2", "a2", ResourceKind::Asset), "m"),
            ],
            portals: vec![InventoryEntry::root(ResourceNode::new("p", "p", ResourceKind::Portal))],
            ..Inventory::default()
        };
        assert_eq!(inventory.len(), 3);
        let counts = inventory.counts();
        assert!(counts.contains(&(ResourceKind::Asset, 2)));
        assert!(counts.contains(&(ResourceKind::Portal, 1)));
        assert!(counts.contains(&(ResourceKind::Dashboard, 0)));
    }
}
