//! Resource management API seam
//!
//! [`ResourceApi`] abstracts the four SiteWise capabilities the cleanup needs
//! (list, describe, delete, disassociate) so the pipeline can run against the
//! real service, a rate-limited wrapper, or an in-memory fake.

use crate::error::ApiError;
use serde::Serialize;
use sitewise_sweep_common::ResourceKind;
use std::fmt;
use std::future::Future;

/// Status reported for resources whose describe call has no status field
pub const STATUS_PRESENT: &str = "PRESENT";

/// Lifecycle status SiteWise reports when an operation on a resource failed
pub const STATUS_FAILED: &str = "FAILED";

/// A resource in the cleanup graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceNode {
    /// Opaque identifier (the alias for time series)
    pub id: String,
    /// Display name
    pub name: String,
    /// Resource kind
    pub kind: ResourceKind,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.name, self.id)
    }
}

/// A live parent -> child asset link
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AssociationRecord {
    pub parent_id: String,
    pub hierarchy_id: String,
    pub child_id: String,
}

impl AssociationRecord {
    pub fn new(
        parent_id: impl Into<String>,
        hierarchy_id: impl Into<String>,
        child_id: impl Into<String>,
    ) -> Self {
        Self {
            parent_id: parent_id.into(),
            hierarchy_id: hierarchy_id.into(),
            child_id: child_id.into(),
        }
    }

    /// Whether either endpoint of the link is `asset_id`
    pub fn involves(&self, asset_id: &str) -> bool {
        self.parent_id == asset_id || self.child_id == asset_id
    }

    /// Record store key for this association
    pub fn store_key(&self) -> String {
        format!(
            "association/{}/{}/{}",
            self.parent_id, self.hierarchy_id, self.child_id
        )
    }
}

impl fmt::Display for AssociationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -[{}]-> {}",
            self.parent_id, self.hierarchy_id, self.child_id
        )
    }
}

/// Target of an access policy listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyTarget {
    Portal(String),
    Project(String),
}

/// A paginated listing, optionally scoped to a parent resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Listing {
    /// Asset, component and interface models
    AssetModels,
    /// Assets created from a model
    Assets { asset_model_id: String },
    /// Children of an asset under one hierarchy
    ChildAssets {
        asset_id: String,
        hierarchy_id: String,
    },
    /// Parent of an asset, whichever hierarchy links it
    ParentAssets { asset_id: String },
    Portals,
    Projects { portal_id: String },
    Dashboards { project_id: String },
    AccessPolicies { target: PolicyTarget },
    /// Time series that carry an alias
    TimeSeries,
}

/// One item of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub id: String,
    pub name: String,
    /// Owning resource when the listing reports one (asset of a time series)
    pub owner: Option<String>,
}

impl Summary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Summary>,
    pub next_token: Option<String>,
}

/// Model flavour as reported by describe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    AssetModel,
    ComponentModel,
    Interface,
}

/// Hierarchy slot declared on a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHierarchy {
    pub id: String,
    pub name: String,
    pub child_model_id: String,
}

/// Described asset, component or interface model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetModelDescriptor {
    pub id: String,
    pub name: String,
    pub model_type: ModelType,
    pub status: String,
    pub hierarchies: Vec<ModelHierarchy>,
    /// Ids of interface models applied to this model
    pub interface_ids: Vec<String>,
}

impl AssetModelDescriptor {
    /// Kind of graph node this model becomes
    pub fn kind(&self) -> ResourceKind {
        match self.model_type {
            ModelType::Interface => ResourceKind::InterfaceModel,
            ModelType::AssetModel | ModelType::ComponentModel => ResourceKind::AssetModel,
        }
    }
}

/// Result of a describe call, shaped per resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    AssetModel(AssetModelDescriptor),
    Asset {
        id: String,
        name: String,
        model_id: String,
        status: String,
    },
    Portal {
        id: String,
        name: String,
        status: String,
    },
    Project {
        id: String,
        name: String,
        portal_id: String,
    },
    Dashboard {
        id: String,
        name: String,
        project_id: String,
    },
    AccessPolicy {
        id: String,
    },
    TimeSeries {
        alias: String,
        asset_id: Option<String>,
    },
}

impl Descriptor {
    /// Lifecycle status, or [`STATUS_PRESENT`] for kinds without one
    pub fn status(&self) -> &str {
        match self {
            Descriptor::AssetModel(m) => &m.status,
            Descriptor::Asset { status, .. } | Descriptor::Portal { status, .. } => status,
            Descriptor::Project { .. }
            | Descriptor::Dashboard { .. }
            | Descriptor::AccessPolicy { .. }
            | Descriptor::TimeSeries { .. } => STATUS_PRESENT,
        }
    }
}

/// Resource management operations needed by a cleanup run.
///
/// Implemented by the SiteWise SDK adapter, the rate-limiting wrapper and the
/// in-memory fake used in tests.
pub trait ResourceApi: Send + Sync {
    /// Fetch one page of a listing
    fn list(
        &self,
        listing: &Listing,
        next_token: Option<&str>,
    ) -> impl Future<Output = Result<Page, ApiError>> + Send;

    /// Describe a resource; `NotFound` once it is gone
    fn describe(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> impl Future<Output = Result<Descriptor, ApiError>> + Send;

    /// Request deletion; `NotFound` if already gone
    fn delete(&self, kind: ResourceKind, id: &str)
    -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove a parent -> child asset link; `NotFound` if already gone
    fn disassociate(
        &self,
        record: &AssociationRecord,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl<T: ResourceApi> ResourceApi for &T {
    fn list(
        &self,
        listing: &Listing,
        next_token: Option<&str>,
    ) -> impl Future<Output = Result<Page, ApiError>> + Send {
        (**self).list(listing, next_token)
    }

    fn describe(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> impl Future<Output = Result<Descriptor, ApiError>> + Send {
        (**self).describe(kind, id)
    }

    fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).delete(kind, id)
    }

    fn disassociate(
        &self,
        record: &AssociationRecord,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).disassociate(record)
    }
}
