//! IoT SiteWise client implementing [`ResourceApi`]

use super::context::{AwsContext, FromAwsContext};
use super::error::from_sdk_error;
use crate::api::{
    AssetModelDescriptor, AssociationRecord, Descriptor, Listing, ModelHierarchy, ModelType,
    Page, PolicyTarget, ResourceApi, Summary,
};
use crate::error::ApiError;
use aws_sdk_iotsitewise::Client;
use aws_sdk_iotsitewise::types::{
    AssetModelStatus, AssetModelType, AssetStatus, PortalStatus, ResourceType,
    TraversalDirection,
};
use sitewise_sweep_common::ResourceKind;
use tracing::debug;

/// SiteWise status string used when the service omits one
const STATUS_UNKNOWN: &str = "UNKNOWN";

/// SiteWise client for listing, describing and deleting resources
pub struct SiteWiseClient {
    client: Client,
}

impl FromAwsContext for SiteWiseClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.sitewise_client(),
        }
    }
}

/// Normalizes SDK accessors that return either `&T` or `Option<&T>`.
fn opt<'a, T: ?Sized>(value: impl Into<Option<&'a T>>) -> Option<&'a T> {
    value.into()
}

fn resource_label(kind: ResourceKind, id: &str) -> String {
    format!("{kind} {id}")
}

fn model_type_from(value: Option<&AssetModelType>) -> ModelType {
    match value.map(|t| t.as_str()) {
        Some("INTERFACE") => ModelType::Interface,
        Some("COMPONENT_MODEL") => ModelType::ComponentModel,
        _ => ModelType::AssetModel,
    }
}

impl SiteWiseClient {
    /// Create a client for `region`, optionally using a named profile
    pub async fn new(region: &str, profile: Option<&str>) -> Self {
        let ctx = AwsContext::with_profile(region, profile).await;
        Self::from_context(&ctx)
    }

    async fn describe_asset_model(&self, id: &str) -> Result<Descriptor, ApiError> {
        let out = self
            .client
            .describe_asset_model()
            .asset_model_id(id)
            .send()
            .await
            .map_err(|e| from_sdk_error(e, &resource_label(ResourceKind::AssetModel, id)))?;

        let hierarchies = out
            .asset_model_hierarchies()
            .iter()
            .filter_map(|h| {
                Some(ModelHierarchy {
                    id: opt::<str>(h.id())?.to_string(),
                    name: h.name().to_string(),
                    child_model_id: h.child_asset_model_id().to_string(),
                })
            })
            .collect();

        let interface_ids = out
            .interface_details()
            .iter()
            .filter_map(|i| opt::<str>(i.id()).map(str::to_string))
            .collect();

        let status = opt::<AssetModelStatus>(out.asset_model_status())
            .map(|s| s.state().as_str().to_string())
            .unwrap_or_else(|| STATUS_UNKNOWN.to_string());

        Ok(Descriptor::AssetModel(AssetModelDescriptor {
            id: out.asset_model_id().to_string(),
            name: out.asset_model_name().to_string(),
            model_type: model_type_from(opt::<AssetModelType>(out.asset_model_type())),
            status,
            hierarchies,
            interface_ids,
        }))
    }
}

impl ResourceApi for SiteWiseClient {
    async fn list(&self, listing: &Listing, next_token: Option<&str>) -> Result<Page, ApiError> {
        let token = next_token.map(str::to_string);
        debug!(?listing, has_token = token.is_some(), "Listing page");

        match listing {
            Listing::AssetModels => {
                let out = self
                    .client
                    .list_asset_models()
                    .set_asset_model_types(Some(vec![
                        AssetModelType::from("ASSET_MODEL"),
                        AssetModelType::from("COMPONENT_MODEL"),
                        AssetModelType::from("INTERFACE"),
                    ]))
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, "asset models"))?;
                Ok(Page {
                    items: out
                        .asset_model_summaries()
                        .iter()
                        .map(|m| Summary::new(m.id(), m.name()))
                        .collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Listing::Assets { asset_model_id } => {
                let out = self
                    .client
                    .list_assets()
                    .asset_model_id(asset_model_id)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| {
                        from_sdk_error(e, &resource_label(ResourceKind::AssetModel, asset_model_id))
                    })?;
                Ok(Page {
                    items: out
                        .asset_summaries()
                        .iter()
                        .map(|a| Summary::new(a.id(), a.name()))
                        .collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Listing::ChildAssets {
                asset_id,
                hierarchy_id,
            } => {
                let out = self
                    .client
                    .list_associated_assets()
                    .asset_id(asset_id)
                    .hierarchy_id(hierarchy_id)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &resource_label(ResourceKind::Asset, asset_id)))?;
                Ok(Page {
                    items: out
                        .asset_summaries()
                        .iter()
                        .map(|a| Summary::new(a.id(), a.name()))
                        .collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Listing::ParentAssets { asset_id } => {
                let out = self
                    .client
                    .list_associated_assets()
                    .asset_id(asset_id)
                    .traversal_direction(TraversalDirection::Parent)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &resource_label(ResourceKind::Asset, asset_id)))?;
                Ok(Page {
                    items: out
                        .asset_summaries()
                        .iter()
                        .map(|a| Summary::new(a.id(), a.name()))
                        .collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Listing::Portals => {
                let out = self
                    .client
                    .list_portals()
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, "portals"))?;
                Ok(Page {
                    items: out
                        .portal_summaries()
                        .iter()
                        .map(|p| Summary::new(p.id(), p.name()))
                        .collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Listing::Projects { portal_id } => {
                let out = self
                    .client
                    .list_projects()
                    .portal_id(portal_id)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &resource_label(ResourceKind::Portal, portal_id)))?;
                Ok(Page {
                    items: out
                        .project_summaries()
                        .iter()
                        .map(|p| Summary::new(p.id(), p.name()))
                        .collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Listing::Dashboards { project_id } => {
                let out = self
                    .client
                    .list_dashboards()
                    .project_id(project_id)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| {
                        from_sdk_error(e, &resource_label(ResourceKind::Project, project_id))
                    })?;
                Ok(Page {
                    items: out
                        .dashboard_summaries()
                        .iter()
                        .map(|d| Summary::new(d.id(), d.name()))
                        .collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Listing::AccessPolicies { target } => {
                let (resource_type, resource_id) = match target {
                    PolicyTarget::Portal(id) => (ResourceType::Portal, id),
                    PolicyTarget::Project(id) => (ResourceType::Project, id),
                };
                let out = self
                    .client
                    .list_access_policies()
                    .resource_type(resource_type)
                    .resource_id(resource_id)
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, resource_id))?;
                Ok(Page {
                    items: out
                        .access_policy_summaries()
                        .iter()
                        .map(|p| Summary::new(p.id(), p.id()))
                        .collect(),
                    next_token: out.next_token().map(str::to_string),
                })
            }
            Listing::TimeSeries => {
                let out = self
                    .client
                    .list_time_series()
                    .set_next_token(token)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, "time series"))?;
                let mut items = Vec::new();
                for ts in out.time_series_summaries() {
                    // Deletion is by alias; aliasless series go away with their asset
                    let Some(alias) = ts.alias() else {
                        debug!(time_series_id = %ts.time_series_id(), "Skipping time series without alias");
                        continue;
                    };
                    let mut summary = Summary::new(alias, alias);
                    if let Some(asset_id) = ts.asset_id() {
                        summary = summary.with_owner(asset_id);
                    }
                    items.push(summary);
                }
                Ok(Page {
                    items,
                    next_token: out.next_token().map(str::to_string),
                })
            }
        }
    }

    async fn describe(&self, kind: ResourceKind, id: &str) -> Result<Descriptor, ApiError> {
        let label = resource_label(kind, id);
        match kind {
            ResourceKind::AssetModel | ResourceKind::InterfaceModel => {
                self.describe_asset_model(id).await
            }
            ResourceKind::Asset => {
                let out = self
                    .client
                    .describe_asset()
                    .asset_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
                Ok(Descriptor::Asset {
                    id: out.asset_id().to_string(),
                    name: out.asset_name().to_string(),
                    model_id: out.asset_model_id().to_string(),
                    status: opt::<AssetStatus>(out.asset_status())
                        .map(|s| s.state().as_str().to_string())
                        .unwrap_or_else(|| STATUS_UNKNOWN.to_string()),
                })
            }
            ResourceKind::Portal => {
                let out = self
                    .client
                    .describe_portal()
                    .portal_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
                Ok(Descriptor::Portal {
                    id: out.portal_id().to_string(),
                    name: out.portal_name().to_string(),
                    status: opt::<PortalStatus>(out.portal_status())
                        .map(|s| s.state().as_str().to_string())
                        .unwrap_or_else(|| STATUS_UNKNOWN.to_string()),
                })
            }
            ResourceKind::Project => {
                let out = self
                    .client
                    .describe_project()
                    .project_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
                Ok(Descriptor::Project {
                    id: out.project_id().to_string(),
                    name: out.project_name().to_string(),
                    portal_id: out.portal_id().to_string(),
                })
            }
            ResourceKind::Dashboard => {
                let out = self
                    .client
                    .describe_dashboard()
                    .dashboard_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
                Ok(Descriptor::Dashboard {
                    id: out.dashboard_id().to_string(),
                    name: out.dashboard_name().to_string(),
                    project_id: out.project_id().to_string(),
                })
            }
            ResourceKind::AccessPolicy => {
                let out = self
                    .client
                    .describe_access_policy()
                    .access_policy_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
                Ok(Descriptor::AccessPolicy {
                    id: out.access_policy_id().to_string(),
                })
            }
            ResourceKind::TimeSeries => {
                let out = self
                    .client
                    .describe_time_series()
                    .alias(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
                Ok(Descriptor::TimeSeries {
                    alias: out.alias().unwrap_or(id).to_string(),
                    asset_id: out.asset_id().map(str::to_string),
                })
            }
        }
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ApiError> {
        let label = resource_label(kind, id);
        match kind {
            ResourceKind::AssetModel | ResourceKind::InterfaceModel => {
                self.client
                    .delete_asset_model()
                    .asset_model_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
            }
            ResourceKind::Asset => {
                self.client
                    .delete_asset()
                    .asset_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
            }
            ResourceKind::Portal => {
                self.client
                    .delete_portal()
                    .portal_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
            }
            ResourceKind::Project => {
                self.client
                    .delete_project()
                    .project_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
            }
            ResourceKind::Dashboard => {
                self.client
                    .delete_dashboard()
                    .dashboard_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
            }
            ResourceKind::AccessPolicy => {
                self.client
                    .delete_access_policy()
                    .access_policy_id(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
            }
            ResourceKind::TimeSeries => {
                self.client
                    .delete_time_series()
                    .alias(id)
                    .send()
                    .await
                    .map_err(|e| from_sdk_error(e, &label))?;
            }
        }
        Ok(())
    }

    async fn disassociate(&self, record: &AssociationRecord) -> Result<(), ApiError> {
        self.client
            .disassociate_assets()
            .asset_id(&record.parent_id)
            .hierarchy_id(&record.hierarchy_id)
            .child_asset_id(&record.child_id)
            .send()
            .await
            .map_err(|e| from_sdk_error(e, &format!("association {record}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_mapping() {
        assert_eq!(
            model_type_from(Some(&AssetModelType::from("INTERFACE"))),
            ModelType::Interface
        );
        assert_eq!(
            model_type_from(Some(&AssetModelType::from("COMPONENT_MODEL"))),
            ModelType::ComponentModel
        );
        assert_eq!(model_type_from(None), ModelType::AssetModel);
    }

    #[test]
    fn opt_normalizes_both_shapes() {
        let s = String::from("abc");
        assert_eq!(opt::<str>(s.as_str()), Some("abc"));
        assert_eq!(opt::<str>(None::<&str>), None);
    }
}
