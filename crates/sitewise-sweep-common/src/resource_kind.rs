//! SiteWise resource kinds and their deletion polling budgets
//!
//! Deletion in SiteWise is asynchronous. Each kind gets a poll budget sized
//! to how long the service usually takes to finish removing it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Types of SiteWise resources handled by a cleanup run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Asset model (deleted after its assets and hierarchy children)
    AssetModel,
    /// Interface model (deleted after every model that applies it)
    InterfaceModel,
    /// Asset instance of a model
    Asset,
    /// SiteWise Monitor portal
    Portal,
    /// Project inside a portal
    Project,
    /// Dashboard inside a project
    Dashboard,
    /// Access policy on a portal or project
    AccessPolicy,
    /// Time series, addressed by alias
    TimeSeries,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::AssetModel,
        ResourceKind::InterfaceModel,
        ResourceKind::Asset,
        ResourceKind::Portal,
        ResourceKind::Project,
        ResourceKind::Dashboard,
        ResourceKind::AccessPolicy,
        ResourceKind::TimeSeries,
    ];

    /// Stable identifier used in logs, JSON output and the record store
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::AssetModel => "asset_model",
            ResourceKind::InterfaceModel => "interface_model",
            ResourceKind::Asset => "asset",
            ResourceKind::Portal => "portal",
            ResourceKind::Project => "project",
            ResourceKind::Dashboard => "dashboard",
            ResourceKind::AccessPolicy => "access_policy",
            ResourceKind::TimeSeries => "time_series",
        }
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::AssetModel => "AssetModel",
            ResourceKind::InterfaceModel => "InterfaceModel",
            ResourceKind::Asset => "Asset",
            ResourceKind::Portal => "Portal",
            ResourceKind::Project => "Project",
            ResourceKind::Dashboard => "Dashboard",
            ResourceKind::AccessPolicy => "AccessPolicy",
            ResourceKind::TimeSeries => "TimeSeries",
        }
    }

    /// Maximum number of describe polls before a deletion is declared timed out.
    ///
    /// Portals take minutes to tear down; models and assets usually finish
    /// within a minute; the rest are removed almost synchronously.
    pub fn poll_attempts(self) -> u32 {
        match self {
            ResourceKind::Portal => 300,
            ResourceKind::AssetModel | ResourceKind::InterfaceModel | ResourceKind::Asset => 60,
            ResourceKind::Project
            | ResourceKind::Dashboard
            | ResourceKind::AccessPolicy
            | ResourceKind::TimeSeries => 30,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when parsing an unknown resource kind
#[derive(Debug, Error)]
#[error("unknown resource kind '{0}'")]
pub struct UnknownResourceKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownResourceKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_has_largest_budget() {
        let max = ResourceKind::ALL
            .iter()
            .map(|k| k.poll_attempts())
            .max()
            .unwrap();
        assert_eq!(ResourceKind::Portal.poll_attempts(), max);
    }

    #[test]
    fn test_budgets_within_expected_range() {
        for kind in ResourceKind::ALL {
            let attempts = kind.poll_attempts();
            assert!(
                (30..=300).contains(&attempts),
                "{kind} budget {attempts} out of range"
            );
        }
    }

    #[test]
    fn test_parse_accepts_both_spellings() {
        assert_eq!(
            "asset_model".parse::<ResourceKind>().unwrap(),
            ResourceKind::AssetModel
        );
        assert_eq!(
            "AccessPolicy".parse::<ResourceKind>().unwrap(),
            ResourceKind::AccessPolicy
        );
        assert!("bucket".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&ResourceKind::TimeSeries).unwrap();
        assert_eq!(json, "\"time_series\"");
    }
}
