//! Placement API types
//!
//! These mirror the fleet placement API in its Kubernetes wire format
//! (camelCase JSON/YAML), reusing `k8s-openapi` for object metadata and
//! label selectors.

use crate::GroupVersionKind;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind name of a member cluster object
pub const MEMBER_CLUSTER_KIND: &str = "MemberCluster";

/// Kind name of a placement object
pub const CLUSTER_RESOURCE_PLACEMENT_KIND: &str = "ClusterResourcePlacement";

static EMPTY_LABELS: BTreeMap<String, String> = BTreeMap::new();

/// A request to place a set of cluster-scoped resources onto member clusters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResourcePlacement {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ClusterResourcePlacementSpec,
}

impl ClusterResourcePlacement {
    /// Create a placement with the given name and an empty spec
    pub fn new(name: impl Into<String>) -> Self {
        let mut crp = Self::default();
        crp.metadata.name = Some(name.into());
        crp
    }

    /// Name of the placement, empty if unset
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }
}

/// Desired state of a placement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResourcePlacementSpec {
    /// Resources to propagate
    #[serde(default)]
    pub resource_selectors: Vec<ClusterResourceSelector>,
    /// Where the resources go; absent means every joined cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PlacementPolicy>,
}

/// Selects cluster-scoped resources either by name or by label selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResourceSelector {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
}

impl ClusterResourceSelector {
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::new(&self.group, &self.version, &self.kind)
    }
}

/// How many clusters a policy asks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementType {
    /// Every cluster that passes filtering
    #[default]
    PickAll,
    /// The best `numberOfClusters` clusters
    PickN,
}

/// User intent for where a placement lands
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPolicy {
    #[serde(default)]
    pub placement_type: PlacementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_clusters: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

/// Group of affinity scheduling rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affinity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_affinity: Option<ClusterAffinity>,
}

/// Required and preferred cluster affinity terms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterAffinity {
    /// Hard constraint; a cluster must match at least one term
    #[serde(
        rename = "requiredDuringSchedulingIgnoredDuringExecution",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub required: Option<ClusterSelector>,
    /// Soft constraints; each matching term adds its weight to the cluster's score
    #[serde(
        rename = "preferredDuringSchedulingIgnoredDuringExecution",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub preferred: Vec<PreferredClusterSelector>,
}

/// A list of terms ORed together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSelector {
    #[serde(default)]
    pub cluster_selector_terms: Vec<ClusterSelectorTerm>,
}

/// One label selector over member cluster labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSelectorTerm {
    #[serde(default)]
    pub label_selector: LabelSelector,
}

impl ClusterSelectorTerm {
    /// Term matching clusters that carry every given label
    pub fn from_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            label_selector: LabelSelector {
                match_labels: Some(
                    labels
                        .into_iter()
                        .map(|(k, v)| (k.into(), v.into()))
                        .collect(),
                ),
                match_expressions: None,
            },
        }
    }
}

/// A weighted preference term
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredClusterSelector {
    pub weight: i32,
    pub preference: ClusterSelectorTerm,
}

/// Membership state of a cluster in the fleet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterState {
    #[default]
    Join,
    Leave,
}

/// A remote cluster that can receive placements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCluster {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub state: ClusterState,
}

impl MemberCluster {
    /// Create a joined cluster with the given name and labels
    pub fn new<K, V>(name: impl Into<String>, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut cluster = Self::default();
        cluster.metadata.name = Some(name.into());
        cluster.metadata.labels = Some(
            labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        cluster
    }

    /// Name of the cluster, empty if unset
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Labels of the cluster; a cluster without labels has an empty set
    pub fn labels(&self) -> &BTreeMap<String, String> {
        self.metadata.labels.as_ref().unwrap_or(&EMPTY_LABELS)
    }

    pub fn is_joined(&self) -> bool {
        self.state == ClusterState::Join
    }
}

/// Immutable view of the policy a scheduling cycle works on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySnapshot {
    /// Name of the placement the policy belongs to
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PlacementPolicy>,
}

impl PolicySnapshot {
    pub fn new(name: impl Into<String>, policy: Option<PlacementPolicy>) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    /// Capture the current policy of a placement
    pub fn from_placement(crp: &ClusterResourcePlacement) -> Self {
        Self::new(crp.name(), crp.spec.policy.clone())
    }

    /// Cluster affinity block, if the policy has one
    pub fn cluster_affinity(&self) -> Option<&ClusterAffinity> {
        self.policy
            .as_ref()
            .and_then(|p| p.affinity.as_ref())
            .and_then(|a| a.cluster_affinity.as_ref())
    }

    /// Number of clusters to bind; `None` means all of them
    pub fn requested_clusters(&self) -> Option<usize> {
        match &self.policy {
            Some(PlacementPolicy {
                placement_type: PlacementType::PickN,
                number_of_clusters,
                ..
            }) => Some(number_of_clusters.unwrap_or(0) as usize),
            _ => None,
        }
    }
}
