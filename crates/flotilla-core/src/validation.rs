//! Admission-style validation of placement documents
//!
//! The scheduler assumes every policy it receives has passed through
//! [`validate_placement`]; it does not re-check selector well-formedness.

use crate::placement::{ClusterResourcePlacement, ClusterResourceSelector, PlacementPolicy, PlacementType};
use crate::selector::Selector;
use crate::{FlotillaError, GroupVersionKind, Result, CLUSTER_RESOURCE_PLACEMENT_KIND};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeSet;

/// Lower bound for preferred term weights
pub const MIN_PREFERRED_WEIGHT: i32 = -100;
/// Upper bound for preferred term weights
pub const MAX_PREFERRED_WEIGHT: i32 = 100;

/// Source of truth for which resource kinds can be placed
pub trait ResourceCatalog: Send + Sync {
    /// Whether the kind is known to the hub and is cluster-scoped
    fn is_cluster_scoped(&self, gvk: &GroupVersionKind) -> bool;
}

/// Fixed catalog of cluster-scoped kinds
#[derive(Debug, Clone, Default)]
pub struct StaticResourceCatalog {
    cluster_scoped: BTreeSet<GroupVersionKind>,
}

impl StaticResourceCatalog {
    pub fn new(kinds: impl IntoIterator<Item = GroupVersionKind>) -> Self {
        Self {
            cluster_scoped: kinds.into_iter().collect(),
        }
    }

    /// Catalog of the built-in cluster-scoped Kubernetes kinds
    pub fn well_known() -> Self {
        Self::new([
            GroupVersionKind::new("", "v1", "Namespace"),
            GroupVersionKind::new("", "v1", "PersistentVolume"),
            GroupVersionKind::new("rbac.authorization.k8s.io", "v1", "ClusterRole"),
            GroupVersionKind::new("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding"),
            GroupVersionKind::new("storage.k8s.io", "v1", "StorageClass"),
            GroupVersionKind::new("apiextensions.k8s.io", "v1", "CustomResourceDefinition"),
            GroupVersionKind::new("scheduling.k8s.io", "v1", "PriorityClass"),
        ])
    }
}

impl ResourceCatalog for StaticResourceCatalog {
    fn is_cluster_scoped(&self, gvk: &GroupVersionKind) -> bool {
        self.cluster_scoped.contains(gvk)
    }
}

/// Validate a placement before it is handed to the scheduler
pub fn validate_placement(
    crp: &ClusterResourcePlacement,
    catalog: Option<&dyn ResourceCatalog>,
) -> Result<()> {
    if !is_valid_name(crp.name()) {
        return Err(invalid(
            format!("invalid name {:?}", crp.name()),
            "Use a DNS-1123 subdomain (lowercase alphanumeric, '-', or '.')",
        ));
    }

    let catalog = catalog.ok_or_else(|| {
        invalid(
            "resource catalog is not available",
            "The hub must know which resources exist before placements can be admitted",
        )
    })?;

    for selector in &crp.spec.resource_selectors {
        validate_resource_selector(selector, catalog)?;
    }

    if let Some(policy) = &crp.spec.policy {
        validate_policy(policy)?;
    }

    Ok(())
}

/// Validate a single resource selector
pub fn validate_resource_selector(
    selector: &ClusterResourceSelector,
    catalog: &dyn ResourceCatalog,
) -> Result<()> {
    if let Some(label_selector) = &selector.label_selector {
        if !selector.name.is_empty() {
            return Err(invalid(
                format!(
                    "resource selector for {} sets both name {:?} and a label selector",
                    selector.gvk(),
                    selector.name
                ),
                "Select resources either by name or by label selector, not both",
            ));
        }
        validate_label_selector(label_selector, "resource label selector")?;
    }

    let gvk = selector.gvk();
    if !catalog.is_cluster_scoped(&gvk) {
        return Err(invalid(
            format!("{} is not a known cluster-scoped resource", gvk),
            "Only cluster-scoped resources can be placed; namespaced resources travel with their namespace",
        ));
    }

    Ok(())
}

/// Validate a placement policy
pub fn validate_policy(policy: &PlacementPolicy) -> Result<()> {
    match (policy.placement_type, policy.number_of_clusters) {
        (PlacementType::PickN, None) => {
            return Err(invalid(
                "placement type PickN requires numberOfClusters",
                "Set numberOfClusters to the number of clusters to pick",
            ));
        }
        (PlacementType::PickAll, Some(_)) => {
            return Err(invalid(
                "numberOfClusters is only valid with placement type PickN",
                "Remove numberOfClusters or switch the placement type to PickN",
            ));
        }
        _ => {}
    }

    let Some(affinity) = policy
        .affinity
        .as_ref()
        .and_then(|a| a.cluster_affinity.as_ref())
    else {
        return Ok(());
    };

    if let Some(required) = &affinity.required {
        for term in &required.cluster_selector_terms {
            validate_label_selector(&term.label_selector, "required cluster selector term")?;
        }
    }

    for preferred in &affinity.preferred {
        if !(MIN_PREFERRED_WEIGHT..=MAX_PREFERRED_WEIGHT).contains(&preferred.weight) {
            return Err(invalid(
                format!("preferred term weight {} is out of range", preferred.weight),
                format!(
                    "Weights must be between {} and {}",
                    MIN_PREFERRED_WEIGHT, MAX_PREFERRED_WEIGHT
                ),
            ));
        }
        validate_label_selector(
            &preferred.preference.label_selector,
            "preferred cluster selector term",
        )?;
    }

    Ok(())
}

fn validate_label_selector(selector: &LabelSelector, what: &str) -> Result<()> {
    Selector::from_label_selector(selector)
        .map(|_| ())
        .map_err(|e| invalid(format!("{}: {}", what, e), "Fix the label selector expressions"))
}

fn invalid(details: impl Into<String>, help_text: impl Into<String>) -> FlotillaError {
    FlotillaError::validation_failed(CLUSTER_RESOURCE_PLACEMENT_KIND, details, help_text)
}

/// Validate a Kubernetes resource name (DNS-1123 subdomain)
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    // Must contain only lowercase alphanumeric, '-', or '.'
    // Must start and end with alphanumeric
    let bytes = name.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    if !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return false;
    }

    bytes.iter().all(|&b| alnum(b) || b == b'-' || b == b'.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::{Affinity, ClusterAffinity, ClusterSelector, ClusterSelectorTerm, PreferredClusterSelector};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;
    use std::collections::BTreeMap;

    fn cluster_role_selector() -> ClusterResourceSelector {
        ClusterResourceSelector {
            group: "rbac.authorization.k8s.io".to_string(),
            version: "v1".to_string(),
            kind: "ClusterRole".to_string(),
            name: "test-cluster-role".to_string(),
            label_selector: None,
        }
    }

    fn in_without_values() -> LabelSelector {
        LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "test-key".to_string(),
                operator: "In".to_string(),
                values: None,
            }]),
        }
    }

    fn placement(selectors: Vec<ClusterResourceSelector>, policy: Option<PlacementPolicy>) -> ClusterResourcePlacement {
        let mut crp = ClusterResourcePlacement::new("test-crp");
        crp.spec.resource_selectors = selectors;
        crp.spec.policy = policy;
        crp
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("test-crp"));
        assert!(is_valid_name("crp.v2"));

        assert!(!is_valid_name(""));
        assert!(!is_valid_name("TestCrp"));
        assert!(!is_valid_name("-crp"));
        assert!(!is_valid_name("crp-"));
        assert!(!is_valid_name("test_crp"));
    }

    #[test]
    fn test_valid_placement() {
        let catalog = StaticResourceCatalog::well_known();
        let crp = placement(vec![cluster_role_selector()], None);
        assert!(validate_placement(&crp, Some(&catalog)).is_ok());
    }

    #[test]
    fn test_name_and_label_selector_are_exclusive() {
        let catalog = StaticResourceCatalog::well_known();
        let mut selector = cluster_role_selector();
        selector.label_selector = Some(LabelSelector {
            match_labels: Some(BTreeMap::from([("test-key".to_string(), "test-value".to_string())])),
            match_expressions: None,
        });
        let crp = placement(vec![selector], None);
        assert!(validate_placement(&crp, Some(&catalog)).is_err());
    }

    #[test]
    fn test_invalid_resource_label_selector() {
        let catalog = StaticResourceCatalog::well_known();
        let selector = ClusterResourceSelector {
            label_selector: Some(in_without_values()),
            ..Default::default()
        };
        let crp = placement(vec![selector], None);
        assert!(validate_placement(&crp, Some(&catalog)).is_err());
    }

    #[test]
    fn test_namespaced_resource_is_rejected() {
        let catalog = StaticResourceCatalog::well_known();
        let selector = ClusterResourceSelector {
            kind: "Role".to_string(),
            name: "test-role".to_string(),
            ..cluster_role_selector()
        };
        let crp = placement(vec![selector], None);
        let err = validate_placement(&crp, Some(&catalog)).unwrap_err();
        assert!(err.to_string().contains("Role"));
    }

    #[test]
    fn test_missing_catalog_is_rejected() {
        let crp = placement(vec![cluster_role_selector()], None);
        assert!(validate_placement(&crp, None).is_err());
    }

    #[test]
    fn test_invalid_policy_label_selector() {
        let catalog = StaticResourceCatalog::well_known();
        let policy = PlacementPolicy {
            affinity: Some(Affinity {
                cluster_affinity: Some(ClusterAffinity {
                    required: Some(ClusterSelector {
                        cluster_selector_terms: vec![ClusterSelectorTerm {
                            label_selector: in_without_values(),
                        }],
                    }),
                    preferred: vec![],
                }),
            }),
            ..Default::default()
        };
        let crp = placement(vec![cluster_role_selector()], Some(policy));
        assert!(validate_placement(&crp, Some(&catalog)).is_err());
    }

    #[test]
    fn test_valid_policy_with_affinity() {
        let catalog = StaticResourceCatalog::well_known();
        let policy = PlacementPolicy {
            placement_type: PlacementType::PickN,
            number_of_clusters: Some(1),
            affinity: Some(Affinity {
                cluster_affinity: Some(ClusterAffinity {
                    required: Some(ClusterSelector {
                        cluster_selector_terms: vec![ClusterSelectorTerm::from_labels([("region", "us-west")])],
                    }),
                    preferred: vec![PreferredClusterSelector {
                        weight: 0,
                        preference: ClusterSelectorTerm::from_labels([("zone", "zone1")]),
                    }],
                }),
            }),
        };
        let crp = placement(vec![cluster_role_selector()], Some(policy));
        assert!(validate_placement(&crp, Some(&catalog)).is_ok());
    }

    #[test]
    fn test_policy_placement_type_and_count() {
        let pick_n_without_count = PlacementPolicy {
            placement_type: PlacementType::PickN,
            ..Default::default()
        };
        assert!(validate_policy(&pick_n_without_count).is_err());

        let pick_all_with_count = PlacementPolicy {
            number_of_clusters: Some(3),
            ..Default::default()
        };
        assert!(validate_policy(&pick_all_with_count).is_err());
    }

    #[test]
    fn test_preferred_weight_range() {
        let policy = |weight| PlacementPolicy {
            affinity: Some(Affinity {
                cluster_affinity: Some(ClusterAffinity {
                    required: None,
                    preferred: vec![PreferredClusterSelector {
                        weight,
                        preference: ClusterSelectorTerm::from_labels([("region", "us-west")]),
                    }],
                }),
            }),
            ..Default::default()
        };

        assert!(validate_policy(&policy(100)).is_ok());
        assert!(validate_policy(&policy(-100)).is_ok());
        assert!(validate_policy(&policy(101)).is_err());
        assert!(validate_policy(&policy(-101)).is_err());
    }
}
