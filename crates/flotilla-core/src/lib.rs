//! Flotilla Core - Placement API types and label selectors for the Flotilla fleet scheduler
//!
//! This crate provides:
//! - Placement and member cluster API types
//! - Label selector compilation and matching
//! - Admission validation of placement documents
//! - Error types with miette diagnostics
//! - Serialization helpers

pub mod error;
pub mod placement;
pub mod selector;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use error::{FlotillaError, Result};
pub use placement::{
    Affinity, ClusterAffinity, ClusterResourcePlacement, ClusterResourcePlacementSpec,
    ClusterResourceSelector, ClusterSelector, ClusterSelectorTerm, ClusterState, MemberCluster,
    PlacementPolicy, PlacementType, PolicySnapshot, PreferredClusterSelector,
    CLUSTER_RESOURCE_PLACEMENT_KIND, MEMBER_CLUSTER_KIND,
};
pub use selector::{Operator, Requirement, Selector};
pub use types::GroupVersionKind;
pub use validation::{is_valid_name, validate_placement, ResourceCatalog, StaticResourceCatalog};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, LabelSelectorRequirement, ObjectMeta,
};

use std::path::Path;

/// Serialize a value to pretty JSON
pub fn to_json_pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        FlotillaError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a value from YAML
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        FlotillaError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Read and deserialize a YAML (or JSON, which is valid YAML) file
pub fn load_yaml_file<T: for<'de> serde::Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .map_err(|e| FlotillaError::io_error(path.display().to_string(), e))?;
    from_yaml(&data)
}
