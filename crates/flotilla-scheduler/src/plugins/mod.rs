//! In-tree plugins

pub mod cluster_affinity;

pub use cluster_affinity::{ClusterAffinityPlugin, CLUSTER_AFFINITY_PLUGIN_NAME};

use crate::plugin::Profile;
use crate::Result;
use std::sync::Arc;

/// Name of the profile built by [`default_profile`]
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Get the default plugin profile
pub fn default_profile() -> Result<Profile> {
    Profile::new(DEFAULT_PROFILE_NAME).register(Arc::new(ClusterAffinityPlugin::new()))
}
