use crate::cycle_state::CycleState;
use crate::status::Status;
use crate::{Result, SchedulerError};
use flotilla_core::{MemberCluster, PolicySnapshot};
use std::sync::Arc;

/// A pluggable unit of scheduling logic
///
/// A plugin exposes the stages it implements through the `as_*`
/// accessors. Returning `None` means the stage does not apply to the
/// plugin, which is distinct from the stage returning `Skip`.
pub trait Plugin: Send + Sync {
    /// Unique name; also the key of the plugin's cycle state
    fn name(&self) -> &str;

    fn as_pre_filter(&self) -> Option<&dyn PreFilterPlugin> {
        None
    }

    fn as_filter(&self) -> Option<&dyn FilterPlugin> {
        None
    }

    fn as_pre_score(&self) -> Option<&dyn PreScorePlugin> {
        None
    }

    fn as_score(&self) -> Option<&dyn ScorePlugin> {
        None
    }
}

/// Runs once per cycle before any cluster is filtered
pub trait PreFilterPlugin: Plugin {
    fn pre_filter(&self, state: &CycleState, policy: &PolicySnapshot) -> Status;
}

/// Decides whether a single cluster is eligible
pub trait FilterPlugin: Plugin {
    fn filter(&self, state: &CycleState, policy: &PolicySnapshot, cluster: &MemberCluster) -> Status;
}

/// Runs once per cycle over the clusters that passed filtering
pub trait PreScorePlugin: Plugin {
    fn pre_score(&self, state: &CycleState, policy: &PolicySnapshot) -> Status;
}

/// Ranks a single eligible cluster; higher is better
pub trait ScorePlugin: Plugin {
    fn score(&self, state: &CycleState, policy: &PolicySnapshot, cluster: &MemberCluster) -> (i64, Status);
}

/// A registered plugin and the multiplier applied to its scores
#[derive(Clone)]
pub struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    weight: i64,
}

impl PluginEntry {
    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }
}

/// Ordered set of plugins a framework runs
///
/// Plugins run in registration order within every stage.
#[derive(Clone, Default)]
pub struct Profile {
    name: String,
    plugins: Vec<PluginEntry>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugins: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a plugin with score weight 1
    pub fn register(self, plugin: Arc<dyn Plugin>) -> Result<Self> {
        self.register_weighted(plugin, 1)
    }

    /// Register a plugin whose scores are multiplied by `weight`
    pub fn register_weighted(mut self, plugin: Arc<dyn Plugin>, weight: i64) -> Result<Self> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(SchedulerError::duplicate_plugin(plugin.name()));
        }
        self.plugins.push(PluginEntry { plugin, weight });
        Ok(self)
    }

    pub fn plugins(&self) -> &[PluginEntry] {
        &self.plugins
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub(crate) fn pre_filter_plugins(&self) -> impl Iterator<Item = &dyn PreFilterPlugin> {
        self.plugins.iter().filter_map(|p| p.plugin().as_pre_filter())
    }

    pub(crate) fn filter_plugins(&self) -> impl Iterator<Item = &dyn FilterPlugin> {
        self.plugins.iter().filter_map(|p| p.plugin().as_filter())
    }

    pub(crate) fn pre_score_plugins(&self) -> impl Iterator<Item = &dyn PreScorePlugin> {
        self.plugins.iter().filter_map(|p| p.plugin().as_pre_score())
    }

    pub(crate) fn score_plugins(&self) -> impl Iterator<Item = (&dyn ScorePlugin, i64)> {
        self.plugins
            .iter()
            .filter_map(|p| p.plugin().as_score().map(|s| (s, p.weight())))
    }
}

impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("plugins", &self.plugin_names())
            .finish()
    }
}
