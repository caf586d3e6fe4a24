//! Cluster affinity plugin
//!
//! Enforces the required cluster affinity terms of a policy during Filter
//! and ranks clusters by the weights of matching preferred terms during
//! Score. The policy is compiled once per cycle (PreFilter, or PreScore if
//! PreFilter did not run) and shared through the cycle state.
//!
//! Compiling drops terms that cannot influence the outcome: required terms
//! with an empty selector, and preferred terms with weight 0 or an empty
//! selector.

use crate::cycle_state::{CycleState, StateKey};
use crate::plugin::{FilterPlugin, Plugin, PreFilterPlugin, PreScorePlugin, ScorePlugin};
use crate::status::Status;
use crate::Result;
use flotilla_core::{ClusterAffinity, ClusterSelectorTerm, MemberCluster, PolicySnapshot, Selector};
use std::sync::Arc;
use tracing::debug;

/// Default name of the plugin
pub const CLUSTER_AFFINITY_PLUGIN_NAME: &str = "ClusterAffinity";

/// A compiled cluster selector term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityTerm {
    selector: Selector,
}

impl AffinityTerm {
    pub fn new(selector: Selector) -> Self {
        Self { selector }
    }

    fn compile(term: &ClusterSelectorTerm) -> Result<Self> {
        Ok(Self::new(Selector::from_label_selector(&term.label_selector)?))
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn matches(&self, cluster: &MemberCluster) -> bool {
        self.selector.matches(cluster.labels())
    }
}

/// A compiled preferred term and its weight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferredAffinityTerm {
    affinity_term: AffinityTerm,
    weight: i32,
}

impl PreferredAffinityTerm {
    pub fn new(affinity_term: AffinityTerm, weight: i32) -> Self {
        Self {
            affinity_term,
            weight,
        }
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn affinity_term(&self) -> &AffinityTerm {
        &self.affinity_term
    }
}

/// Compiled cluster affinity of the policy being scheduled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginState {
    pub required_affinity_terms: Vec<AffinityTerm>,
    pub preferred_affinity_terms: Vec<PreferredAffinityTerm>,
}

impl PluginState {
    /// Compile the cluster affinity block of a policy
    pub fn compile(affinity: &ClusterAffinity) -> Result<Self> {
        let mut required_affinity_terms = Vec::new();
        if let Some(required) = &affinity.required {
            for term in &required.cluster_selector_terms {
                let compiled = AffinityTerm::compile(term)?;
                if !compiled.selector.is_empty() {
                    required_affinity_terms.push(compiled);
                }
            }
        }

        let mut preferred_affinity_terms = Vec::new();
        for preferred in &affinity.preferred {
            if preferred.weight == 0 {
                continue;
            }
            let compiled = AffinityTerm::compile(&preferred.preference)?;
            if !compiled.selector.is_empty() {
                preferred_affinity_terms.push(PreferredAffinityTerm::new(compiled, preferred.weight));
            }
        }

        Ok(Self {
            required_affinity_terms,
            preferred_affinity_terms,
        })
    }

    /// Whether the cluster satisfies at least one required term
    ///
    /// With no required terms every cluster is eligible.
    pub fn is_eligible(&self, cluster: &MemberCluster) -> bool {
        self.required_affinity_terms.is_empty()
            || self.required_affinity_terms.iter().any(|t| t.matches(cluster))
    }

    /// Sum of the weights of the preferred terms the cluster matches
    pub fn score(&self, cluster: &MemberCluster) -> i64 {
        self.preferred_affinity_terms
            .iter()
            .filter(|t| t.affinity_term.matches(cluster))
            .map(|t| i64::from(t.weight))
            .sum()
    }
}

/// Required and preferred cluster affinity
#[derive(Debug, Clone)]
pub struct ClusterAffinityPlugin {
    name: String,
}

impl ClusterAffinityPlugin {
    pub fn new() -> Self {
        Self::with_name(CLUSTER_AFFINITY_PLUGIN_NAME)
    }

    /// Create the plugin under a custom name, e.g. to run two instances
    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn state_key(&self) -> StateKey {
        StateKey::new(self.name.as_str())
    }

    /// Read the state written earlier in this cycle
    pub fn read_plugin_state(&self, state: &CycleState) -> Result<Arc<PluginState>> {
        state.read::<PluginState>(&self.state_key())
    }
}

impl Default for ClusterAffinityPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ClusterAffinityPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_pre_filter(&self) -> Option<&dyn PreFilterPlugin> {
        Some(self)
    }

    fn as_filter(&self) -> Option<&dyn FilterPlugin> {
        Some(self)
    }

    fn as_pre_score(&self) -> Option<&dyn PreScorePlugin> {
        Some(self)
    }

    fn as_score(&self) -> Option<&dyn ScorePlugin> {
        Some(self)
    }
}

impl PreFilterPlugin for ClusterAffinityPlugin {
    fn pre_filter(&self, state: &CycleState, policy: &PolicySnapshot) -> Status {
        let Some(affinity) = policy.cluster_affinity() else {
            return Status::skip(self.name());
        };

        let plugin_state = match PluginState::compile(affinity) {
            Ok(ps) => ps,
            Err(e) => return Status::from_error(e, self.name()),
        };

        // Nothing to enforce; Score may still have preferred terms to rank by
        let skip = plugin_state.required_affinity_terms.is_empty();
        debug!(
            plugin = %self.name,
            policy = %policy.name,
            required = plugin_state.required_affinity_terms.len(),
            preferred = plugin_state.preferred_affinity_terms.len(),
            "Compiled cluster affinity"
        );
        state.write(self.state_key(), plugin_state);

        if skip {
            Status::skip(self.name())
        } else {
            Status::success()
        }
    }
}

impl FilterPlugin for ClusterAffinityPlugin {
    fn filter(&self, state: &CycleState, _policy: &PolicySnapshot, cluster: &MemberCluster) -> Status {
        let plugin_state = match self.read_plugin_state(state) {
            Ok(ps) => ps,
            Err(e) => return Status::from_error(e, self.name()),
        };

        if plugin_state.is_eligible(cluster) {
            return Status::success();
        }

        Status::unschedulable(
            self.name(),
            vec![format!(
                "cluster {} does not match any required cluster affinity term",
                cluster.name()
            )],
        )
    }
}

impl PreScorePlugin for ClusterAffinityPlugin {
    fn pre_score(&self, state: &CycleState, policy: &PolicySnapshot) -> Status {
        let Some(affinity) = policy.cluster_affinity() else {
            return Status::skip(self.name());
        };

        // PreFilter may not be registered; state of the wrong type is still an error
        let has_preferred = if state.read_raw(&self.state_key()).is_none() {
            match PluginState::compile(affinity) {
                Ok(ps) => {
                    let has_preferred = !ps.preferred_affinity_terms.is_empty();
                    state.write(self.state_key(), ps);
                    has_preferred
                }
                Err(e) => return Status::from_error(e, self.name()),
            }
        } else {
            match self.read_plugin_state(state) {
                Ok(ps) => !ps.preferred_affinity_terms.is_empty(),
                Err(e) => return Status::from_error(e, self.name()),
            }
        };

        if !has_preferred {
            Status::skip(self.name())
        } else {
            Status::success()
        }
    }
}

impl ScorePlugin for ClusterAffinityPlugin {
    fn score(&self, state: &CycleState, _policy: &PolicySnapshot, cluster: &MemberCluster) -> (i64, Status) {
        match self.read_plugin_state(state) {
            Ok(plugin_state) => (plugin_state.score(cluster), Status::success()),
            Err(e) => (0, Status::from_error(e, self.name())),
        }
    }
}
