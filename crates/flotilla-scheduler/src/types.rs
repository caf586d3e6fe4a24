use crate::status::{Code, Status};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Result of filtering a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResult {
    /// Cluster name
    pub cluster_name: String,
    /// Status code of the first plugin that rejected the cluster
    pub code: Code,
    /// Plugin that rejected the cluster; empty when the cluster passed
    pub plugin: String,
    /// Reasons for the rejection
    pub reasons: Vec<String>,
}

impl FilterResult {
    /// Create a passing filter result
    pub fn pass(cluster_name: impl Into<String>) -> Self {
        Self::from_status(cluster_name, &Status::success())
    }

    /// Record the status a cluster was filtered with
    pub fn from_status(cluster_name: impl Into<String>, status: &Status) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            code: status.code(),
            plugin: status.plugin().to_string(),
            reasons: status.reasons(),
        }
    }

    pub fn passed(&self) -> bool {
        self.code == Code::Success
    }
}

/// Result of scoring a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// Cluster name
    pub cluster_name: String,
    /// Weighted sum of all plugin scores, higher is better
    pub score: i64,
}

impl ScoreResult {
    /// Create a new score result
    pub fn new(cluster_name: impl Into<String>, score: i64) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            score,
        }
    }
}

/// Outcome of one scheduling cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDecision {
    pub cycle_id: Uuid,
    /// Name of the placement the decision is for
    pub policy_name: String,
    pub decided_at: DateTime<Utc>,
    /// Aggregated PreFilter status; `Skip` means no cluster was filtered
    pub pre_filter: Code,
    /// Plugin that produced the PreFilter status; empty on success
    pub pre_filter_plugin: String,
    /// Selected clusters, best first
    pub selected: Vec<ScoreResult>,
    /// Clusters rejected during filtering, by name
    pub filtered_out: Vec<FilterResult>,
}

impl ScheduleDecision {
    pub fn selected_cluster_names(&self) -> Vec<&str> {
        self.selected.iter().map(|s| s.cluster_name.as_str()).collect()
    }

    pub fn is_selected(&self, cluster_name: &str) -> bool {
        self.selected.iter().any(|s| s.cluster_name == cluster_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_result() {
        let pass = FilterResult::pass("member-1");
        assert!(pass.passed());
        assert!(pass.reasons.is_empty());

        let fail = FilterResult::from_status(
            "member-2",
            &Status::unschedulable("ClusterAffinity", vec!["no match".to_string()]),
        );
        assert!(!fail.passed());
        assert_eq!(fail.code, Code::ClusterUnschedulable);
        assert_eq!(fail.plugin, "ClusterAffinity");
        assert_eq!(fail.reasons, vec!["no match".to_string()]);
    }

    #[test]
    fn test_decision_serializes_camel_case() {
        let decision = ScheduleDecision {
            cycle_id: Uuid::new_v4(),
            policy_name: "crp-1".to_string(),
            decided_at: Utc::now(),
            pre_filter: Code::Success,
            pre_filter_plugin: String::new(),
            selected: vec![ScoreResult::new("member-1", 5)],
            filtered_out: vec![],
        };

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["policyName"], "crp-1");
        assert_eq!(json["preFilter"], "Success");
        assert_eq!(json["preFilterPlugin"], "");
        assert_eq!(json["selected"][0]["clusterName"], "member-1");
        assert_eq!(json["selected"][0]["score"], 5);
        assert!(decision.is_selected("member-1"));
        assert_eq!(decision.selected_cluster_names(), vec!["member-1"]);
    }
}
