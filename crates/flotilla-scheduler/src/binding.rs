use crate::types::ScheduleDecision;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Receives the decisions of completed scheduling cycles
///
/// The scheduler only reports where a placement should land. Turning a
/// decision into bindings on the member clusters is the sink's job.
#[async_trait]
pub trait BindingSink: Send + Sync {
    /// Record a decision, replacing any earlier decision for the same policy
    async fn bind(&self, decision: &ScheduleDecision) -> Result<()>;
}

/// In-memory binding sink keyed by policy name
#[derive(Debug, Clone, Default)]
pub struct MemoryBindingSink {
    decisions: Arc<RwLock<BTreeMap<String, ScheduleDecision>>>,
}

impl MemoryBindingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest decision for a policy
    pub async fn get(&self, policy_name: &str) -> Option<ScheduleDecision> {
        self.decisions.read().await.get(policy_name).cloned()
    }

    /// Latest decision of every policy, ordered by policy name
    pub async fn decisions(&self) -> Vec<ScheduleDecision> {
        self.decisions.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl BindingSink for MemoryBindingSink {
    async fn bind(&self, decision: &ScheduleDecision) -> Result<()> {
        debug!(
            policy = %decision.policy_name,
            clusters = ?decision.selected_cluster_names(),
            "Recording decision"
        );
        self.decisions
            .write()
            .await
            .insert(decision.policy_name.clone(), decision.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;
    use crate::types::ScoreResult;
    use chrono::Utc;
    use uuid::Uuid;

    fn decision(policy: &str, clusters: &[&str]) -> ScheduleDecision {
        ScheduleDecision {
            cycle_id: Uuid::new_v4(),
            policy_name: policy.to_string(),
            decided_at: Utc::now(),
            pre_filter: Code::Success,
            pre_filter_plugin: String::new(),
            selected: clusters.iter().map(|c| ScoreResult::new(*c, 0)).collect(),
            filtered_out: vec![],
        }
    }

    #[tokio::test]
    async fn test_latest_decision_wins() {
        let sink = MemoryBindingSink::new();
        sink.bind(&decision("crp-1", &["member-1"])).await.unwrap();
        sink.bind(&decision("crp-1", &["member-2"])).await.unwrap();
        sink.bind(&decision("crp-2", &["member-1"])).await.unwrap();

        let latest = sink.get("crp-1").await.unwrap();
        assert_eq!(latest.selected_cluster_names(), vec!["member-2"]);
        assert_eq!(sink.decisions().await.len(), 2);
        assert!(sink.get("crp-3").await.is_none());
    }
}
