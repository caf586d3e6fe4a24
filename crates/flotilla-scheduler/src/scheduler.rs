use crate::binding::BindingSink;
use crate::cluster_source::ClusterSource;
use crate::framework::{Framework, FrameworkConfig};
use crate::types::ScheduleDecision;
use crate::Result;
use flotilla_core::PolicySnapshot;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Settings of every scheduling cycle
    pub framework: FrameworkConfig,
    /// Capacity of the policy queue created by [`SchedulerConfig::channel`]
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            framework: FrameworkConfig::default(),
            queue_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    /// Create the queue policies are submitted through
    pub fn channel(&self) -> (mpsc::Sender<PolicySnapshot>, mpsc::Receiver<PolicySnapshot>) {
        mpsc::channel(self.queue_capacity.max(1))
    }
}

/// Placement scheduler
///
/// Schedules one policy at a time: snapshot the clusters, run a cycle,
/// hand the decision to the binding sink. Retrying a failed cycle is up to
/// whoever submitted the policy.
pub struct Scheduler {
    framework: Framework,
    clusters: Arc<dyn ClusterSource>,
    sink: Arc<dyn BindingSink>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler running the in-tree plugins
    pub fn new(
        clusters: Arc<dyn ClusterSource>,
        sink: Arc<dyn BindingSink>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let framework = Framework::with_default_plugins(config.framework.clone())?;
        Ok(Self::with_framework(framework, clusters, sink, config))
    }

    /// Create a scheduler around a custom framework
    pub fn with_framework(
        framework: Framework,
        clusters: Arc<dyn ClusterSource>,
        sink: Arc<dyn BindingSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            framework,
            clusters,
            sink,
            config,
        }
    }

    pub fn framework(&self) -> &Framework {
        &self.framework
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run the scheduler loop until cancelled or the queue closes
    pub async fn run(
        &self,
        mut policies: mpsc::Receiver<PolicySnapshot>,
        token: CancellationToken,
    ) -> Result<()> {
        info!("Starting scheduler");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler shutting down");
                    break;
                }
                next = policies.recv() => match next {
                    Some(policy) => {
                        if let Err(e) = self.schedule(&policy, &token).await {
                            if e.is_cancelled() {
                                warn!(policy = %policy.name, "Scheduling cancelled: {}", e);
                            } else {
                                error!(policy = %policy.name, "Scheduling failed: {}", e);
                            }
                        }
                    }
                    None => {
                        info!("Policy queue closed, scheduler stopping");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Schedule a single policy and record the decision
    pub async fn schedule(
        &self,
        policy: &PolicySnapshot,
        token: &CancellationToken,
    ) -> Result<ScheduleDecision> {
        let clusters = self.clusters.list_clusters()?;
        debug!(policy = %policy.name, clusters = clusters.len(), "Scheduling policy");

        let decision = self
            .framework
            .run_scheduling_cycle(policy, clusters, token)
            .await?;

        if decision.selected.is_empty() {
            warn!(policy = %policy.name, "No cluster selected");
        }

        self.sink.bind(&decision).await?;

        info!(
            policy = %policy.name,
            cycle_id = %decision.cycle_id,
            clusters = ?decision.selected_cluster_names(),
            "Scheduled policy"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::MemoryBindingSink;
    use crate::cluster_source::StaticClusterSource;
    use crate::SchedulerError;
    use async_trait::async_trait;
    use flotilla_core::{
        Affinity, ClusterAffinity, ClusterSelector, ClusterSelectorTerm, MemberCluster,
        PlacementPolicy, PlacementType,
    };

    fn clusters() -> Arc<StaticClusterSource> {
        Arc::new(StaticClusterSource::new(vec![
            MemberCluster::new("member-1", [("region", "us-west")]),
            MemberCluster::new("member-2", [("region", "us-east")]),
        ]))
    }

    fn pick_region(name: &str, region: &str) -> PolicySnapshot {
        PolicySnapshot::new(
            name,
            Some(PlacementPolicy {
                placement_type: PlacementType::PickAll,
                number_of_clusters: None,
                affinity: Some(Affinity {
                    cluster_affinity: Some(ClusterAffinity {
                        required: Some(ClusterSelector {
                            cluster_selector_terms: vec![ClusterSelectorTerm::from_labels([(
                                "region", region,
                            )])],
                        }),
                        preferred: vec![],
                    }),
                }),
            }),
        )
    }

    struct RejectingSink;

    #[async_trait]
    impl BindingSink for RejectingSink {
        async fn bind(&self, decision: &ScheduleDecision) -> Result<()> {
            Err(SchedulerError::binding_failed(&decision.policy_name, "sink is read-only"))
        }
    }

    #[tokio::test]
    async fn test_schedule_records_decision() {
        let sink = Arc::new(MemoryBindingSink::new());
        let scheduler = Scheduler::new(clusters(), sink.clone(), SchedulerConfig::default()).unwrap();

        let decision = scheduler
            .schedule(&pick_region("crp-1", "us-west"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(decision.selected_cluster_names(), vec!["member-1"]);
        let recorded = sink.get("crp-1").await.unwrap();
        assert_eq!(recorded.cycle_id, decision.cycle_id);
    }

    #[tokio::test]
    async fn test_schedule_sees_cluster_updates() {
        let source = clusters();
        let sink = Arc::new(MemoryBindingSink::new());
        let scheduler = Scheduler::new(source.clone(), sink.clone(), SchedulerConfig::default()).unwrap();

        source.upsert(MemberCluster::new("member-3", [("region", "us-west")]));
        let decision = scheduler
            .schedule(&pick_region("crp-1", "us-west"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(decision.selected_cluster_names(), vec!["member-1", "member-3"]);
    }

    #[tokio::test]
    async fn test_binding_failure_is_reported() {
        let scheduler =
            Scheduler::new(clusters(), Arc::new(RejectingSink), SchedulerConfig::default()).unwrap();

        let err = scheduler
            .schedule(&pick_region("crp-1", "us-west"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::BindingFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_processes_queue_until_closed() {
        let config = SchedulerConfig::default();
        let (tx, rx) = config.channel();
        let sink = Arc::new(MemoryBindingSink::new());
        let scheduler = Scheduler::new(clusters(), sink.clone(), config).unwrap();

        tx.send(pick_region("crp-west", "us-west")).await.unwrap();
        tx.send(pick_region("crp-east", "us-east")).await.unwrap();
        drop(tx);

        scheduler.run(rx, CancellationToken::new()).await.unwrap();

        let west = sink.get("crp-west").await.unwrap();
        let east = sink.get("crp-east").await.unwrap();
        assert_eq!(west.selected_cluster_names(), vec!["member-1"]);
        assert_eq!(east.selected_cluster_names(), vec!["member-2"]);
    }

    #[tokio::test]
    async fn test_run_survives_failed_cycles() {
        let config = SchedulerConfig::default();
        let (tx, rx) = config.channel();
        let scheduler =
            Scheduler::new(clusters(), Arc::new(RejectingSink), config).unwrap();

        tx.send(pick_region("crp-1", "us-west")).await.unwrap();
        tx.send(pick_region("crp-2", "us-east")).await.unwrap();
        drop(tx);

        assert!(scheduler.run(rx, CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let config = SchedulerConfig::default();
        let (_tx, rx) = config.channel();
        let scheduler =
            Scheduler::new(clusters(), Arc::new(MemoryBindingSink::new()), config).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        scheduler.run(rx, token).await.unwrap();
    }
}
