//! Scheduling framework
//!
//! Runs the plugins of a profile through PreFilter, Filter, PreScore and
//! Score and selects the clusters a policy lands on. PreFilter and PreScore
//! run once per cycle; Filter and Score run once per cluster, concurrently
//! up to the configured parallelism.

use crate::cycle_state::CycleState;
use crate::plugin::Profile;
use crate::plugins::default_profile;
use crate::status::{Code, Status};
use crate::types::{FilterResult, ScheduleDecision, ScoreResult};
use crate::{Result, SchedulerError};
use chrono::Utc;
use flotilla_core::{MemberCluster, PolicySnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the framework
#[derive(Debug, Clone)]
pub struct FrameworkConfig {
    /// Maximum number of clusters evaluated concurrently
    pub parallelism: usize,
    /// Deadline for a whole scheduling cycle
    pub cycle_timeout: Duration,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            parallelism: 16,
            cycle_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs scheduling cycles over a fixed profile
#[derive(Debug, Clone)]
pub struct Framework {
    profile: Arc<Profile>,
    config: FrameworkConfig,
}

impl Framework {
    pub fn new(profile: Profile, config: FrameworkConfig) -> Self {
        Self {
            profile: Arc::new(profile),
            config,
        }
    }

    /// Create a framework running the in-tree plugins
    pub fn with_default_plugins(config: FrameworkConfig) -> Result<Self> {
        Ok(Self::new(default_profile()?, config))
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    /// Run every PreFilter plugin in registration order
    ///
    /// A plugin returning `Skip` is excluded from the Filter stage of this
    /// cycle. The first `Skip` is returned only when no Filter plugin is
    /// left to run; otherwise the result is `Success`, or the first
    /// `ClusterUnschedulable`/`Error`, which stops the stage.
    pub fn run_pre_filter_plugins(&self, state: &CycleState, policy: &PolicySnapshot) -> Status {
        let mut first_skip = None;

        for plugin in self.profile.pre_filter_plugins() {
            let status = plugin.pre_filter(state, policy);
            match status.code() {
                Code::Success => {}
                Code::Skip => {
                    debug!(cycle_id = %state.cycle_id(), plugin = plugin.name(), "PreFilter skipped");
                    state.skip_filter(plugin.name());
                    first_skip.get_or_insert(status);
                }
                Code::ClusterUnschedulable | Code::Error => return status,
            }
        }

        let filtering = self
            .profile
            .filter_plugins()
            .any(|p| !state.is_filter_skipped(p.name()));

        match first_skip {
            Some(skip) if !filtering => skip,
            _ => Status::success(),
        }
    }

    /// Run the Filter plugins that did not skip against one cluster
    ///
    /// The first non-success status rejects the cluster and stops the
    /// remaining plugins. Only a PreFilter `Skip` exempts a plugin from
    /// Filter; a `Skip` returned by Filter itself rejects the cluster.
    pub fn run_filter_plugins(
        &self,
        state: &CycleState,
        policy: &PolicySnapshot,
        cluster: &MemberCluster,
    ) -> Status {
        for plugin in self.profile.filter_plugins() {
            if state.is_filter_skipped(plugin.name()) {
                continue;
            }

            let status = plugin.filter(state, policy, cluster);
            if !status.is_success() {
                return status;
            }
        }

        Status::success()
    }

    /// Run every PreScore plugin in registration order
    ///
    /// A plugin returning `Skip` contributes nothing to the scores of this
    /// cycle. The first `Skip` is returned when no Score plugin is left to run.
    pub fn run_pre_score_plugins(&self, state: &CycleState, policy: &PolicySnapshot) -> Status {
        let mut first_skip = None;

        for plugin in self.profile.pre_score_plugins() {
            let status = plugin.pre_score(state, policy);
            match status.code() {
                Code::Success => {}
                Code::Skip => {
                    debug!(cycle_id = %state.cycle_id(), plugin = plugin.name(), "PreScore skipped");
                    state.skip_score(plugin.name());
                    first_skip.get_or_insert(status);
                }
                Code::Error => return status,
                Code::ClusterUnschedulable => {
                    return Status::from_error(
                        SchedulerError::internal_error(format!(
                            "PreScore of {} returned ClusterUnschedulable; scoring cannot reject clusters",
                            plugin.name()
                        )),
                        plugin.name(),
                    )
                }
            }
        }

        let scoring = self
            .profile
            .score_plugins()
            .any(|(p, _)| !state.is_score_skipped(p.name()));

        match first_skip {
            Some(skip) if !scoring => skip,
            _ => Status::success(),
        }
    }

    /// Run the Score plugins that did not skip against one cluster
    ///
    /// Returns the sum of every plugin's score multiplied by its weight.
    pub fn run_score_plugins(
        &self,
        state: &CycleState,
        policy: &PolicySnapshot,
        cluster: &MemberCluster,
    ) -> (i64, Status) {
        let mut total: i64 = 0;

        for (plugin, weight) in self.profile.score_plugins() {
            if state.is_score_skipped(plugin.name()) {
                continue;
            }

            let (score, status) = plugin.score(state, policy, cluster);
            match status.code() {
                Code::Success => total = total.saturating_add(score.saturating_mul(weight)),
                Code::Skip => {}
                Code::Error => return (0, status),
                Code::ClusterUnschedulable => {
                    return (
                        0,
                        Status::from_error(
                            SchedulerError::internal_error(format!(
                                "Score of {} returned ClusterUnschedulable; scoring cannot reject clusters",
                                plugin.name()
                            )),
                            plugin.name(),
                        ),
                    )
                }
            }
        }

        (total, Status::success())
    }

    /// Run one scheduling cycle for a policy
    ///
    /// Clusters leaving the fleet are never candidates. An `Error` from any
    /// plugin aborts the cycle, as does cancelling `token` or running past
    /// the configured cycle timeout; no partial decision is returned.
    pub async fn run_scheduling_cycle(
        &self,
        policy: &PolicySnapshot,
        clusters: Vec<MemberCluster>,
        token: &CancellationToken,
    ) -> Result<ScheduleDecision> {
        let cycle_token = token.child_token();
        let deadline = self.config.cycle_timeout;

        match tokio::time::timeout(deadline, self.run_cycle(policy, clusters, &cycle_token)).await {
            Ok(result) => result,
            Err(_) => {
                cycle_token.cancel();
                warn!(policy = %policy.name, "Scheduling cycle exceeded its deadline of {:?}", deadline);
                Err(SchedulerError::cancelled(format!(
                    "cycle exceeded its deadline of {:?}",
                    deadline
                )))
            }
        }
    }

    async fn run_cycle(
        &self,
        policy: &PolicySnapshot,
        clusters: Vec<MemberCluster>,
        token: &CancellationToken,
    ) -> Result<ScheduleDecision> {
        ensure_active(token)?;

        let state = Arc::new(CycleState::new());
        let snapshot = Arc::new(policy.clone());
        let cycle_id = state.cycle_id();

        let candidates: Vec<Arc<MemberCluster>> = clusters
            .into_iter()
            .filter(|c| {
                if !c.is_joined() {
                    debug!(%cycle_id, cluster = c.name(), "Skipping cluster that is leaving the fleet");
                }
                c.is_joined()
            })
            .map(Arc::new)
            .collect();

        info!(
            %cycle_id,
            policy = %snapshot.name,
            candidates = candidates.len(),
            "Starting scheduling cycle"
        );

        // Phase 1: PreFilter
        let pre_filter = self.run_pre_filter_plugins(&state, &snapshot).into_result()?;

        // Phase 2: Filter clusters
        let mut filtered_out = Vec::new();
        let feasible = match pre_filter.code() {
            Code::Skip => {
                debug!(%cycle_id, "Every filter plugin skipped, no cluster is filtered");
                candidates
            }
            Code::ClusterUnschedulable => {
                filtered_out.extend(
                    candidates
                        .iter()
                        .map(|c| FilterResult::from_status(c.name(), &pre_filter)),
                );
                Vec::new()
            }
            _ => {
                let framework = self.clone();
                let (st, sn) = (state.clone(), snapshot.clone());
                let results = self
                    .evaluate(candidates, token, move |cluster| {
                        framework.run_filter_plugins(&st, &sn, cluster).into_result()
                    })
                    .await?;

                let mut feasible = Vec::with_capacity(results.len());
                for (cluster, status) in results {
                    if !status.is_success() {
                        debug!(
                            %cycle_id,
                            cluster = cluster.name(),
                            plugin = status.plugin(),
                            "Cluster filtered out: {}",
                            status.reasons().join(", ")
                        );
                        filtered_out.push(FilterResult::from_status(cluster.name(), &status));
                    } else {
                        feasible.push(cluster);
                    }
                }
                feasible
            }
        };
        filtered_out.sort_by(|a, b| a.cluster_name.cmp(&b.cluster_name));
        ensure_active(token)?;

        info!(%cycle_id, feasible = feasible.len(), "Filtering complete");

        // Phase 3: Score feasible clusters
        let mut selected: Vec<ScoreResult> = if feasible.is_empty() {
            Vec::new()
        } else {
            let pre_score = self.run_pre_score_plugins(&state, &snapshot).into_result()?;
            if pre_score.is_skip() {
                feasible
                    .iter()
                    .map(|c| ScoreResult::new(c.name(), 0))
                    .collect()
            } else {
                let framework = self.clone();
                let (st, sn) = (state.clone(), snapshot.clone());
                self.evaluate(feasible, token, move |cluster| {
                    let (score, status) = framework.run_score_plugins(&st, &sn, cluster);
                    status.into_result().map(|_| score)
                })
                .await?
                .into_iter()
                .map(|(cluster, score)| ScoreResult::new(cluster.name(), score))
                .collect()
            }
        };
        ensure_active(token)?;

        // Phase 4: Select, best score first and ties by name
        selected.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.cluster_name.cmp(&b.cluster_name))
        });
        if let Some(wanted) = snapshot.requested_clusters() {
            if selected.len() < wanted {
                warn!(
                    %cycle_id,
                    policy = %snapshot.name,
                    "Only {} of {} requested clusters are feasible",
                    selected.len(),
                    wanted
                );
            }
            selected.truncate(wanted);
        }

        info!(
            %cycle_id,
            policy = %snapshot.name,
            selected = selected.len(),
            filtered_out = filtered_out.len(),
            "Scheduling cycle complete"
        );

        Ok(ScheduleDecision {
            cycle_id,
            policy_name: snapshot.name.clone(),
            decided_at: Utc::now(),
            pre_filter: pre_filter.code(),
            pre_filter_plugin: pre_filter.plugin().to_string(),
            selected,
            filtered_out,
        })
    }

    /// Evaluate every cluster on a bounded set of tasks
    ///
    /// The first error aborts the remaining tasks.
    async fn evaluate<T, F>(
        &self,
        clusters: Vec<Arc<MemberCluster>>,
        token: &CancellationToken,
        eval: F,
    ) -> Result<Vec<(Arc<MemberCluster>, T)>>
    where
        T: Send + 'static,
        F: Fn(&MemberCluster) -> Result<T> + Send + Sync + 'static,
    {
        let eval = Arc::new(eval);
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut tasks = JoinSet::new();

        for cluster in clusters {
            let eval = eval.clone();
            let semaphore = semaphore.clone();
            let token = token.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    SchedulerError::internal_error(format!("evaluation semaphore closed: {}", e))
                })?;
                ensure_active(&token)?;
                let out = (*eval)(cluster.as_ref())?;
                Ok::<_, SchedulerError>((cluster, out))
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tasks.abort_all();
                    return Err(SchedulerError::cancelled("cycle cancelled by caller"));
                }
                next = tasks.join_next() => match next {
                    None => break,
                    Some(Ok(Ok(item))) => results.push(item),
                    Some(Ok(Err(e))) => {
                        tasks.abort_all();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        tasks.abort_all();
                        return Err(SchedulerError::internal_error(format!(
                            "evaluation task failed: {}",
                            e
                        )));
                    }
                },
            }
        }

        Ok(results)
    }
}

fn ensure_active(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(SchedulerError::cancelled("cycle cancelled by caller"))
    } else {
        Ok(())
    }
}
