use crate::Result;
use flotilla_core::MemberCluster;
use parking_lot::RwLock;

/// Provides the member clusters a cycle schedules over
pub trait ClusterSource: Send + Sync {
    /// Snapshot of the current member clusters, including leaving ones
    fn list_clusters(&self) -> Result<Vec<MemberCluster>>;
}

/// In-memory cluster source
#[derive(Debug, Default)]
pub struct StaticClusterSource {
    clusters: RwLock<Vec<MemberCluster>>,
}

impl StaticClusterSource {
    pub fn new(clusters: Vec<MemberCluster>) -> Self {
        Self {
            clusters: RwLock::new(clusters),
        }
    }

    /// Replace every cluster
    pub fn set_clusters(&self, clusters: Vec<MemberCluster>) {
        *self.clusters.write() = clusters;
    }

    /// Insert a cluster or replace the one with the same name
    pub fn upsert(&self, cluster: MemberCluster) {
        let mut clusters = self.clusters.write();
        match clusters.iter_mut().find(|c| c.name() == cluster.name()) {
            Some(existing) => *existing = cluster,
            None => clusters.push(cluster),
        }
    }

    /// Remove a cluster by name, returning whether it existed
    pub fn remove(&self, name: &str) -> bool {
        let mut clusters = self.clusters.write();
        let before = clusters.len();
        clusters.retain(|c| c.name() != name);
        clusters.len() != before
    }
}

impl ClusterSource for StaticClusterSource {
    fn list_clusters(&self) -> Result<Vec<MemberCluster>> {
        Ok(self.clusters.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_core::ClusterState;

    #[test]
    fn test_upsert_and_remove() {
        let source = StaticClusterSource::default();
        source.upsert(MemberCluster::new("member-1", [("region", "us-west")]));
        source.upsert(MemberCluster::new("member-2", [("region", "us-east")]));

        let mut leaving = MemberCluster::new("member-1", [("region", "us-west")]);
        leaving.state = ClusterState::Leave;
        source.upsert(leaving);

        let clusters = source.list_clusters().unwrap();
        assert_eq!(clusters.len(), 2);
        assert!(!clusters[0].is_joined());

        assert!(source.remove("member-2"));
        assert!(!source.remove("member-2"));
        assert_eq!(source.list_clusters().unwrap().len(), 1);
    }

    #[test]
    fn test_set_clusters() {
        let source = StaticClusterSource::new(vec![MemberCluster::new("member-1", [("a", "b")])]);
        source.set_clusters(vec![]);
        assert!(source.list_clusters().unwrap().is_empty());
    }
}
