//! Registry of clusters, created lazily and reclaimed when empty.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::affiliate::{Affiliate, AffiliateExport};
use super::cluster::Cluster;
use super::notification::Notification;
use super::subscription::Subscription;
use crate::config::StateConfig;

/// Totals from one garbage collection sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcStats {
    /// Clusters visited.
    pub clusters: usize,
    /// Clusters dropped from the registry.
    pub removed_clusters: usize,
    /// Affiliates expired across all clusters.
    pub expired_affiliates: usize,
}

/// Process-wide map of cluster id to [`Cluster`].
///
/// Insertion and removal of entries go through the registry's own lock. A sweep
/// only drops a cluster nobody else holds a handle to, so an `Arc<Cluster>`
/// obtained from the registry always stays the registered one.
#[derive(Debug)]
pub struct Registry {
    clusters: Mutex<HashMap<String, Arc<Cluster>>>,
    config: Arc<StateConfig>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry with default settings.
    pub fn new() -> Self {
        Self::with_config(StateConfig::default())
    }

    /// Create an empty registry.
    pub fn with_config(config: StateConfig) -> Self {
        Self {
            clusters: Mutex::new(HashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// Look up a cluster without creating it.
    pub fn get(&self, cluster_id: &str) -> Option<Arc<Cluster>> {
        self.clusters.lock().get(cluster_id).cloned()
    }

    /// Return the cluster, creating an empty one if unknown.
    pub fn get_or_create(&self, cluster_id: &str) -> Arc<Cluster> {
        let mut clusters = self.clusters.lock();
        if let Some(cluster) = clusters.get(cluster_id) {
            return Arc::clone(cluster);
        }

        debug!(cluster = %cluster_id, "cluster created");
        let cluster = Arc::new(Cluster::new(cluster_id, Arc::clone(&self.config)));
        clusters.insert(cluster_id.to_string(), Arc::clone(&cluster));
        cluster
    }

    /// All currently registered clusters.
    pub fn clusters(&self) -> Vec<Arc<Cluster>> {
        self.clusters.lock().values().cloned().collect()
    }

    /// Number of registered clusters.
    pub fn len(&self) -> usize {
        self.clusters.lock().len()
    }

    /// `true` when no clusters are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against an affiliate, creating the cluster and affiliate as needed.
    pub fn with_affiliate<F>(&self, cluster_id: &str, affiliate_id: &str, f: F)
    where
        F: FnOnce(&mut Affiliate),
    {
        self.get_or_create(cluster_id).with_affiliate(affiliate_id, f);
    }

    /// Delete an affiliate. Unknown clusters and affiliates are ignored.
    pub fn delete_affiliate(&self, cluster_id: &str, affiliate_id: &str) {
        if let Some(cluster) = self.get(cluster_id) {
            cluster.delete_affiliate(affiliate_id);
        }
    }

    /// Subscribe to a cluster, creating it if unknown.
    pub fn subscribe(
        &self,
        cluster_id: &str,
        tx: mpsc::Sender<Arc<Notification>>,
    ) -> (Vec<AffiliateExport>, Subscription) {
        self.get_or_create(cluster_id).subscribe(tx)
    }

    /// Garbage collect every cluster and drop the ones left empty and unwatched.
    ///
    /// A cluster someone still holds a handle to is kept until a later sweep.
    pub fn garbage_collect(&self, now: Instant) -> GcStats {
        let clusters = self.clusters();
        let mut stats = GcStats {
            clusters: clusters.len(),
            ..GcStats::default()
        };

        for cluster in clusters {
            let collected = cluster.collect(now);
            stats.expired_affiliates += collected.removed;
            if !collected.empty {
                continue;
            }

            let mut map = self.clusters.lock();
            let current = map
                .get(cluster.id())
                .is_some_and(|c| Arc::ptr_eq(c, &cluster));
            // the map and this loop hold the only handles
            let unshared = Arc::strong_count(&cluster) == 2;
            if current && unshared && cluster.is_idle() {
                map.remove(cluster.id());
                stats.removed_clusters += 1;
                debug!(cluster = %cluster.id(), "cluster removed");
            }
        }

        stats
    }
}
