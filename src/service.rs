//! Discovery service facade used by the transport layer.
//!
//! Validates identifiers, maps absence to not-found errors and logs each
//! request; all state lives in the shared [`Registry`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::StateConfig;
use crate::error::{Error, Result};
use crate::state::{AffiliateExport, Endpoint, GcStats, Registry};
use crate::validate;
use crate::watch::Watch;

/// Boundary operations over the affiliate store.
///
/// Cloning is cheap; all clones share the same [`Registry`].
///
/// ```ignore
/// let service = Service::new(StateConfig::default());
/// service.add_endpoints(cluster, key, vec!["10.0.0.1".parse::<IpAddr>()?.into()])?;
/// let mut watch = service.watch(cluster)?;
/// while let Some(event) = watch.next().await { /* ... */ }
/// ```
#[derive(Debug, Clone)]
pub struct Service {
    registry: Arc<Registry>,
}

impl Default for Service {
    fn default() -> Self {
        Self::new(StateConfig::default())
    }
}

impl Service {
    /// Create a service with its own registry.
    pub fn new(config: StateConfig) -> Self {
        Self::from_registry(Arc::new(Registry::with_config(config)))
    }

    /// Wrap an existing registry.
    pub fn from_registry(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// List the affiliates of a cluster.
    pub fn list(&self, cluster_id: &str) -> Result<Vec<AffiliateExport>> {
        validate::cluster_id(cluster_id)?;

        let cluster = self
            .registry
            .get(cluster_id)
            .ok_or_else(|| Error::ClusterNotFound(cluster_id.to_string()))?;
        let affiliates = cluster.list();

        info!(cluster = %cluster_id, count = affiliates.len(), "listing cluster affiliates");
        Ok(affiliates)
    }

    /// Fetch a single affiliate.
    pub fn get(&self, cluster_id: &str, affiliate_id: &str) -> Result<AffiliateExport> {
        validate::cluster_id(cluster_id)?;
        validate::affiliate_id(affiliate_id)?;

        let cluster = self
            .registry
            .get(cluster_id)
            .ok_or_else(|| Error::ClusterNotFound(cluster_id.to_string()))?;
        let affiliate = cluster
            .get(affiliate_id)
            .ok_or_else(|| Error::affiliate_not_found(cluster_id, affiliate_id))?;

        debug!(
            cluster = %cluster_id,
            affiliate = %affiliate_id,
            endpoints = ?endpoint_strings(&affiliate.endpoints),
            "returning affiliate"
        );
        Ok(affiliate)
    }

    /// Merge endpoints into an affiliate, creating it if absent.
    pub fn add_endpoints(
        &self,
        cluster_id: &str,
        affiliate_id: &str,
        endpoints: Vec<Endpoint>,
    ) -> Result<()> {
        validate::cluster_id(cluster_id)?;
        validate::affiliate_id(affiliate_id)?;

        info!(
            cluster = %cluster_id,
            affiliate = %affiliate_id,
            endpoints = ?endpoint_strings(&endpoints),
            "add affiliate endpoints"
        );
        self.registry
            .with_affiliate(cluster_id, affiliate_id, |a| a.add_endpoints(endpoints));
        Ok(())
    }

    /// Replace an affiliate's endpoint set, creating it if absent.
    pub fn set_endpoints(
        &self,
        cluster_id: &str,
        affiliate_id: &str,
        endpoints: Vec<Endpoint>,
    ) -> Result<()> {
        validate::cluster_id(cluster_id)?;
        validate::affiliate_id(affiliate_id)?;

        info!(
            cluster = %cluster_id,
            affiliate = %affiliate_id,
            endpoints = ?endpoint_strings(&endpoints),
            "set affiliate endpoints"
        );
        self.registry
            .with_affiliate(cluster_id, affiliate_id, |a| a.set_endpoints(endpoints));
        Ok(())
    }

    /// Delete an affiliate. Deleting an unknown affiliate succeeds.
    pub fn delete(&self, cluster_id: &str, affiliate_id: &str) -> Result<()> {
        validate::cluster_id(cluster_id)?;
        validate::affiliate_id(affiliate_id)?;

        info!(cluster = %cluster_id, affiliate = %affiliate_id, "delete affiliate");
        self.registry.delete_affiliate(cluster_id, affiliate_id);
        Ok(())
    }

    /// Watch a cluster: initial snapshot, then live updates.
    ///
    /// Watching an unknown cluster creates it, so a node can wait for its peers
    /// before any of them has announced itself.
    pub fn watch(&self, cluster_id: &str) -> Result<Watch> {
        validate::cluster_id(cluster_id)?;

        let (tx, rx) = mpsc::channel(self.registry.config().subscription_buffer.max(1));
        let (snapshot, subscription) = self.registry.subscribe(cluster_id, tx);

        info!(cluster = %cluster_id, affiliates = snapshot.len(), "watching cluster");
        Ok(Watch::new(snapshot, rx, subscription))
    }

    /// Run one garbage collection sweep now.
    pub fn garbage_collect(&self) -> GcStats {
        self.registry.garbage_collect(Instant::now())
    }
}

fn endpoint_strings(endpoints: &[Endpoint]) -> Vec<String> {
    endpoints.iter().map(ToString::to_string).collect()
}
