//! Cluster: affiliates and subscribers of one discovery namespace.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::affiliate::{Affiliate, AffiliateExport};
use super::notification::Notification;
use super::subscription::{Sink, Subscription};
use crate::config::StateConfig;


/// Result of a cluster sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Collected {
    pub removed: usize,
    pub empty: bool,
}

/// A collection of affiliates plus the watchers interested in them.
///
/// Affiliates and subscriptions are guarded by separate locks. Whenever both
/// are needed (e.g. [`subscribe`](Cluster::subscribe)) affiliates are locked first.
/// Notifications are handed out while the affiliate lock is held, so every
/// subscriber sees them in commit order; delivery never blocks.
#[derive(Debug)]
pub struct Cluster {
    id: String,
    config: Arc<StateConfig>,
    affiliates: Mutex<HashMap<String, Affiliate>>,
    subscriptions: Mutex<Vec<Arc<Sink>>>,
}

impl Cluster {
    /// Create an empty cluster.
    pub fn new(id: impl Into<String>, config: Arc<StateConfig>) -> Self {
        Self {
            id: id.into(),
            config,
            affiliates: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Cluster identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run `f` against the affiliate `id`, creating it if needed.
    ///
    /// The cluster is locked while `f` runs. A new affiliate always produces a
    /// notification; an existing one only if `f` changed its visible state.
    pub fn with_affiliate<F>(&self, id: &str, f: F)
    where
        F: FnOnce(&mut Affiliate),
    {
        let mut members = self.affiliates.lock();
        let now = Instant::now();

        if let Some(affiliate) = members.get_mut(id) {
            affiliate.mutate(now, f);
            if affiliate.is_dirty() {
                debug!(cluster = %self.id, affiliate = %id, "affiliate updated");
                self.notify(vec![Notification::update(affiliate.export())]);
            } else {
                trace!(cluster = %self.id, affiliate = %id, "affiliate refreshed");
            }
            return;
        }

        let mut affiliate = Affiliate::new(id, now);
        affiliate.mutate(now, f);
        let export = affiliate.export();
        members.insert(id.to_string(), affiliate);

        debug!(cluster = %self.id, affiliate = %id, "affiliate created");
        self.notify(vec![Notification::update(export)]);
    }

    /// Remove an affiliate. Unknown ids are ignored.
    pub fn delete_affiliate(&self, id: &str) {
        let mut members = self.affiliates.lock();

        if members.remove(id).is_some() {
            debug!(cluster = %self.id, affiliate = %id, "affiliate deleted");
            self.notify(vec![Notification::deletion(id)]);
        }
    }

    /// Export one affiliate.
    pub fn get(&self, id: &str) -> Option<AffiliateExport> {
        self.affiliates.lock().get(id).map(Affiliate::export)
    }

    /// Snapshot of all affiliates, taken at a single instant.
    pub fn list(&self) -> Vec<AffiliateExport> {
        let members = self.affiliates.lock();
        members.values().map(Affiliate::export).collect()
    }

    /// Number of affiliates.
    pub fn len(&self) -> usize {
        self.affiliates.lock().len()
    }

    /// `true` when there are no affiliates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Snapshot the affiliates and start delivering notifications to `tx`.
    ///
    /// No write can land between the snapshot and the registration, so the
    /// watcher sees every later change exactly once.
    pub fn subscribe(
        self: &Arc<Self>,
        tx: mpsc::Sender<Arc<Notification>>,
    ) -> (Vec<AffiliateExport>, Subscription) {
        let members = self.affiliates.lock();
        let mut subscriptions = self.subscriptions.lock();

        let snapshot: Vec<_> = members.values().map(Affiliate::export).collect();
        let (subscription, sink) = Subscription::new(tx, Arc::downgrade(self));
        subscriptions.push(sink);

        debug!(
            cluster = %self.id,
            affiliates = snapshot.len(),
            subscribers = subscriptions.len(),
            "subscribed"
        );

        (snapshot, subscription)
    }

    /// Stop delivering to `subscription`. Repeated calls are no-ops.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut subscriptions = self.subscriptions.lock();

        if let Some(pos) = subscriptions
            .iter()
            .position(|s| Arc::ptr_eq(s, subscription.sink()))
        {
            subscriptions.swap_remove(pos);
            debug!(
                cluster = %self.id,
                subscribers = subscriptions.len(),
                "unsubscribed"
            );
        }
    }

    /// Expire stale affiliates and endpoints. Returns `true` if the cluster is now empty.
    pub fn garbage_collect(&self, now: Instant) -> bool {
        self.collect(now).empty
    }

    pub(crate) fn collect(&self, now: Instant) -> Collected {
        let mut members = self.affiliates.lock();
        let affiliate_ttl = self.config.affiliate_ttl;
        let endpoint_ttl = self.config.endpoint_ttl;

        let mut notifications = Vec::new();
        members.retain(|id, affiliate| {
            let expiry = affiliate.garbage_collect(now, affiliate_ttl, endpoint_ttl);
            if expiry.remove {
                notifications.push(Notification::deletion(id.as_str()));
            } else if expiry.changed {
                notifications.push(Notification::update(affiliate.export()));
            }
            !expiry.remove
        });

        let removed = notifications.iter().filter(|n| n.is_deletion()).count();
        if !notifications.is_empty() {
            debug!(
                cluster = %self.id,
                expired = removed,
                changed = notifications.len() - removed,
                "garbage collected"
            );
            self.notify(notifications);
        }

        Collected {
            removed,
            empty: members.is_empty(),
        }
    }

    /// No affiliates and no subscribers.
    pub(crate) fn is_idle(&self) -> bool {
        let members = self.affiliates.lock();
        members.is_empty() && self.subscriptions.lock().is_empty()
    }

    /// Deliver to a copy of the subscriber list, outside the subscription lock.
    fn notify(&self, notifications: Vec<Notification>) {
        let subscriptions = self.subscriptions.lock().clone();
        if subscriptions.is_empty() {
            return;
        }

        for notification in notifications.into_iter().map(Arc::new) {
            for subscription in &subscriptions {
                subscription.deliver(&notification);
            }
        }
    }
}
