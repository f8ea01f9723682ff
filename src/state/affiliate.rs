//! Affiliate: one node's record within a cluster.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// A reachable address advertised by an affiliate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// A literal IP address.
    Ip(IpAddr),
    /// A symbolic name, resolved by the peer.
    Name(String),
}

impl Endpoint {
    /// Create a symbolic endpoint.
    pub fn name<S: Into<String>>(name: S) -> Self {
        Self::Name(name.into())
    }
}

impl From<IpAddr> for Endpoint {
    fn from(ip: IpAddr) -> Self {
        Self::Ip(ip)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ip(ip) => write!(f, "{ip}"),
            Endpoint::Name(name) => f.write_str(name),
        }
    }
}

/// Immutable copy of an affiliate, safe to hand across the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateExport {
    /// Affiliate identifier.
    pub id: String,
    /// Known endpoints, in the order they were first announced.
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone)]
struct TrackedEndpoint {
    endpoint: Endpoint,
    last_seen: Instant,
}

/// Outcome of expiring a single affiliate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Expiry {
    /// The affiliate is stale and must be dropped.
    pub remove: bool,
    /// Externally visible state changed.
    pub changed: bool,
}

/// A node's record within one cluster.
///
/// Only reachable through [`Cluster::with_affiliate`](super::Cluster::with_affiliate),
/// which holds the cluster's mutation lock for the whole scope.
#[derive(Debug)]
pub struct Affiliate {
    id: String,
    endpoints: Vec<TrackedEndpoint>,
    last_updated: Instant,
    dirty: bool,
}

impl Affiliate {
    pub(crate) fn new(id: impl Into<String>, now: Instant) -> Self {
        Self {
            id: id.into(),
            endpoints: Vec::new(),
            last_updated: now,
            dirty: false,
        }
    }

    /// Affiliate identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Iterate over current endpoints.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().map(|e| &e.endpoint)
    }

    /// Merge endpoints into the set.
    ///
    /// Known endpoints only have their expiry refreshed; any new one marks the
    /// affiliate dirty.
    pub fn add_endpoints<I>(&mut self, endpoints: I)
    where
        I: IntoIterator<Item = Endpoint>,
    {
        let now = self.last_updated;
        for endpoint in endpoints {
            match self.endpoints.iter_mut().find(|e| e.endpoint == endpoint) {
                Some(known) => known.last_seen = now,
                None => {
                    self.endpoints.push(TrackedEndpoint {
                        endpoint,
                        last_seen: now,
                    });
                    self.dirty = true;
                }
            }
        }
    }

    /// Replace the whole endpoint set.
    ///
    /// Duplicates in `endpoints` collapse to their first occurrence. Marks the
    /// affiliate dirty only if the resulting sequence differs.
    pub fn set_endpoints<I>(&mut self, endpoints: I)
    where
        I: IntoIterator<Item = Endpoint>,
    {
        let now = self.last_updated;
        let mut next: Vec<TrackedEndpoint> = Vec::new();
        for endpoint in endpoints {
            if next.iter().all(|e| e.endpoint != endpoint) {
                next.push(TrackedEndpoint {
                    endpoint,
                    last_seen: now,
                });
            }
        }

        let unchanged = next.len() == self.endpoints.len()
            && next
                .iter()
                .zip(&self.endpoints)
                .all(|(a, b)| a.endpoint == b.endpoint);

        if !unchanged {
            self.dirty = true;
        }
        self.endpoints = next;
    }

    /// Run `f` as one mutation: clears the dirty flag and stamps the update time first.
    pub(crate) fn mutate<F>(&mut self, now: Instant, f: F)
    where
        F: FnOnce(&mut Affiliate),
    {
        self.dirty = false;
        self.last_updated = now;
        f(self);
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Copy the externally visible state.
    pub fn export(&self) -> AffiliateExport {
        AffiliateExport {
            id: self.id.clone(),
            endpoints: self.endpoints().cloned().collect(),
        }
    }

    /// Expire the affiliate or its individual endpoints.
    pub(crate) fn garbage_collect(
        &mut self,
        now: Instant,
        affiliate_ttl: Duration,
        endpoint_ttl: Duration,
    ) -> Expiry {
        if now.saturating_duration_since(self.last_updated) > affiliate_ttl {
            return Expiry {
                remove: true,
                changed: true,
            };
        }

        let before = self.endpoints.len();
        self.endpoints
            .retain(|e| now.saturating_duration_since(e.last_seen) <= endpoint_ttl);

        Expiry {
            remove: false,
            changed: self.endpoints.len() != before,
        }
    }
}
