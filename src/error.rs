//! Error types for rendezvous-state.

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Cluster identifier is not a valid UUID.
    #[error("cluster ID is not a valid UUID: {0}")]
    InvalidClusterId(String),

    /// Affiliate identifier is not a valid WireGuard public key.
    #[error("affiliate ID is not a valid wireguard key: {0}")]
    InvalidAffiliateId(String),

    /// No cluster with the given identifier is known.
    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    /// The cluster exists but has no affiliate with the given identifier.
    #[error("affiliate {affiliate} not found in cluster {cluster}")]
    AffiliateNotFound {
        /// Cluster that was searched.
        cluster: String,
        /// Affiliate that was missing.
        affiliate: String,
    },

    /// A notification could not be delivered to a watcher.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

impl Error {
    /// Create an affiliate-not-found error.
    pub fn affiliate_not_found<C: Into<String>, A: Into<String>>(cluster: C, affiliate: A) -> Self {
        Self::AffiliateNotFound {
            cluster: cluster.into(),
            affiliate: affiliate.into(),
        }
    }
}

/// Reasons a notification could not be handed to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber's channel was full.
    #[error("subscriber channel is full")]
    Full,

    /// The subscriber's receiving side is gone.
    #[error("subscriber channel is closed")]
    Closed,
}
