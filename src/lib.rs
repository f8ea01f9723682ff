//! In-memory rendezvous store for mesh peer discovery.
//!
//! Nodes of a cluster publish their identity and endpoints; other members list
//! or watch them. Stale affiliates expire and empty clusters are reclaimed.

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod maintenance;
pub mod service;
pub mod state;
pub mod validate;
pub mod watch;

// Re-export key types
pub use config::StateConfig;
pub use error::{DeliveryError, Error, Result};
pub use maintenance::Maintenance;
pub use service::Service;
pub use state::{
    Affiliate, AffiliateExport, Cluster, Endpoint, GcStats, Notification, Registry, Subscription,
};
pub use watch::{Watch, WatchEvent};
