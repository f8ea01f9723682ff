//! In-memory cluster/affiliate state.
//!
//! - [`Registry`] maps cluster ids to [`Cluster`]s, creating them on first use
//! - [`Cluster`] serializes writes to its [`Affiliate`]s and fans out
//!   [`Notification`]s to [`Subscription`]s
//! - garbage collection expires stale affiliates and reclaims empty clusters

pub mod affiliate;
pub mod cluster;
pub mod notification;
pub mod registry;
pub mod subscription;

pub use affiliate::{Affiliate, AffiliateExport, Endpoint};
pub use cluster::Cluster;
pub use notification::Notification;
pub use registry::{GcStats, Registry};
pub use subscription::Subscription;
