//! Background garbage collection of the affiliate store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::state::Registry;

/// Periodically sweeps a [`Registry`] on its configured interval.
pub struct Maintenance {
    registry: Arc<Registry>,
    interval: Duration,
    task_handle: Option<JoinHandle<()>>,
}

impl Maintenance {
    /// Create a sweeper using the registry's `gc_interval`.
    pub fn new(registry: Arc<Registry>) -> Self {
        let interval = registry.config().gc_interval;
        Self {
            registry,
            interval,
            task_handle: None,
        }
    }

    /// Override the sweep interval.
    pub fn interval(mut self, d: Duration) -> Self {
        self.interval = d;
        self
    }

    /// Whether the background task is running.
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the background sweep task.
    pub fn start(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        if self.task_handle.is_some() {
            warn!("maintenance already started");
            return;
        }

        let registry = Arc::clone(&self.registry);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            info!(interval = ?period, "starting garbage collection");

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // first tick fires immediately; nothing can have expired yet
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let stats = registry.garbage_collect(Instant::now());
                        if stats.removed_clusters > 0 || stats.expired_affiliates > 0 {
                            info!(
                                clusters = stats.clusters,
                                removed_clusters = stats.removed_clusters,
                                expired_affiliates = stats.expired_affiliates,
                                "garbage collection sweep"
                            );
                        } else {
                            debug!(clusters = stats.clusters, "garbage collection sweep");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("garbage collection shutting down");
                        break;
                    }
                }
            }
        });

        self.task_handle = Some(handle);
    }

    /// Stop the background task.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}
