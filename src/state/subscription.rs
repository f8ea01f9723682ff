//! Live watcher registrations.

use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use super::cluster::Cluster;
use super::notification::Notification;
use crate::error::DeliveryError;

/// Delivery half of a subscription, held by the cluster.
#[derive(Debug)]
pub(crate) struct Sink {
    tx: mpsc::Sender<Arc<Notification>>,
    err_tx: mpsc::Sender<DeliveryError>,
}

impl Sink {
    /// Non-blocking send. Failures go to the error slot, never back to the writer.
    pub(crate) fn deliver(&self, notification: &Arc<Notification>) {
        let err = match self.tx.try_send(Arc::clone(notification)) {
            Ok(()) => return,
            Err(TrySendError::Full(_)) => DeliveryError::Full,
            Err(TrySendError::Closed(_)) => DeliveryError::Closed,
        };

        warn!(
            affiliate = %notification.affiliate_id,
            error = %err,
            "dropping notification for subscriber"
        );
        // single slot; an earlier unread failure already tells the watcher enough
        let _ = self.err_tx.try_send(err);
    }
}

/// Handle for one watcher of a cluster.
///
/// Dropping the handle unsubscribes it.
#[derive(Debug)]
pub struct Subscription {
    sink: Arc<Sink>,
    cluster: Weak<Cluster>,
    errors: mpsc::Receiver<DeliveryError>,
}

impl Subscription {
    pub(crate) fn new(
        tx: mpsc::Sender<Arc<Notification>>,
        cluster: Weak<Cluster>,
    ) -> (Self, Arc<Sink>) {
        let (err_tx, errors) = mpsc::channel(1);
        let sink = Arc::new(Sink { tx, err_tx });
        let subscription = Self {
            sink: Arc::clone(&sink),
            cluster,
            errors,
        };
        (subscription, sink)
    }

    pub(crate) fn sink(&self) -> &Arc<Sink> {
        &self.sink
    }

    /// Wait for a delivery failure.
    pub async fn error(&mut self) -> Option<DeliveryError> {
        self.errors.recv().await
    }

    /// Check for a delivery failure without waiting.
    pub fn try_error(&mut self) -> Option<DeliveryError> {
        self.errors.try_recv().ok()
    }

    pub(crate) fn poll_error(&mut self, cx: &mut Context<'_>) -> Poll<Option<DeliveryError>> {
        self.errors.poll_recv(cx)
    }

    /// Stop receiving notifications. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        if let Some(cluster) = self.cluster.upgrade() {
            cluster.unsubscribe(self);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_is_reported_once() {
        let (tx, mut rx) = mpsc::channel(1);
        let (mut subscription, sink) = Subscription::new(tx, Weak::new());

        let n = Arc::new(Notification::deletion("a"));
        sink.deliver(&n);
        sink.deliver(&n);
        sink.deliver(&n);

        assert_eq!(subscription.try_error(), Some(DeliveryError::Full));
        assert_eq!(subscription.try_error(), None);
        assert_eq!(rx.try_recv().expect("first delivery").affiliate_id, "a");
    }

    #[test]
    fn closed_receiver_is_reported() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let (mut subscription, sink) = Subscription::new(tx, Weak::new());

        sink.deliver(&Arc::new(Notification::deletion("a")));
        assert_eq!(subscription.try_error(), Some(DeliveryError::Closed));

        // no cluster behind it; must not panic
        subscription.unsubscribe();
        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn error_wakes_a_waiting_watcher() {
        let (tx, _rx) = mpsc::channel(1);
        let (mut subscription, sink) = Subscription::new(tx, Weak::new());

        let waiter = tokio::spawn(async move { subscription.error().await });
        tokio::task::yield_now().await;

        let n = Arc::new(Notification::deletion("a"));
        sink.deliver(&n);
        sink.deliver(&n);

        let got = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("error delivered in time")
            .expect("waiter task");
        assert_eq!(got, Some(DeliveryError::Full));
    }
}
