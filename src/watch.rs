//! Stream adapter turning a subscription into snapshot-then-updates events.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{Error, Result};
use crate::state::{AffiliateExport, Notification, Subscription};

/// Event yielded by a [`Watch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Affiliates present when the watch started. Always the first item.
    Snapshot(Vec<AffiliateExport>),
    /// A change committed after the snapshot.
    Update(Arc<Notification>),
}

/// Live view of a cluster.
///
/// Yields the initial snapshot, then every notification in commit order. If a
/// notification had to be dropped the stream yields a single
/// [`Error::Delivery`] and ends; the watcher should start over with a fresh
/// snapshot. Dropping the watch unsubscribes.
#[derive(Debug)]
pub struct Watch {
    snapshot: Option<Vec<AffiliateExport>>,
    notifications: ReceiverStream<Arc<Notification>>,
    subscription: Subscription,
    done: bool,
}

impl Watch {
    pub(crate) fn new(
        snapshot: Vec<AffiliateExport>,
        notifications: tokio::sync::mpsc::Receiver<Arc<Notification>>,
        subscription: Subscription,
    ) -> Self {
        Self {
            snapshot: Some(snapshot),
            notifications: ReceiverStream::new(notifications),
            subscription,
            done: false,
        }
    }
}

impl Stream for Watch {
    type Item = Result<WatchEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }

        if let Some(snapshot) = this.snapshot.take() {
            return Poll::Ready(Some(Ok(WatchEvent::Snapshot(snapshot))));
        }

        if let Poll::Ready(Some(err)) = this.subscription.poll_error(cx) {
            this.done = true;
            this.subscription.unsubscribe();
            return Poll::Ready(Some(Err(Error::Delivery(err))));
        }

        match Pin::new(&mut this.notifications).poll_next(cx) {
            Poll::Ready(Some(notification)) => {
                Poll::Ready(Some(Ok(WatchEvent::Update(notification))))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
