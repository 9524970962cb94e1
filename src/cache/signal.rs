//! Collection invalidation signal.
//!
//! A broadcast observable owned by the shared state layer. Publishing means
//! "the post collection in the session cache is stale". Subscriptions are
//! plain values: holding one keeps the listener registered, dropping it
//! unregisters.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use time::OffsetDateTime;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;
use writedesk_api_types::PostId;

use super::config::CacheConfig;

pub(crate) const METRIC_INVALIDATION: &str = "writedesk_cache_invalidation_total";

/// Monotonic sequence number of published invalidations, starting at 1.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotent handling.
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// What made the collection stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A post was created or updated.
    PostSaved { post_id: PostId },
    /// A post was deleted.
    PostDeleted { post_id: PostId },
}

pub struct InvalidationSignal {
    sender: broadcast::Sender<CacheEvent>,
    epoch_counter: AtomicU64,
}

impl InvalidationSignal {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.signal_capacity_non_zero())
    }

    pub fn subscribe(&self) -> Subscription {
        debug!(
            subscribers = self.sender.receiver_count() + 1,
            "Invalidation listener registered"
        );
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Broadcast an invalidation to every current subscriber.
    pub fn publish(&self, kind: EventKind) -> Epoch {
        let epoch = self.epoch_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let event = CacheEvent::new(kind, epoch);

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Post collection invalidated"
        );
        counter!(METRIC_INVALIDATION).increment(1);

        // Sending only fails when nobody is listening, which is fine.
        let delivered = self.sender.send(event).unwrap_or(0);
        debug!(event_epoch = epoch, delivered, "Invalidation delivered");
        epoch
    }

    /// Number of invalidations published so far.
    pub fn published(&self) -> u64 {
        self.epoch_counter.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InvalidationSignal {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// A registered listener. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<CacheEvent>,
}

impl Subscription {
    /// Count pending invalidations without waiting.
    ///
    /// Events lost to a full buffer still count: each one meant the
    /// collection was stale.
    pub fn drain(&mut self) -> usize {
        let mut pending = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    debug!(event_epoch = event.epoch, "Invalidation received");
                    pending += 1;
                }
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Invalidation listener lagged");
                    pending += usize::try_from(missed).unwrap_or(usize::MAX);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return pending,
            }
        }
    }

    /// Wait for the next invalidation. `None` once the signal is gone.
    pub async fn changed(&mut self) -> Option<CacheEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Invalidation listener lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(id: u64) -> EventKind {
        EventKind::PostSaved {
            post_id: PostId::from(id),
        }
    }

    #[test]
    fn epochs_are_monotonic() {
        let signal = InvalidationSignal::new(4);
        let e1 = signal.publish(saved(1));
        let e2 = signal.publish(saved(2));
        assert!(e1 < e2);
        assert_eq!(signal.published(), 2);
    }

    #[test]
    fn subscribers_receive_every_event() {
        let signal = InvalidationSignal::new(8);
        let mut first = signal.subscribe();
        let mut second = signal.subscribe();

        signal.publish(saved(1));
        signal.publish(EventKind::PostDeleted {
            post_id: PostId::from(1),
        });

        assert_eq!(first.drain(), 2);
        assert_eq!(second.drain(), 2);
        assert_eq!(first.drain(), 0);
    }

    #[test]
    fn dropping_a_subscription_unsubscribes() {
        let signal = InvalidationSignal::new(4);
        let subscription = signal.subscribe();
        assert_eq!(signal.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(signal.subscriber_count(), 0);

        // Publishing without listeners is not an error.
        signal.publish(saved(3));
        assert_eq!(signal.published(), 1);
    }

    #[test]
    fn events_before_subscribing_are_not_seen() {
        let signal = InvalidationSignal::new(4);
        signal.publish(saved(1));

        let mut late = signal.subscribe();
        assert_eq!(late.drain(), 0);
    }

    #[test]
    fn lagged_listeners_still_count_missed_events() {
        let signal = InvalidationSignal::new(1);
        let mut subscription = signal.subscribe();
        for id in 0..3 {
            signal.publish(saved(id));
        }
        assert!(subscription.drain() >= 1);
    }

    #[tokio::test]
    async fn changed_resolves_with_the_published_event() {
        let signal = InvalidationSignal::new(4);
        let mut subscription = signal.subscribe();
        signal.publish(saved(9));

        let event = subscription.changed().await.expect("event");
        assert_eq!(event.kind, saved(9));
        assert_eq!(event.epoch, 1);
        assert!(!event.id.is_nil());
    }

    #[tokio::test]
    async fn changed_ends_when_the_signal_is_dropped() {
        let signal = InvalidationSignal::new(4);
        let mut subscription = signal.subscribe();
        drop(signal);
        assert!(subscription.changed().await.is_none());
    }
}
