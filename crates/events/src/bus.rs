//! In-process event bus with per-subscriber queues.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`JobEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.
//!
//! Every subscriber owns a bounded `mpsc` queue and a
//! [`SubscriptionFilter`]. Publishing never waits on a subscriber. When a
//! queue is full, a broadcast subscriber misses that event, while a per-job
//! subscriber is removed so its receiver sees the end of the queue and can
//! resynchronise. A closed queue removes the subscriber from the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gauntlet_core::types::JobId;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::event::JobEvent;

/// Default per-subscriber queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Identifier assigned to each subscriber on registration.
pub type SubscriberId = u64;

/// Which events a subscriber wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Every event, including process-wide ones.
    All,
    /// Only events tagged with this job id.
    Job(JobId),
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &JobEvent) -> bool {
        match self {
            Self::All => true,
            Self::Job(id) => event.job_id() == Some(*id),
        }
    }
}

struct Subscription {
    filter: SubscriptionFilter,
    sender: mpsc::Sender<Arc<JobEvent>>,
}

/// Receiving end of a subscription.
///
/// Dropping it closes the queue; the bus prunes the registration on its
/// next delivery attempt. Call [`EventBus::unsubscribe`] to remove it
/// eagerly.
pub struct Subscriber {
    id: SubscriberId,
    filter: SubscriptionFilter,
    receiver: mpsc::Receiver<Arc<JobEvent>>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn filter(&self) -> SubscriptionFilter {
        self.filter
    }

    /// Wait for the next event. Returns `None` once the bus has dropped
    /// this subscriber, either on unsubscribe or after a per-job queue
    /// overflowed.
    pub async fn recv(&mut self) -> Option<Arc<JobEvent>> {
        self.receiver.recv().await
    }

    /// Hand over the raw queue, e.g. to wrap it in a stream.
    pub fn into_receiver(self) -> mpsc::Receiver<Arc<JobEvent>> {
        self.receiver
    }
}

/// Fan-out hub for job events.
pub struct EventBus {
    subscribers: RwLock<HashMap<SubscriberId, Subscription>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl EventBus {
    /// Create a bus whose subscribers each buffer up to `queue_capacity`
    /// undelivered events.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Subscribe to every event published on this bus.
    pub fn subscribe_broadcast(&self) -> Subscriber {
        self.subscribe(SubscriptionFilter::All)
    }

    /// Subscribe to the events of a single job.
    pub fn subscribe_filtered(&self, job_id: JobId) -> Subscriber {
        self.subscribe(SubscriptionFilter::Job(job_id))
    }

    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscriber {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.queue_capacity);

        self.subscribers
            .write()
            .insert(id, Subscription { filter, sender });
        tracing::debug!(subscriber_id = id, ?filter, "Subscriber registered");

        Subscriber {
            id,
            filter,
            receiver,
        }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::debug!(subscriber_id = id, "Subscriber removed");
        }
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: JobEvent) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0;
        let mut closed = Vec::new();
        let mut overflowed = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, sub) in subscribers.iter() {
                if !sub.filter.matches(&event) {
                    continue;
                }
                match sub.sender.try_send(Arc::clone(&event)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => match sub.filter {
                        SubscriptionFilter::All => {
                            tracing::warn!(
                                subscriber_id = id,
                                event_type = event.kind(),
                                "Subscriber queue full, dropping event",
                            );
                        }
                        SubscriptionFilter::Job(job_id) => {
                            tracing::warn!(
                                subscriber_id = id,
                                %job_id,
                                event_type = event.kind(),
                                "Job subscriber queue full, closing subscription",
                            );
                            overflowed.push(*id);
                        }
                    },
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() || !overflowed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in closed.iter().chain(&overflowed) {
                subscribers.remove(id);
            }
            tracing::debug!(
                pruned = closed.len(),
                overflowed = overflowed.len(),
                "Pruned subscribers",
            );
        }

        delivered
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Removes a subscription from its bus when dropped.
///
/// Held by streaming endpoints whose consumer task can end at any await
/// point, e.g. when the client disconnects mid-stream.
pub struct SubscriptionGuard {
    bus: Arc<EventBus>,
    id: SubscriberId,
}

impl SubscriptionGuard {
    pub fn new(bus: Arc<EventBus>, id: SubscriberId) -> Self {
        Self { bus, id }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gauntlet_core::types::new_job_id;
    use gauntlet_store::models::JobStats;

    use super::*;
    use crate::event::LogLevel;

    fn log(job_id: JobId, message: &str) -> JobEvent {
        JobEvent::Log {
            job_id,
            level: LogLevel::Info,
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn broadcast_subscribers_receive_every_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe_broadcast();
        let mut rx2 = bus.subscribe_broadcast();

        let a = new_job_id();
        let b = new_job_id();
        assert_eq!(bus.publish(log(a, "a")), 2);
        assert_eq!(bus.publish(log(b, "b")), 2);

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await.unwrap().job_id(), Some(a));
            assert_eq!(rx.recv().await.unwrap().job_id(), Some(b));
        }
    }

    #[tokio::test]
    async fn filtered_subscriber_only_sees_its_job() {
        let bus = EventBus::default();
        let x = new_job_id();
        let y = new_job_id();
        let mut rx = bus.subscribe_filtered(x);

        assert_eq!(bus.publish(log(y, "other")), 0);
        assert_eq!(bus.publish(log(x, "mine")), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id(), Some(x));
        assert_matches::assert_matches!(rx.receiver.try_recv(), Err(_));
    }

    #[tokio::test]
    async fn stats_updates_skip_filtered_subscribers() {
        let bus = EventBus::default();
        let mut filtered = bus.subscribe_filtered(new_job_id());
        let mut all = bus.subscribe_broadcast();

        assert_eq!(bus.publish(JobEvent::StatsUpdate(JobStats::default())), 1);
        assert!(all.recv().await.is_some());
        assert!(filtered.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn per_job_order_is_preserved() {
        let bus = EventBus::default();
        let id = new_job_id();
        let mut rx = bus.subscribe_filtered(id);

        for i in 0..50 {
            bus.publish(log(id, &i.to_string()));
        }
        for i in 0..50 {
            match rx.recv().await.as_deref() {
                Some(JobEvent::Log { message, .. }) => assert_eq!(message, &i.to_string()),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_on_publish() {
        let bus = EventBus::default();
        let dropped = bus.subscribe_broadcast();
        let mut alive = bus.subscribe_broadcast();
        assert_eq!(bus.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(bus.publish(log(new_job_id(), "x")), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert!(alive.recv().await.is_some());
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking_others() {
        let bus = EventBus::new(2);
        let _stalled = bus.subscribe_broadcast();
        let mut healthy = bus.subscribe_broadcast();
        let id = new_job_id();

        for i in 0..5 {
            bus.publish(log(id, &i.to_string()));
            // Keep the healthy subscriber drained.
            assert!(healthy.recv().await.is_some());
        }

        // The stalled subscriber stays registered; it just missed events.
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn full_job_queue_closes_subscription() {
        let bus = EventBus::new(2);
        let id = new_job_id();
        let mut rx = bus.subscribe_filtered(id);

        for i in 0..3 {
            bus.publish(log(id, &i.to_string()));
        }
        assert_eq!(bus.subscriber_count(), 0);

        // Buffered events drain, then the queue reports its end instead of
        // waiting for a terminal event that will never arrive.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn unsubscribe_removes_registration() {
        let bus = EventBus::default();
        let sub = bus.subscribe_broadcast();
        bus.unsubscribe(sub.id());
        bus.unsubscribe(9999);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn guard_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::default());
        let sub = bus.subscribe_filtered(new_job_id());
        let guard = SubscriptionGuard::new(Arc::clone(&bus), sub.id());
        assert_eq!(bus.subscriber_count(), 1);

        drop(guard);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(log(new_job_id(), "orphan")), 0);
    }
}
