//! Topic-based publish/subscribe used by every push-style service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

/// Identifier of a single subscription on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Synchronous, ordered, multi-subscriber event bus.
///
/// `publish` runs handlers on the calling thread in subscription order.
/// The handler list is copied before delivery, so handlers may subscribe or
/// unsubscribe while a payload is in flight.
pub struct EventBus<E> {
    inner: Arc<BusInner<E>>,
}

struct BusInner<E> {
    subscribers: Mutex<Vec<Subscriber<E>>>,
    next_id: AtomicU64,
}

struct Subscriber<E> {
    id: SubscriptionId,
    topic: String,
    handler: Handler<E>,
}

impl<E: 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let topic = topic.into();
        tracing::trace!(topic = %topic, id = id.0, "Subscribed");
        self.inner.subscribers.lock().unwrap().push(Subscriber {
            id,
            topic: topic.clone(),
            handler: Arc::new(handler),
        });

        let inner: Arc<dyn Detach> = self.inner.clone();
        SubscriptionHandle {
            id,
            topic,
            bus: Arc::downgrade(&inner),
        }
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.inner.detach(handle.id)
    }

    /// Deliver `payload` to every subscriber of `topic`; returns how many were notified.
    pub fn publish(&self, topic: &str, payload: &E) -> usize {
        let handlers: Vec<Handler<E>> = self
            .inner
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|sub| sub.topic == topic)
            .map(|sub| sub.handler.clone())
            .collect();

        for handler in &handlers {
            handler(payload);
        }
        tracing::trace!(topic, delivered = handlers.len(), "Published");
        handlers.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|sub| sub.topic == topic)
            .count()
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId) -> bool;
}

impl<E> Detach for BusInner<E> {
    fn detach(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        let before = subscribers.len();
        subscribers.retain(|sub| sub.id != id);
        before != subscribers.len()
    }
}

/// Owned by the subscriber; cancels the subscription on request.
///
/// Dropping the handle does not unsubscribe.
#[derive(Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    topic: String,
    bus: Weak<dyn Detach>,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns `false` if the subscription or its bus no longer exists.
    pub fn cancel(&self) -> bool {
        self.bus
            .upgrade()
            .map(|bus| bus.detach(self.id))
            .unwrap_or(false)
    }
}
