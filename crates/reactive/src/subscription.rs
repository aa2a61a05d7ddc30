//! Subscriptions to live query results.
//!
//! The client owns a `Subscription`; the query cache keeps a `Subscriber`, the
//! sending half of that subscription, in its `SubscriberList`. Every update is
//! pushed into a per-subscription channel while the cache state is locked, so a
//! subscription sees updates in the order the executions completed.

use crate::cache::QueryCache;
use crate::live::Shared;
use crate::schema::ResolvedTrigger;
use livesel_core::{ChangeEvent, Error};
use livesel_diff::{Diff, Snapshot};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// A notification delivered to a subscription.
#[derive(Clone, Debug)]
pub enum SubscriptionEvent {
    /// The result changed by `diff`; `snapshot` is the full new result.
    Update {
        diff: Arc<Diff>,
        snapshot: Arc<Snapshot>,
    },
    /// An execution of the query failed. The previous result stays current.
    Error(Arc<Error>),
}

impl SubscriptionEvent {
    /// Returns the diff if this is an update.
    pub fn diff(&self) -> Option<&Diff> {
        match self {
            SubscriptionEvent::Update { diff, .. } => Some(&**diff),
            SubscriptionEvent::Error(_) => None,
        }
    }

    /// Returns the error if this is an error.
    pub fn error(&self) -> Option<&Error> {
        match self {
            SubscriptionEvent::Error(err) => Some(&**err),
            SubscriptionEvent::Update { .. } => None,
        }
    }
}

/// The cache-side half of a subscription.
pub(crate) struct Subscriber {
    id: SubscriptionId,
    triggers: Arc<[ResolvedTrigger]>,
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

impl Subscriber {
    pub(crate) fn new(
        id: SubscriptionId,
        triggers: Arc<[ResolvedTrigger]>,
        tx: mpsc::UnboundedSender<SubscriptionEvent>,
    ) -> Self {
        Self { id, triggers, tx }
    }

    #[inline]
    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns true if any trigger matches the event.
    pub(crate) fn matches(&self, event: &ChangeEvent) -> bool {
        self.triggers.iter().any(|trigger| trigger.matches(event))
    }

    /// Pushes an event. A dropped receiver is not an error: the subscription
    /// is on its way out and will be detached.
    pub(crate) fn notify(&self, event: SubscriptionEvent) {
        let _ = self.tx.send(event);
    }
}

/// The subscribers sharing one query cache, in registration order.
#[derive(Default)]
pub(crate) struct SubscriberList {
    subscribers: Vec<Subscriber>,
}

impl SubscriberList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Removes a subscriber by ID.
    ///
    /// Returns true if the subscriber was found and removed.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let len_before = self.subscribers.len();
        self.subscribers.retain(|sub| sub.id() != id);
        self.subscribers.len() < len_before
    }

    /// Notifies one subscriber.
    pub(crate) fn notify(&self, id: SubscriptionId, event: SubscriptionEvent) {
        if let Some(sub) = self.subscribers.iter().find(|sub| sub.id() == id) {
            sub.notify(event);
        }
    }

    /// Notifies every subscriber.
    pub(crate) fn notify_all(&self, event: &SubscriptionEvent) {
        for sub in &self.subscribers {
            sub.notify(event.clone());
        }
    }

    /// Returns true if any subscriber's triggers match the event.
    pub(crate) fn matches_any(&self, event: &ChangeEvent) -> bool {
        self.subscribers.iter().any(|sub| sub.matches(event))
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.subscribers.clear();
    }
}

/// A client's registration of a live query.
///
/// Updates arrive through [`Subscription::recv`]. Dropping the subscription
/// unregisters it; when the last subscription of a query goes away, the query
/// cache is destroyed.
pub struct Subscription {
    id: SubscriptionId,
    triggers: Arc<[ResolvedTrigger]>,
    cache: Arc<QueryCache>,
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
    owner: Weak<Shared>,
    released: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        triggers: Arc<[ResolvedTrigger]>,
        cache: Arc<QueryCache>,
        rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
        owner: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            triggers,
            cache,
            rx,
            owner,
            released: false,
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the resolved triggers.
    pub fn triggers(&self) -> &[ResolvedTrigger] {
        &self.triggers
    }

    /// Returns the fingerprint of the query cache this subscription reads.
    pub fn fingerprint(&self) -> &str {
        self.cache.fingerprint()
    }

    /// Returns true if a change event touches one of this subscription's
    /// trigger tables.
    pub fn matches_event(&self, event: &ChangeEvent) -> bool {
        self.triggers.iter().any(|trigger| trigger.matches(event))
    }

    /// Returns the latest result of the query.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.cache.snapshot()
    }

    /// Returns true once the query has produced its first result.
    pub fn is_initialized(&self) -> bool {
        self.cache.is_initialized()
    }

    /// Waits for the next update or error.
    ///
    /// Returns `None` once the subscription is unregistered or the query cache
    /// has been destroyed.
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        self.rx.recv().await
    }

    /// Returns the next pending event without waiting.
    pub fn try_recv(&mut self) -> Option<SubscriptionEvent> {
        self.rx.try_recv().ok()
    }

    /// Unregisters this subscription.
    ///
    /// Returns true if it was still registered with its `LiveSelect`.
    pub fn unregister(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        match self.owner.upgrade() {
            Some(shared) => shared.remove_subscription(self.id),
            None => {
                self.cache.detach(self.id);
                false
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("triggers", &self.triggers)
            .field("fingerprint", &self.cache.fingerprint())
            .finish()
    }
}
