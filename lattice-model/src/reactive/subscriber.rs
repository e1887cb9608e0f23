//! Subscription handles for the event bus.
//!
//! A subscription is a handler attached to one topic. Its id is what callers
//! keep to detach it again; the shared `active` flag is what lets an
//! in-flight publish notice that a handler was detached after the publish
//! took its snapshot.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::bus::Event;

/// Unique identifier for a bus subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    /// Allocate the next id. Ids are process-wide and strictly increasing,
    /// so they also order subscriptions by creation across topics.
    pub fn new() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback invoked for every event published on a subscribed topic.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// A handler attached to a topic.
#[derive(Clone)]
pub(crate) struct Subscription {
    id: SubscriptionId,
    handler: Handler,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn new(handler: Handler) -> Self {
        Self {
            id: SubscriptionId::new(),
            handler,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Mark the subscription as detached. Snapshots taken before this call
    /// will skip it.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Invoke the handler if the subscription is still attached.
    pub(crate) fn notify(&self, event: &Event) {
        if self.is_active() {
            (self.handler)(event);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
