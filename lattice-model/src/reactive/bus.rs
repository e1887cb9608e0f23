//! Event Bus
//!
//! The bus is shared by the whole model instance. Components publish on
//! `<verb> <member>` topics and any component may subscribe.
//!
//! # Dispatch
//!
//! Publishing is synchronous. The subscriber list of a topic is copied
//! before the first handler runs, so handlers may subscribe, unsubscribe and
//! publish freely:
//!
//! - a handler added during dispatch is not called for the in-flight event
//! - a handler removed during dispatch is not called afterwards
//! - every other handler is called exactly once, in subscription order
//!
//! No lock is held while a handler runs.

use dashmap::DashMap;
use smallvec::SmallVec;

use crate::collection::Record;

use super::subscriber::{Handler, Subscription, SubscriptionId};
use super::topic::{Topic, Verb};

/// Data carried alongside a topic.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Scalar field updates and lifecycle events carry nothing; consumers
    /// re-read the current state.
    None,
    /// The record added to or removed from a collection.
    Record(Record),
    /// A record whose field changed.
    RecordField { record: Record, field: String },
}

impl Payload {
    /// The record carried by a collection event.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::None => None,
            Self::Record(record) | Self::RecordField { record, .. } => Some(record),
        }
    }

    /// The changed field of a record update.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::RecordField { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub topic: Topic,
    pub payload: Payload,
}

impl Event {
    pub fn new(topic: Topic, payload: Payload) -> Self {
        Self { topic, payload }
    }
}

type Snapshot = SmallVec<[Subscription; 4]>;

/// Topic-keyed publish/subscribe hub.
#[derive(Debug, Default)]
pub struct EventBus {
    topics: DashMap<Topic, Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler` to `topic`. Handlers of a topic run in the order they
    /// were attached.
    pub fn subscribe(&self, topic: Topic, handler: Handler) -> SubscriptionId {
        let subscription = Subscription::new(handler);
        let id = subscription.id();
        self.topics.entry(topic).or_default().push(subscription);
        id
    }

    /// Detach one subscription. Returns `false` if it was not attached to
    /// `topic`.
    pub fn unsubscribe(&self, topic: &Topic, id: SubscriptionId) -> bool {
        let removed = match self.topics.get_mut(topic) {
            Some(mut subscriptions) => {
                match subscriptions.iter().position(|s| s.id() == id) {
                    Some(index) => {
                        subscriptions.remove(index).deactivate();
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };
        if removed {
            self.topics.remove_if(topic, |_, subscriptions| subscriptions.is_empty());
        }
        removed
    }

    /// Detach every subscription of `topic`. Returns how many were removed.
    pub fn clear_topic(&self, topic: &Topic) -> usize {
        match self.topics.remove(topic) {
            Some((_, subscriptions)) => {
                for subscription in &subscriptions {
                    subscription.deactivate();
                }
                subscriptions.len()
            }
            None => 0,
        }
    }

    /// Detach the data topics (`added`, `updated`, `removed`) of a member.
    pub fn clear_member(&self, member: &str) -> usize {
        Verb::DATA
            .iter()
            .map(|verb| self.clear_topic(&Topic::new(*verb, member)))
            .sum()
    }

    /// Publish an event to the subscribers of `topic`, then to the
    /// any-member subscribers of its verb.
    pub fn publish(&self, topic: Topic, payload: Payload) {
        let mut snapshot = self.snapshot(&topic);
        if !topic.is_any() {
            snapshot.extend(self.snapshot(&Topic::any(topic.verb())));
        }

        tracing::trace!(
            topic = %topic,
            subscribers = snapshot.len(),
            "publish"
        );

        if snapshot.is_empty() {
            return;
        }

        let event = Event::new(topic, payload);
        for subscription in &snapshot {
            subscription.notify(&event);
        }
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map(|s| s.len()).unwrap_or(0)
    }

    /// Number of subscriptions across all topics.
    pub fn total_subscriptions(&self) -> usize {
        self.topics.iter().map(|entry| entry.value().len()).sum()
    }

    fn snapshot(&self, topic: &Topic) -> Snapshot {
        self.topics
            .get(topic)
            .map(|subscriptions| subscriptions.iter().cloned().collect())
            .unwrap_or_default()
    }
}
