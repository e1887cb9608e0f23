//! Reactive Plumbing
//!
//! This module implements the event bus every model instance owns. Members
//! publish their changes on it and derivations subscribe to it.
//!
//! # Concepts
//!
//! ## Topics
//!
//! A topic names one kind of change of one member: `updated counter`,
//! `added orders`, `set-calc total`. The verb set is closed (see [`Verb`]).
//!
//! ## Subscriptions
//!
//! A subscription attaches a handler to a topic and is identified by a
//! [`SubscriptionId`]. Whoever creates a subscription keeps its id so it can
//! be torn down precisely later; the dependency engine relies on this to
//! remove derivations without touching unrelated handlers.
//!
//! # Implementation Notes
//!
//! Dispatch works on a snapshot of the subscriber list, so handlers can
//! re-enter the bus (publish, subscribe, unsubscribe) without corrupting the
//! iteration in progress.

mod bus;
mod subscriber;
mod topic;

pub use bus::{Event, EventBus, Payload};
pub use subscriber::{Handler, SubscriptionId};
pub use topic::{Topic, Verb, ANY_MEMBER};
