//! Dependency Engine
//!
//! This module wires derived values to the events they depend on.
//!
//! # Overview
//!
//! [`Model::calc`] registers a derivation: a target, a list of watch
//! specifiers and a formula. The engine resolves the specifiers against the
//! member registry, merges them into one [`WatchDescriptor`] per watched
//! member, and subscribes a recomputation handler to the matching bus
//! topics. The engine stores no values, only the subscriptions of every
//! derivation, keyed by target name.
//!
//! # Recomputation
//!
//! - Field targets are recomputed by assigning `formula(model)` through the
//!   normal write path, so a formula that settles on the same value stops
//!   the chain.
//! - Column targets are recomputed per record with a privileged write that
//!   skips validation and equality but still emits the collection's
//!   `updated` event. A record added to the target collection is computed
//!   on its own; any watched event recomputes every record.
//!
//! A column derivation may not watch its own target column, directly or
//! through `collection.*`: the privileged write would trigger it again
//! without end. `calc` refuses such a derivation.
//!
//! # Teardown
//!
//! Subscriptions are recorded in creation order. [`Model::uncalc`] detaches
//! them all. Removing a member tears down every derivation that targets or
//! watches it, whole.

mod derivation;
mod watch;

pub use derivation::{FieldFormula, Formula, RecordFormula};
pub use watch::{Selector, WatchDescriptor, WatchSpec};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::model::Model;
use crate::reactive::{EventBus, Handler, Payload, Topic, Verb};

use derivation::{handler, Derivation, Reaction, Subscriptions, Target, Trigger};

/// Registered derivations, keyed by target name.
#[derive(Default)]
pub(crate) struct DependencyEngine {
    derivations: Mutex<IndexMap<String, Derivation>>,
}

impl DependencyEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn contains(&self, target: &str) -> bool {
        self.derivations.lock().contains_key(target)
    }

    /// Store a derivation unless one already exists for `target`.
    fn insert(&self, target: &str, derivation: Derivation) -> Result<(), Derivation> {
        let mut derivations = self.derivations.lock();
        if derivations.contains_key(target) {
            return Err(derivation);
        }
        derivations.insert(target.to_string(), derivation);
        Ok(())
    }

    fn take(&self, target: &str) -> Option<Derivation> {
        self.derivations.lock().shift_remove(target)
    }

    fn referencing(&self, member: &str) -> Vec<String> {
        self.derivations
            .lock()
            .iter()
            .filter(|(_, derivation)| derivation.references(member))
            .map(|(target, _)| target.clone())
            .collect()
    }
}

impl std::fmt::Debug for DependencyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyEngine")
            .field("targets", &self.derivations.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Subscriptions created while wiring one derivation.
struct Wiring<'a> {
    bus: &'a EventBus,
    subscriptions: Subscriptions,
}

impl<'a> Wiring<'a> {
    fn new(bus: &'a EventBus) -> Self {
        Self {
            bus,
            subscriptions: Subscriptions::new(),
        }
    }

    fn subscribe(&mut self, verb: Verb, member: &str, handler: Handler) {
        let topic = Topic::new(verb, member);
        let id = self.bus.subscribe(topic.clone(), handler);
        self.subscriptions.push((topic, id));
    }
}

fn detach(bus: &EventBus, subscriptions: &Subscriptions) {
    for (topic, id) in subscriptions {
        bus.unsubscribe(topic, *id);
    }
}

impl Model {
    /// Register a derivation for `target`.
    ///
    /// `target` is a field name or `collection.column`; `watches` are watch
    /// specifiers (see [`WatchSpec`]). The target is computed once
    /// immediately and again whenever a watched event fires.
    ///
    /// Returns `false`, leaving nothing behind, if `target` already has a
    /// derivation, is not a field or declared column, does not fit the
    /// formula's kind, if any specifier does not resolve, if a column target
    /// would be fired by its own writes, or if the initial value of a field
    /// target is rejected by its validator.
    pub fn calc<S: AsRef<str>>(&self, target: &str, watches: &[S], formula: Formula) -> bool {
        let inner = self.inner();
        if inner.engine.contains(target) {
            tracing::debug!(target_member = %target, "derivation already registered");
            return false;
        }
        let Some(resolved) = Target::resolve(self, target) else {
            tracing::debug!(target_member = %target, "derivation target does not resolve");
            return false;
        };
        let Some(descriptors) = watch::resolve_all(self, watches) else {
            tracing::debug!(target_member = %target, "watch specifier does not resolve");
            return false;
        };
        if let Target::Column { collection, column } = &resolved {
            if descriptors
                .get(collection)
                .is_some_and(|descriptor| descriptor.covers_column(column))
            {
                tracing::debug!(
                    target_member = %target,
                    "column derivation watches its own target"
                );
                return false;
            }
        }
        let Some(trigger) = Trigger::new(resolved.clone(), formula) else {
            tracing::debug!(target_member = %target, "formula does not fit target");
            return false;
        };

        let weak = self.downgrade();
        let mut wiring = Wiring::new(&inner.bus);

        if let Target::Column { collection, .. } = &resolved {
            wiring.subscribe(
                Verb::Added,
                collection,
                handler(weak.clone(), trigger.clone(), Reaction::AddedRecord),
            );
        }

        for (member, descriptor) in &descriptors {
            let all = || handler(weak.clone(), trigger.clone(), Reaction::All);
            match descriptor {
                WatchDescriptor::Field => wiring.subscribe(Verb::Updated, member, all()),
                WatchDescriptor::Collection {
                    all_fields,
                    columns,
                } => {
                    wiring.subscribe(Verb::Added, member, all());
                    wiring.subscribe(Verb::Removed, member, all());
                    if *all_fields {
                        wiring.subscribe(Verb::Updated, member, all());
                    } else if !columns.is_empty() {
                        let columns = columns.iter().cloned().collect();
                        wiring.subscribe(
                            Verb::Updated,
                            member,
                            handler(weak.clone(), trigger.clone(), Reaction::Columns(columns)),
                        );
                    }
                }
            }
        }

        let derivation = Derivation {
            target: resolved,
            watches: descriptors,
            subscriptions: wiring.subscriptions,
        };
        let subscription_count = derivation.subscriptions.len();
        if let Err(derivation) = inner.engine.insert(target, derivation) {
            detach(&inner.bus, &derivation.subscriptions);
            return false;
        }

        if let Err(err) = trigger.run_all(self) {
            tracing::debug!(target_member = %target, error = %err, "initial value rejected");
            if let Some(derivation) = inner.engine.take(target) {
                detach(&inner.bus, &derivation.subscriptions);
            }
            return false;
        }

        tracing::debug!(
            target_member = %target,
            subscriptions = subscription_count,
            "derivation registered"
        );
        self.emit(Topic::new(Verb::SetCalc, target), Payload::None);
        true
    }

    /// Tear down the derivation of `target`. Returns `false` if there is
    /// none; on success publishes `unset-calc <target>`.
    pub fn uncalc(&self, target: &str) -> bool {
        let inner = self.inner();
        let Some(derivation) = inner.engine.take(target) else {
            return false;
        };
        detach(&inner.bus, &derivation.subscriptions);
        tracing::debug!(target_member = %target, "derivation removed");
        self.emit(Topic::new(Verb::UnsetCalc, target), Payload::None);
        true
    }

    /// Tear down every derivation that targets or watches `member`.
    pub(crate) fn uncalc_referencing(&self, member: &str) -> usize {
        self.inner()
            .engine
            .referencing(member)
            .iter()
            .filter(|target| self.uncalc(target))
            .count()
    }

    /// Whether `target` has a derivation.
    pub fn is_calc(&self, target: &str) -> bool {
        self.inner().engine.contains(target)
    }

    /// Targets with a derivation, in registration order.
    pub fn calc_targets(&self) -> Vec<String> {
        self.inner().engine.derivations.lock().keys().cloned().collect()
    }

    /// The merged watch descriptors of `target`'s derivation.
    pub fn watch_descriptors(&self, target: &str) -> Option<IndexMap<String, WatchDescriptor>> {
        self.inner()
            .engine
            .derivations
            .lock()
            .get(target)
            .map(|derivation| derivation.watches.clone())
    }
}
