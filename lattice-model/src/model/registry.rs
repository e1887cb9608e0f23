//! Member Registry
//!
//! The registry is the single authority on what a name means. Every other
//! component asks it before touching a member: the value store for field
//! descriptors, the bridge for datasources, the dependency engine to resolve
//! watch specifiers.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::collection::Datasource;
use crate::error::{ModelError, Result};
use crate::field::Field;
use crate::reactive::{Payload, Topic, Verb};

use super::{Behavior, MemberKind, MemberType, Model};

/// Names owned by the model type. They name its own capabilities and can
/// never be used for members.
pub const RESERVED_NAMES: &[&str] = &[
    "bus",
    "calc",
    "calc_targets",
    "call",
    "clear",
    "collection",
    "emit",
    "extend",
    "get",
    "is_calc",
    "member_names",
    "member_type",
    "off",
    "on",
    "remove",
    "set",
    "snapshot",
    "uncalc",
    "watch_descriptors",
];

fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// `.` separates watch specifier parts, whitespace separates topic parts
/// and `*` is the any-member topic.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c == '.' || c == '*' || c.is_whitespace())
}

/// Name → kind map, in insertion order.
#[derive(Debug, Default)]
pub(crate) struct MemberRegistry {
    members: RwLock<IndexMap<String, MemberKind>>,
}

impl MemberRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn classify(&self, name: &str) -> MemberType {
        match self.members.read().get(name) {
            Some(member) => member.member_type(),
            None if is_reserved(name) => MemberType::Reserved,
            None => MemberType::Unused,
        }
    }

    pub(crate) fn field(&self, name: &str) -> Option<Field> {
        match self.members.read().get(name) {
            Some(MemberKind::Field(field)) => Some(field.clone()),
            _ => None,
        }
    }

    pub(crate) fn collection(&self, name: &str) -> Option<Datasource> {
        match self.members.read().get(name) {
            Some(MemberKind::Collection(datasource)) => Some(datasource.clone()),
            _ => None,
        }
    }

    pub(crate) fn behavior(&self, name: &str) -> Option<Behavior> {
        match self.members.read().get(name) {
            Some(MemberKind::Behavior(behavior)) => Some(behavior.clone()),
            _ => None,
        }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.members.read().keys().cloned().collect()
    }

    /// Snapshot of every member, in insertion order.
    pub(crate) fn members(&self) -> Vec<(String, MemberKind)> {
        self.members
            .read()
            .iter()
            .map(|(name, member)| (name.clone(), member.clone()))
            .collect()
    }
}

impl Model {
    /// Add a member.
    ///
    /// Fails with [`ModelError::NameConflict`] if `name` is already a member
    /// or reserved, and with [`ModelError::InvalidName`] if it cannot be
    /// addressed by topics and watch specifiers. Nothing is changed on
    /// failure. On success publishes `extended <name>`.
    pub fn extend(&self, name: &str, member: impl Into<MemberKind>) -> Result<()> {
        let member = member.into();
        if !is_valid_name(name) {
            return Err(ModelError::InvalidName {
                name: name.to_string(),
            });
        }

        let member_type = member.member_type();
        {
            let inner = self.inner();
            let mut members = inner.registry.members.write();
            if is_reserved(name) || members.contains_key(name) {
                return Err(ModelError::NameConflict {
                    name: name.to_string(),
                });
            }
            match &member {
                MemberKind::Field(_) => inner.store.insert(name),
                MemberKind::Collection(datasource) => inner.bridge.attach(self, name, datasource),
                MemberKind::Behavior(_) => {}
            }
            members.insert(name.to_string(), member);
        }

        tracing::debug!(member = %name, kind = ?member_type, "member extended");
        self.emit(Topic::new(Verb::Extended, name), Payload::None);
        Ok(())
    }

    /// Classify `name`.
    pub fn member_type(&self, name: &str) -> MemberType {
        self.inner().registry.classify(name)
    }

    /// Names of all members, in the order they were added.
    pub fn member_names(&self) -> Vec<String> {
        self.inner().registry.names()
    }

    /// Remove a member.
    ///
    /// Detaches the member's own event relays, clears every subscription on
    /// its `added`, `updated` and `removed` topics and tears down every
    /// derivation that targets or watches it. Publishes `removed <name>`
    /// afterwards. Returns `false` if `name` is not a member.
    pub fn remove(&self, name: &str) -> bool {
        let inner = self.inner();
        let member_type = {
            let mut members = inner.registry.members.write();
            let Some(member) = members.shift_remove(name) else {
                return false;
            };
            match &member {
                MemberKind::Field(_) => inner.store.remove(name),
                MemberKind::Collection(datasource) => {
                    inner.bridge.detach(name, datasource);
                }
                MemberKind::Behavior(_) => {}
            }
            member.member_type()
        };

        let cleared = inner.bus.clear_member(name);
        let cascaded = self.uncalc_referencing(name);

        tracing::debug!(
            member = %name,
            kind = ?member_type,
            subscriptions = cleared,
            derivations = cascaded,
            "member removed"
        );
        self.emit(Topic::new(Verb::Removed, name), Payload::None);
        true
    }

    /// Remove every member.
    pub fn clear(&self) {
        let names = self.member_names();
        tracing::debug!(members = names.len(), "clearing model");
        for name in names {
            self.remove(&name);
        }
    }

    /// The datasource lent to this model as `name`.
    pub fn collection(&self, name: &str) -> Option<Datasource> {
        self.inner().registry.collection(name)
    }

    /// Invoke the behavior `name`.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let behavior = self
            .inner()
            .registry
            .behavior(name)
            .ok_or_else(|| ModelError::NotABehavior {
                name: name.to_string(),
            })?;
        behavior.call(self, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn lifecycle_log(model: &Model) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for verb in [Verb::Extended, Verb::Removed] {
            let log = log.clone();
            model.on(Topic::any(verb), move |event| {
                log.lock().push(event.topic.to_string());
            });
        }
        log
    }

    #[test]
    fn extend_classifies_each_kind() {
        let model = Model::new();
        model.extend("counter", FieldKind::Number).unwrap();
        model
            .extend("orders", Datasource::new([("amount", FieldKind::Number)]))
            .unwrap();
        model
            .extend("ping", Behavior::new(|_, _| Ok(json!("pong"))))
            .unwrap();

        assert_eq!(model.member_type("counter"), MemberType::Field);
        assert_eq!(model.member_type("orders"), MemberType::Collection);
        assert_eq!(model.member_type("ping"), MemberType::Behavior);
        assert_eq!(model.member_type("extend"), MemberType::Reserved);
        assert_eq!(model.member_type("nothing"), MemberType::Unused);
        assert_eq!(model.member_names(), vec!["counter", "orders", "ping"]);
    }

    #[test]
    fn extend_rejects_taken_and_reserved_names() {
        let model = Model::new();
        model.extend("counter", FieldKind::Number).unwrap();

        assert!(matches!(
            model.extend("counter", FieldKind::Text),
            Err(ModelError::NameConflict { .. })
        ));
        assert!(matches!(
            model.extend("calc", FieldKind::Text),
            Err(ModelError::NameConflict { .. })
        ));
        assert_eq!(model.member_type("calc"), MemberType::Reserved);
    }

    #[test]
    fn extend_rejects_unaddressable_names() {
        let model = Model::new();
        for name in ["", "a.b", "a b", "*"] {
            assert!(matches!(
                model.extend(name, FieldKind::Any),
                Err(ModelError::InvalidName { .. })
            ));
        }
        assert!(model.member_names().is_empty());
    }

    #[test]
    fn failed_extend_leaves_no_trace() {
        let model = Model::new();
        let orders = Datasource::new([("amount", FieldKind::Number)]);
        model.extend("orders", FieldKind::Number).unwrap();
        let log = lifecycle_log(&model);

        assert!(model.extend("orders", orders.clone()).is_err());

        assert_eq!(orders.listener_count(), 0);
        assert_eq!(model.member_type("orders"), MemberType::Field);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn lifecycle_events_are_published() {
        let model = Model::new();
        let log = lifecycle_log(&model);

        model.extend("counter", FieldKind::Number).unwrap();
        assert!(model.remove("counter"));
        assert!(!model.remove("counter"));

        assert_eq!(*log.lock(), vec!["extended counter", "removed counter"]);
    }

    #[test]
    fn remove_frees_the_name() {
        let model = Model::new();
        model.extend("counter", FieldKind::Number).unwrap();
        model.set("counter", json!(3)).unwrap();

        assert!(model.remove("counter"));
        assert_eq!(model.member_type("counter"), MemberType::Unused);
        assert_eq!(model.get("counter"), None);

        model.extend("counter", FieldKind::Text).unwrap();
        assert_eq!(model.get("counter"), Some(Value::Null));
    }

    #[test]
    fn remove_clears_member_topics() {
        let model = Model::new();
        model.extend("counter", FieldKind::Number).unwrap();
        model.on(Topic::new(Verb::Updated, "counter"), |_| {});
        assert_eq!(model.bus().total_subscriptions(), 1);

        model.remove("counter");
        assert_eq!(model.bus().total_subscriptions(), 0);
    }

    #[test]
    fn remove_from_inside_own_update_handler() {
        let model = Model::new();
        model.extend("counter", FieldKind::Number).unwrap();
        let weak = model.downgrade();
        model.on(Topic::new(Verb::Updated, "counter"), move |_| {
            if let Some(model) = weak.upgrade() {
                model.remove("counter");
            }
        });

        model.set("counter", json!(1)).unwrap();

        assert_eq!(model.member_type("counter"), MemberType::Unused);
        assert_eq!(model.bus().total_subscriptions(), 0);
    }

    #[test]
    fn clear_removes_everything() {
        let model = Model::new();
        let orders = Datasource::new([("amount", FieldKind::Number)]);
        model.extend("counter", FieldKind::Number).unwrap();
        model.extend("orders", orders.clone()).unwrap();
        model.extend("noop", Behavior::new(|_, _| Ok(Value::Null))).unwrap();

        model.clear();

        assert!(model.member_names().is_empty());
        assert_eq!(orders.listener_count(), 0);
        assert_eq!(model.bus().total_subscriptions(), 0);
    }

    #[test]
    fn call_invokes_behavior_with_model() {
        let model = Model::new();
        model.extend("counter", FieldKind::Number).unwrap();
        model
            .extend(
                "bump",
                Behavior::new(|model, args| {
                    let by = args.first().and_then(Value::as_i64).unwrap_or(1);
                    let current = model.get("counter").and_then(|v| v.as_i64()).unwrap_or(0);
                    model.set("counter", json!(current + by))?;
                    Ok(json!(current + by))
                }),
            )
            .unwrap();

        assert_eq!(model.call("bump", &[]).unwrap(), json!(1));
        assert_eq!(model.call("bump", &[json!(5)]).unwrap(), json!(6));
        assert!(matches!(
            model.call("counter", &[]),
            Err(ModelError::NotABehavior { .. })
        ));
    }

    #[test]
    fn with_members_extends_in_order() {
        let model = Model::with_members([
            ("b", MemberKind::from(FieldKind::Text)),
            ("a", MemberKind::from(FieldKind::Number)),
        ])
        .unwrap();
        assert_eq!(model.member_names(), vec!["b", "a"]);

        let conflict = Model::with_members([("x", FieldKind::Text), ("x", FieldKind::Text)]);
        assert!(conflict.is_err());
    }
}
