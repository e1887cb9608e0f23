//! Model Instances
//!
//! A [`Model`] is a container whose members are added and removed at
//! runtime. Each member is one of three kinds:
//!
//! - a scalar field, holding one validated value
//! - a collection, a [`Datasource`] lent to the model
//! - a behavior, a callable that operates on the model
//!
//! Every instance owns an [`EventBus`]; field writes and collection changes
//! are published on it, and derivations (see [`crate::graph`]) subscribe to
//! it.
//!
//! # Sharing
//!
//! `Model` is a cheap handle: clones share the same instance. Handlers the
//! model installs on its own bus or on lent datasources hold a weak
//! reference, so dropping the last handle frees the instance even while a
//! datasource outlives it.
//!
//! # Locking
//!
//! State is split across a few `parking_lot` locks, one per component. None
//! of them is held while a handler, formula or behavior runs, which is what
//! makes every operation safe to call from inside a handler.

mod bridge;
mod registry;
mod store;

pub use registry::RESERVED_NAMES;

pub(crate) use bridge::CollectionBridge;
pub(crate) use registry::MemberRegistry;
pub(crate) use store::ScalarValueStore;

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collection::Datasource;
use crate::error::Result;
use crate::field::{Field, FieldKind};
use crate::graph::DependencyEngine;
use crate::reactive::{EventBus, Handler, Payload, SubscriptionId, Topic};

/// Signature of a behavior.
pub type BehaviorFn = dyn Fn(&Model, &[Value]) -> Result<Value> + Send + Sync;

/// A callable member.
#[derive(Clone)]
pub struct Behavior(Arc<BehaviorFn>);

impl Behavior {
    /// Wrap a closure as a behavior member.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Model, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the behavior against `model`.
    pub fn call(&self, model: &Model, args: &[Value]) -> Result<Value> {
        (self.0)(model, args)
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior").finish_non_exhaustive()
    }
}

/// What a member is, decided once when it is added.
#[derive(Debug, Clone)]
pub enum MemberKind {
    Field(Field),
    Collection(Datasource),
    Behavior(Behavior),
}

impl MemberKind {
    pub fn member_type(&self) -> MemberType {
        match self {
            Self::Field(_) => MemberType::Field,
            Self::Collection(_) => MemberType::Collection,
            Self::Behavior(_) => MemberType::Behavior,
        }
    }
}

impl From<Field> for MemberKind {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl From<FieldKind> for MemberKind {
    fn from(kind: FieldKind) -> Self {
        Self::Field(kind.into())
    }
}

impl From<Datasource> for MemberKind {
    fn from(datasource: Datasource) -> Self {
        Self::Collection(datasource)
    }
}

impl From<Behavior> for MemberKind {
    fn from(behavior: Behavior) -> Self {
        Self::Behavior(behavior)
    }
}

/// Classification of a name on a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberType {
    Field,
    Collection,
    Behavior,
    /// Owned by the model type itself; never available as a member name.
    Reserved,
    Unused,
}

pub(crate) struct ModelInner {
    pub(crate) bus: EventBus,
    pub(crate) registry: MemberRegistry,
    pub(crate) store: ScalarValueStore,
    pub(crate) bridge: CollectionBridge,
    pub(crate) engine: DependencyEngine,
}

/// Shared handle to a model instance.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

/// Non-owning handle, upgraded by handlers when they fire.
#[derive(Clone)]
pub(crate) struct WeakModel(Weak<ModelInner>);

impl WeakModel {
    pub(crate) fn upgrade(&self) -> Option<Model> {
        self.0.upgrade().map(|inner| Model { inner })
    }
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ModelInner {
                bus: EventBus::new(),
                registry: MemberRegistry::new(),
                store: ScalarValueStore::new(),
                bridge: CollectionBridge::new(),
                engine: DependencyEngine::new(),
            }),
        }
    }

    /// Create a model and add every member in order.
    pub fn with_members<N, M>(members: impl IntoIterator<Item = (N, M)>) -> Result<Self>
    where
        N: AsRef<str>,
        M: Into<MemberKind>,
    {
        let model = Self::new();
        for (name, member) in members {
            model.extend(name.as_ref(), member)?;
        }
        Ok(model)
    }

    pub(crate) fn inner(&self) -> &ModelInner {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> WeakModel {
        WeakModel(Arc::downgrade(&self.inner))
    }

    /// The instance's event bus.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Subscribe to a topic on the model's bus.
    pub fn on<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&crate::reactive::Event) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.inner.bus.subscribe(topic, handler)
    }

    /// Unsubscribe from a topic on the model's bus.
    pub fn off(&self, topic: &Topic, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(topic, id)
    }

    /// Publish on the model's bus.
    pub fn emit(&self, topic: Topic, payload: Payload) {
        self.inner.bus.publish(topic, payload)
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("members", &self.member_names())
            .field("derivations", &self.calc_targets())
            .finish()
    }
}
