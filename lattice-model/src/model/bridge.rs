//! Collection Bridge
//!
//! Relays a lent datasource's native events onto the model's bus:
//!
//! | native event     | bus topic        | payload          |
//! |------------------|------------------|------------------|
//! | record added     | `added <name>`   | record           |
//! | record updated   | `updated <name>` | record and field |
//! | record removed   | `removed <name>` | record           |
//!
//! The three listener ids are kept per member so removal detaches exactly
//! those listeners, once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::collection::{
    CollectionEvent, CollectionEventKind, CollectionHandler, Datasource, ListenerId,
};
use crate::reactive::{Payload, Topic, Verb};

use super::{Model, WeakModel};

#[derive(Debug, Clone, Copy)]
struct BridgeHandles {
    added: ListenerId,
    updated: ListenerId,
    removed: ListenerId,
}

#[derive(Debug, Default)]
pub(crate) struct CollectionBridge {
    handles: Mutex<HashMap<String, BridgeHandles>>,
}

impl CollectionBridge {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, model: &Model, name: &str, datasource: &Datasource) {
        let weak = model.downgrade();
        let handles = BridgeHandles {
            added: datasource.on(CollectionEventKind::Added, relay(weak.clone(), name)),
            updated: datasource.on(CollectionEventKind::Updated, relay(weak.clone(), name)),
            removed: datasource.on(CollectionEventKind::Removed, relay(weak, name)),
        };
        self.handles.lock().insert(name.to_string(), handles);
    }

    /// Detach the relays of `name`. Returns `false` if none were attached.
    pub(crate) fn detach(&self, name: &str, datasource: &Datasource) -> bool {
        let Some(handles) = self.handles.lock().remove(name) else {
            return false;
        };
        datasource.off(handles.added);
        datasource.off(handles.updated);
        datasource.off(handles.removed);
        true
    }
}

fn relay(model: WeakModel, member: &str) -> CollectionHandler {
    let member = member.to_string();
    Arc::new(move |event: &CollectionEvent| {
        let Some(model) = model.upgrade() else {
            return;
        };
        let (verb, payload) = match event {
            CollectionEvent::Added(record) => (Verb::Added, Payload::Record(record.clone())),
            CollectionEvent::Updated { record, field } => (
                Verb::Updated,
                Payload::RecordField {
                    record: record.clone(),
                    field: field.clone(),
                },
            ),
            CollectionEvent::Removed(record) => (Verb::Removed, Payload::Record(record.clone())),
        };
        model.emit(Topic::new(verb, member.as_str()), payload);
    })
}
